pub mod enhancement_llm;
pub mod image;
pub mod json_store;
pub mod password;
pub mod sst;

pub use enhancement_llm::OpenAiStoryAdapter;
pub use image::JpegNormalizer;
pub use json_store::JsonFileStore;
pub use password::Argon2Hasher;
pub use sst::OpenAiSstAdapter;
