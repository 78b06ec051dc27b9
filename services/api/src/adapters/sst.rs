//! services/api/src/adapters/sst.rs
//!
//! This module contains the adapter for OpenAI's Speech-to-Text (Whisper) service.
//! It implements the `SpeechToTextService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::audio::{AudioInput, CreateTranscriptionRequest},
    Client,
};
use async_trait::async_trait;
use festival_stories_core::ports::{PortError, PortResult, SpeechToTextService};
use tracing::debug;

/// Language names offered by the upload form, with their ISO 639-1 codes.
const LANGUAGE_CODES: [(&str, &str); 13] = [
    ("hindi", "hi"),
    ("bengali", "bn"),
    ("telugu", "te"),
    ("marathi", "mr"),
    ("tamil", "ta"),
    ("gujarati", "gu"),
    ("urdu", "ur"),
    ("kannada", "kn"),
    ("odia", "or"),
    ("malayalam", "ml"),
    ("punjabi", "pa"),
    ("assamese", "as"),
    ("english", "en"),
];

const SUPPORTED_EXTENSIONS: [&str; 3] = ["wav", "mp3", "m4a"];

/// Maps a language name (or a two-letter code) to the hint Whisper expects.
pub fn language_hint(language: &str) -> Option<&'static str> {
    let wanted = language.trim().to_ascii_lowercase();
    LANGUAGE_CODES
        .iter()
        .find(|(name, code)| *name == wanted || *code == wanted)
        .map(|(_, code)| *code)
}

pub fn is_supported_audio(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SpeechToTextService` port using the OpenAI Whisper API.
#[derive(Clone)]
pub struct OpenAiSstAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiSstAdapter {
    /// Creates a new `OpenAiSstAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `SpeechToTextService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SpeechToTextService for OpenAiSstAdapter {
    /// Transcribes an uploaded recording with the configured Whisper model.
    async fn transcribe_audio(
        &self,
        audio_data: &[u8],
        file_name: &str,
        language: &str,
    ) -> PortResult<String> {
        if !is_supported_audio(file_name) {
            return Err(PortError::Unexpected(format!(
                "Unsupported audio file '{}': expected wav, mp3 or m4a",
                file_name
            )));
        }

        let input = AudioInput::from_vec_u8(file_name.to_string(), audio_data.to_vec());
        let request = CreateTranscriptionRequest {
            file: input,
            model: self.model.clone(),
            language: language_hint(language).map(str::to_string),
            ..Default::default()
        };

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .audio()
            .transcription()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        debug!(file = %file_name, chars = response.text.len(), "Transcribed audio");
        Ok(response.text)
    }
}
