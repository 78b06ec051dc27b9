//! services/api/src/bin/openapi.rs
//!
//! Writes the festival stories OpenAPI document to disk, by default
//! `openapi.json` in the current directory; pass a path to override.

use api_lib::web::rest::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));

    let document = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&path, document)?;
    println!("OpenAPI document written to {}", path.display());
    Ok(())
}
