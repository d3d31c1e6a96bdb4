//! Writes the room server's OpenAPI document.
//!
//! Usage: `generate-openapi [OUT]`. `OUT` defaults to `specs/room-server.json`
//! at the workspace root; `-` prints to stdout instead.

use std::path::PathBuf;

use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let doc = room_server::routes::ApiDoc::openapi().to_pretty_json()?;

    match std::env::args().nth(1).as_deref() {
        Some("-") => println!("{doc}"),
        arg => {
            let out = arg.map(PathBuf::from).unwrap_or_else(|| {
                PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../specs/room-server.json")
            });
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out, doc)?;
            eprintln!("Wrote {}", out.display());
        }
    }
    Ok(())
}
