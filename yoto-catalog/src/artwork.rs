//! Artwork fetching seam

use std::path::PathBuf;

use async_trait::async_trait;
use yoto_api::CardId;

/// Downloads a card's artwork to local storage
///
/// File naming, formats and HTTP live in the implementation. The cache only
/// needs the local path of the stored file.
#[async_trait]
pub trait ArtworkFetcher: Send + Sync {
    async fn fetch(&self, card_id: &CardId, reference: &str) -> Result<PathBuf, String>;
}

/// Conventional file name for stored artwork, `{card_id}.{ext}`
///
/// The extension is taken from the reference URL when it names a known
/// image type, otherwise `jpg`.
pub fn artwork_file_name(card_id: &CardId, reference: &str) -> String {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "webp"))
        .map(|ext| if ext == "jpeg" { "jpg".to_string() } else { ext })
        .unwrap_or_else(|| "jpg".to_string());
    format!("{card_id}.{ext}")
}
