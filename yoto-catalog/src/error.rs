use thiserror::Error;
use yoto_api::{ApiError, CardId};

/// Errors from the catalog cache
///
/// Cloneable so one shared load result can be handed to every waiter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Catalog refresh failed: {0}")]
    Refresh(#[from] ApiError),

    #[error("Card not in catalog: {0}")]
    UnknownCard(CardId),

    #[error("Card {0} has no artwork")]
    NoArtwork(CardId),

    #[error("Artwork fetch for {card_id} failed: {message}")]
    ArtworkFetch { card_id: CardId, message: String },

    #[error("Loading chapters for {card_id} failed: {source}")]
    ChapterFetch { card_id: CardId, source: ApiError },

    #[error("Catalog persistence error: {0}")]
    Persistence(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
