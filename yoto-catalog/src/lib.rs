//! Library and artwork cache for yoto-sdk
//!
//! - [`CatalogCache::get`] reads the current snapshot without locking
//! - [`CatalogCache::refresh`] swaps in a new snapshot only on success
//! - [`CatalogCache::ensure_artwork`] collapses concurrent fetches per card
//! - [`CatalogCache::card_chapters`] loads and keeps a card's chapter list
//!
//! ```rust,ignore
//! let cache = CatalogCache::open(CatalogConfig::default(), fetcher).await;
//! cache.refresh(api.as_ref()).await?;
//!
//! let view = cache.get();
//! for card in view.cards() {
//!     let art = cache.ensure_artwork(&card.id).await;
//! }
//! ```

pub mod artwork;
pub mod cache;
pub mod config;
pub mod entry;
pub mod error;

pub use artwork::{artwork_file_name, ArtworkFetcher};
pub use cache::CatalogCache;
pub use config::CatalogConfig;
pub use entry::{CacheEntry, CatalogView};
pub use error::{CatalogError, Result};
