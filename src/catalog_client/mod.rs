//! Remote catalog access.

mod error;
mod models;
mod spotify;
mod trait_def;

pub use error::CatalogError;
pub use models::*;
pub use spotify::{SpotifyClient, SPOTIFY_API_BASE};
pub use trait_def::CatalogClient;
