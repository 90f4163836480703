//! Remote catalog boundary: the provider trait, an HTTP implementation and
//! an in-memory fixture catalog.

pub mod client;
pub mod error;
pub mod memory;
pub mod traits;

pub use client::HttpCatalog;
pub use error::CatalogError;
pub use memory::{CatalogDump, FixtureCollection, MemoryCatalog};
pub use traits::{CatalogProvider, StaticToken, TokenSource};
