//! # Fixture Store
//!
//! In-memory image fixtures loaded from a directory, served by filename.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> Catalog load (startup, synchronous)
//!     │      └─> filename → { format, bytes }
//!     │
//!     ├──> Refresh loop (optional, every interval)
//!     │      ├─> list directory, diff against catalog keys
//!     │      └─> full rebuild, published with one swap
//!     │
//!     └──> CatalogServer
//!            └─> `source` param → asset | ParamError
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use fixture_store::{FixtureStore, Params, AssetServer, RefreshConfig, StoreConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> fixture_store::Result<()> {
//!     let config = StoreConfig::new("testdata/images")
//!         .with_refresh(RefreshConfig::with_interval(Duration::from_secs(2)));
//!     let store = FixtureStore::start(config).await?;
//!
//!     let asset = store.catalog().get("small.jpg")?;
//!     println!("{} bytes of {}", asset.len(), asset.format);
//!
//!     let served = store.server().serve(&Params::with_source("small.jpg"));
//!     assert!(served.is_ok());
//!
//!     store.shutdown().await
//! }
//! ```

mod catalog;
mod config;
mod directory;
mod error;
mod format;
mod refresh;
mod server;
mod stats;
mod store;

pub use catalog::{AssetCatalog, AssetRecord, CatalogSnapshot, ListingDiff};
pub use config::{RefreshSettings, StoreConfig};
pub use directory::{DirEntryInfo, DirectorySource, FsDirectory};
pub use error::{Result, StoreError};
pub use format::ImageFormat;
pub use refresh::{
    refresh_once, RefreshConfig, RefreshErrorPolicy, RefreshLoop, RefreshOutcome, RefreshStatus,
    RefreshTrigger, RefreshUpdate,
};
pub use server::{AssetServer, CatalogServer, ParamError, Params, SOURCE_PARAM};
pub use stats::LoadStats;
pub use store::FixtureStore;
