//! cmpd - modpack downloader
//!
//! Fetches a modpack and its dependencies from the catalog API, caches every
//! record and file in a local [`store::ArtifactStore`], and assembles a
//! runnable directory from the cached files and the pack's overrides.

pub mod assembler;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod package;
pub mod progress;
pub mod store;
pub mod transport;

pub use assembler::{Assembler, Assembly, AssemblyReport, SkippedDependency};
pub use client::CatalogClient;
pub use config::Config;
pub use error::{CmpdError, Result};
pub use manifest::{Manifest, ManifestEntry};
pub use package::{PackageFile, PackageInfo};
pub use store::ArtifactStore;
pub use transport::{HttpTransport, RemoteBody, Transport};
