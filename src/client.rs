//! Catalog client
//!
//! Resolves package and file records from the artifact store when cached and
//! from the catalog API otherwise. Network results are not written back to
//! the store; persisting is left to the caller.

use std::sync::Arc;

use tracing::{debug, error};

use crate::config::ApiConfig;
use crate::error::Result;
use crate::package::{PackageFile, PackageInfo};
use crate::store::ArtifactStore;
use crate::transport::Transport;

pub struct CatalogClient<'s> {
    store: &'s ArtifactStore,
    transport: Arc<dyn Transport>,
    api: ApiConfig,
}

impl<'s> CatalogClient<'s> {
    pub fn new(store: &'s ArtifactStore, transport: Arc<dyn Transport>, api: ApiConfig) -> Self {
        Self {
            store,
            transport,
            api,
        }
    }

    /// Resolve a package, preferring the store.
    ///
    /// Errors are logged here and returned so the caller can decide whether
    /// they are fatal.
    pub fn get_package_info(&self, package_id: i64) -> Result<PackageInfo> {
        if let Some(info) = self.store.get_package_info(package_id).inspect_err(|e| {
            error!("Cached record for package {} is unusable: {}", package_id, e)
        })? {
            debug!("Package {} served from store", package_id);
            return Ok(info);
        }

        let url = self.api.package_info_url(package_id);
        self.transport
            .get_text(&url)
            .and_then(|body| PackageInfo::from_wire_json(&body))
            .inspect_err(|e| error!("Failed to fetch package {}: {}", package_id, e))
    }

    /// Resolve a file, preferring the store.
    ///
    /// The cache is keyed by `file_id` alone; `package_id` only builds the
    /// request URL and fills in the owner when the response omits it.
    pub fn get_package_file(&self, package_id: i64, file_id: i64) -> Result<PackageFile> {
        if let Some(file) = self.store.get_package_file(file_id).inspect_err(|e| {
            error!("Cached record for file {} is unusable: {}", file_id, e)
        })? {
            debug!("File {} served from store", file_id);
            return Ok(file);
        }

        let url = self.api.package_file_url(package_id, file_id);
        self.transport
            .get_text(&url)
            .and_then(|body| PackageFile::from_wire_json(&body, Some(package_id)))
            .inspect_err(|e| {
                error!(
                    "Failed to fetch file {} of package {}: {}",
                    file_id, package_id, e
                )
            })
    }
}
