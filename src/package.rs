//! Package record types
//!
//! Records come from two places: catalog API responses (the "wire" shape,
//! camelCase JSON) and the artifact store (the "record" shape written by
//! [`crate::store::ArtifactStore`]). Both load into the same
//! [`PackageInfo`] / [`PackageFile`] values.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{CmpdError, Result};

/// Owning package id used when neither the record nor the caller supplies one
pub const UNKNOWN_PACKAGE: i64 = -1;

/// One downloadable file of a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageFile {
    /// File id, also the store key
    pub uid: i64,

    /// Owning package id, or [`UNKNOWN_PACKAGE`]
    pub addon_uid: i64,

    /// Display name
    #[serde(rename = "d_name")]
    pub display_name: String,

    /// On-disk file name
    pub file_name: String,

    /// Download URL (empty when the catalog withholds it)
    pub url: String,

    /// Expected size in bytes
    pub length: u64,

    /// Publish time as UNIX seconds
    pub timestamp: f64,

    /// Catalog fingerprint, not used for validation
    pub fingerprint: i64,

    /// Path of the downloaded bytes, set once after a successful download
    #[serde(skip)]
    pub local_path: Option<PathBuf>,
}

/// A package with its candidate files
#[derive(Debug, Clone, PartialEq)]
pub struct PackageInfo {
    pub uid: i64,
    pub display_name: String,
    pub summary: String,
    pub url: String,
    /// Candidate files; empty means nothing is downloadable
    pub latest_files: Vec<PackageFile>,
    pub categories: Option<Vec<String>>,
}

/// Store shape of a [`PackageInfo`]: files are referenced by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfoRecord {
    pub uid: i64,
    #[serde(rename = "d_name")]
    pub display_name: String,
    pub summary: String,
    pub url: String,
    pub latest_files: Vec<i64>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFile {
    id: i64,
    #[serde(default)]
    project_id: Option<i64>,
    display_name: String,
    file_name: String,
    #[serde(default)]
    download_url: Option<String>,
    file_length: u64,
    #[serde(default)]
    fingerprint: Option<i64>,
    file_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAddon {
    id: i64,
    name: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    website_url: String,
    #[serde(default)]
    latest_files: Vec<WireFile>,
    #[serde(default)]
    categories: Option<Vec<WireCategory>>,
}

#[derive(Debug, Deserialize)]
struct WireCategory {
    name: String,
}

/// Parse a catalog file date into UNIX seconds.
///
/// Fractional seconds, a trailing `Z` and any `±HH:MM` offset are dropped;
/// the remaining date-time is read as UTC. Seconds may be omitted, and a bare
/// date means midnight.
pub fn parse_file_date(raw: &str) -> Result<f64> {
    let invalid = || CmpdError::InvalidTimestamp(raw.to_string());
    let trimmed = raw.trim().trim_end_matches('Z');

    let naive = match trimmed.split_once('T') {
        Some((date, time)) => {
            let time = time.split(['.', '+', '-']).next().unwrap_or_default();
            let joined = format!("{date}T{time}");
            NaiveDateTime::parse_from_str(&joined, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(&joined, "%Y-%m-%dT%H:%M"))
                .map_err(|_| invalid())?
        }
        None => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map_err(|_| invalid())?
            .and_time(NaiveTime::MIN),
    };

    Ok(naive.and_utc().timestamp() as f64)
}

impl PackageFile {
    fn from_wire(wire: WireFile, context_package: Option<i64>) -> Result<Self> {
        let timestamp = parse_file_date(&wire.file_date)?;
        if wire.download_url.is_none() {
            tracing::debug!("File {} has no download URL", wire.id);
        }

        Ok(Self {
            uid: wire.id,
            addon_uid: wire
                .project_id
                .or(context_package)
                .unwrap_or(UNKNOWN_PACKAGE),
            display_name: wire.display_name,
            file_name: wire.file_name,
            url: wire.download_url.unwrap_or_default(),
            length: wire.file_length,
            timestamp,
            fingerprint: wire.fingerprint.unwrap_or(-1),
            local_path: None,
        })
    }

    /// Build a file from a catalog API response body
    pub fn from_wire_json(body: &str, context_package: Option<i64>) -> Result<Self> {
        let wire: WireFile = serde_json::from_str(body)?;
        Self::from_wire(wire, context_package)
    }

    /// Attach the downloaded path. Only the first call has any effect.
    pub fn link(&mut self, path: PathBuf) {
        match &self.local_path {
            Some(existing) => tracing::warn!(
                "File {} is already linked to {}, ignoring {}",
                self.uid,
                existing.display(),
                path.display()
            ),
            None => self.local_path = Some(path),
        }
    }

    /// Downloaded path, if any
    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }
}

impl PackageInfo {
    /// Build a package from a catalog API response body
    pub fn from_wire_json(body: &str) -> Result<Self> {
        let wire: WireAddon = serde_json::from_str(body)?;
        let uid = wire.id;

        let latest_files = wire
            .latest_files
            .into_iter()
            .map(|f| PackageFile::from_wire(f, Some(uid)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            uid,
            display_name: wire.name,
            summary: wire.summary,
            url: wire.website_url,
            latest_files,
            categories: wire
                .categories
                .map(|c| c.into_iter().map(|c| c.name).collect()),
        })
    }

    /// Store shape of this package
    pub fn to_record(&self) -> PackageInfoRecord {
        PackageInfoRecord {
            uid: self.uid,
            display_name: self.display_name.clone(),
            summary: self.summary.clone(),
            url: self.url.clone(),
            latest_files: self.latest_files.iter().map(|f| f.uid).collect(),
            categories: self.categories.clone(),
        }
    }

    /// Rebuild a package from its store shape.
    ///
    /// `resolve` maps a file id to its record; ids it cannot resolve are dropped.
    pub fn from_record<F>(record: PackageInfoRecord, mut resolve: F) -> Self
    where
        F: FnMut(i64) -> Option<PackageFile>,
    {
        let latest_files = record
            .latest_files
            .iter()
            .filter_map(|id| resolve(*id))
            .collect();

        Self {
            uid: record.uid,
            display_name: record.display_name,
            summary: record.summary,
            url: record.url,
            latest_files,
            categories: record.categories,
        }
    }

    /// The candidate with the greatest timestamp; the first one wins ties
    pub fn select_newest(&self) -> Option<&PackageFile> {
        let mut newest: Option<&PackageFile> = None;
        for file in &self.latest_files {
            match newest {
                Some(best) if file.timestamp <= best.timestamp => {}
                _ => newest = Some(file),
            }
        }
        newest
    }
}
