//! Modpack manifest
//!
//! Every modpack archive carries a `manifest.json` listing the
//! `(projectID, fileID)` pairs it depends on and the name of the subtree
//! holding files to copy verbatim into the output.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use zip::ZipArchive;

use crate::error::{CmpdError, Result};

/// Archive entry holding the manifest
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// One dependency of the modpack
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "projectID")]
    pub project_id: i64,

    #[serde(rename = "fileID")]
    pub file_id: i64,

    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    /// Subtree merged into the output directory
    #[serde(default = "default_overrides")]
    pub overrides: String,

    /// Dependencies, in install order
    pub files: Vec<ManifestEntry>,
}

fn default_overrides() -> String {
    "overrides".to_string()
}

impl Manifest {
    /// Parse a manifest document
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CmpdError::Manifest(format!("not UTF-8: {e}")))?;
        let manifest: Manifest = serde_json::from_str(text)
            .map_err(|e| CmpdError::Manifest(e.to_string()))?;

        let overrides = manifest.overrides.trim_matches('/').to_string();
        if overrides.is_empty() || overrides.split('/').any(|c| c == "..") {
            return Err(CmpdError::Manifest(format!(
                "bad overrides directory: {:?}",
                manifest.overrides
            )));
        }

        Ok(Manifest {
            overrides,
            ..manifest
        })
    }

    /// Read the manifest out of a modpack archive
    pub fn read_from_archive(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;

        let mut entry = archive.by_name(MANIFEST_ENTRY).map_err(|e| {
            CmpdError::Manifest(format!(
                "{} has no {MANIFEST_ENTRY}: {e}",
                path.display()
            ))
        })?;

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Self::parse(&bytes)
    }

    /// Archive name prefix of the overrides subtree, with trailing slash
    pub fn overrides_prefix(&self) -> String {
        format!("{}/", self.overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    #[test]
    fn test_parse_minimal() {
        let manifest = Manifest::parse(
            br#"{"files": [{"projectID": 1, "fileID": 11}, {"projectID": 2, "fileID": 22, "required": false}]}"#,
        )
        .unwrap();

        assert_eq!(manifest.overrides, "overrides");
        assert_eq!(manifest.overrides_prefix(), "overrides/");
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(
            manifest.files[0],
            ManifestEntry { project_id: 1, file_id: 11, required: true }
        );
        assert!(!manifest.files[1].required);
    }

    #[test]
    fn test_parse_custom_overrides() {
        let manifest =
            Manifest::parse(br#"{"name": "Pack", "overrides": "extra/", "files": []}"#).unwrap();
        assert_eq!(manifest.overrides, "extra");
        assert_eq!(manifest.name.as_deref(), Some("Pack"));
    }

    #[test]
    fn test_parse_rejects_bad_documents() {
        assert!(matches!(Manifest::parse(b"{}"), Err(CmpdError::Manifest(_))));
        assert!(matches!(Manifest::parse(b"not json"), Err(CmpdError::Manifest(_))));
        assert!(matches!(Manifest::parse(&[0xff, 0xfe]), Err(CmpdError::Manifest(_))));
        assert!(matches!(
            Manifest::parse(br#"{"overrides": "../up", "files": []}"#),
            Err(CmpdError::Manifest(_))
        ));
    }

    #[test]
    fn test_read_from_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.zip");

        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file(MANIFEST_ENTRY, SimpleFileOptions::default()).unwrap();
        zip.write_all(br#"{"files": [{"projectID": 1, "fileID": 11}]}"#).unwrap();
        zip.finish().unwrap();

        let manifest = Manifest::read_from_archive(&path).unwrap();
        assert_eq!(manifest.files[0].file_id, 11);
    }

    #[test]
    fn test_read_from_archive_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.zip");

        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("overrides/config.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"x").unwrap();
        zip.finish().unwrap();

        assert!(matches!(
            Manifest::read_from_archive(&path),
            Err(CmpdError::Manifest(_))
        ));
    }

    #[test]
    fn test_read_from_non_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();

        assert!(matches!(Manifest::read_from_archive(&path), Err(CmpdError::Zip(_))));
    }
}
