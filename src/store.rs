//! Local artifact store
//!
//! Caches catalog metadata and downloaded files on disk, keyed by catalog id.
//!
//! ## Layout
//!
//! ```text
//! <store>/data/addons/<package_id>.json   package info record
//! <store>/data/files/<file_id>.json       package file record
//! <store>/files/<file_id>/<file_name>     downloaded bytes
//! ```
//!
//! A missing record is a cache miss (`Ok(None)`). A record that exists but is
//! empty or unparsable is [`CmpdError::CorruptRecord`], never a miss.
//!
//! Downloads stream into `<file_name>.part` and are renamed into place only
//! once the full advertised length has arrived, so a file at the final path
//! whose size matches the record is always complete.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::config::StoreConfig;
use crate::error::{CmpdError, Result};
use crate::package::{PackageFile, PackageInfo, PackageInfoRecord};
use crate::progress::{byte_bar, format_bytes};
use crate::transport::{RemoteBody, Transport};

/// On-disk cache of catalog records and files
pub struct ArtifactStore {
    root: PathBuf,
    settings: StoreConfig,
    transport: Arc<dyn Transport>,
}

impl ArtifactStore {
    /// Open (creating if needed) the store at `settings.dir`
    pub fn open(settings: &StoreConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        fs::create_dir_all(&settings.dir)?;
        debug!("Opened artifact store at {}", settings.dir.display());

        Ok(Self {
            root: settings.dir.clone(),
            settings: settings.clone(),
            transport,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a package info record
    pub fn info_record_path(&self, package_id: i64) -> PathBuf {
        self.root
            .join("data")
            .join("addons")
            .join(format!("{package_id}.json"))
    }

    /// Path of a package file record
    pub fn file_record_path(&self, file_id: i64) -> PathBuf {
        self.root
            .join("data")
            .join("files")
            .join(format!("{file_id}.json"))
    }

    /// Where the bytes of `file` live once downloaded
    pub fn binary_path(&self, file: &PackageFile) -> PathBuf {
        // Only the final component of the catalog's name is trusted
        let name = Path::new(&file.file_name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from(format!("{}.bin", file.uid)));

        self.root
            .join("files")
            .join(file.uid.to_string())
            .join(name)
    }

    /// Persist a package info record, replacing any previous one
    pub fn put_package_info(&self, info: &PackageInfo) -> Result<()> {
        write_record(&self.info_record_path(info.uid), &info.to_record())
    }

    /// Persist a package file record, replacing any previous one
    pub fn put_package_file(&self, file: &PackageFile) -> Result<()> {
        write_record(&self.file_record_path(file.uid), file)
    }

    /// Load a package info record with its files resolved from the store.
    ///
    /// File ids the store cannot resolve are left out of `latest_files`.
    pub fn get_package_info(&self, package_id: i64) -> Result<Option<PackageInfo>> {
        let Some(record) = read_record::<PackageInfoRecord>(&self.info_record_path(package_id))?
        else {
            return Ok(None);
        };

        let info = PackageInfo::from_record(record, |file_id| {
            match self.get_package_file(file_id) {
                Ok(Some(file)) => Some(file),
                Ok(None) => {
                    debug!("Package {} references uncached file {}", package_id, file_id);
                    None
                }
                Err(e) => {
                    warn!("Dropping file {} from package {}: {}", file_id, package_id, e);
                    None
                }
            }
        });

        Ok(Some(info))
    }

    /// Load a package file record
    pub fn get_package_file(&self, file_id: i64) -> Result<Option<PackageFile>> {
        read_record(&self.file_record_path(file_id))
    }

    /// Path of a cached file whose bytes are present and the expected size.
    ///
    /// Lets callers holding only a file id find its bytes without a download;
    /// the assembler reaches the same path through [`Self::download`].
    pub fn locate(&self, file_id: i64) -> Result<Option<PathBuf>> {
        let Some(file) = self.get_package_file(file_id)? else {
            return Ok(None);
        };

        let path = self.binary_path(&file);
        Ok(is_complete(&path, file.length).then_some(path))
    }

    /// Download `file` into the store and return its path.
    ///
    /// The file record is written first. An existing file of the expected
    /// length is returned without touching the network; anything else is
    /// fetched again from scratch, up to `max_attempts` times.
    pub fn download(&self, file: &PackageFile) -> Result<PathBuf> {
        self.put_package_file(file)?;

        let target = self.binary_path(file);

        if target.is_file() {
            if is_complete(&target, file.length) {
                info!(" / File [{}] already exists and looks valid", file.display_name);
                return Ok(target);
            }
            warn!(
                " X File [{}] exists but seems corrupted, downloading again",
                file.display_name
            );
        }

        if file.url.is_empty() {
            error!(" X File [{}] has no download URL", file.display_name);
            return Err(CmpdError::NoDownloadUrl { file_id: file.uid });
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let attempts = self.settings.max_attempts.max(1);
        for attempt in 1..=attempts {
            match self.fetch(file, &target, attempt) {
                Ok(received) => {
                    info!(
                        " / Downloaded [{}] ({})",
                        file.display_name,
                        format_bytes(received)
                    );
                    return Ok(target);
                }
                Err(e) => {
                    error!(
                        " X Attempt {}/{} for [{}] failed: {}",
                        attempt, attempts, file.display_name, e
                    );
                    if attempt < attempts && self.settings.retry_delay_ms > 0 {
                        std::thread::sleep(Duration::from_millis(
                            self.settings.retry_delay_ms * u64::from(attempt),
                        ));
                    }
                }
            }
        }

        error!(
            " X Failed to download [{}] after {} attempts, skipping",
            file.display_name, attempts
        );
        Err(CmpdError::DownloadFailed {
            name: file.display_name.clone(),
            attempts,
        })
    }

    /// One download attempt; returns the number of bytes written
    fn fetch(&self, file: &PackageFile, target: &Path, attempt: u32) -> Result<u64> {
        let RemoteBody {
            content_length,
            reader,
        } = self.transport.open(&file.url)?;

        let expected = content_length.ok_or_else(|| CmpdError::MissingContentLength {
            url: file.url.clone(),
        })?;

        if expected != file.length {
            warn!(
                "Server reports {} bytes for [{}], catalog says {}",
                expected, file.display_name, file.length
            );
        }

        info!(
            "   Attempt #{} :: Downloading {:>10} :: [{}]",
            attempt,
            format_bytes(expected),
            file.display_name
        );

        let partial = partial_path(target);
        let streamed = self.stream_to_file(reader, &partial, expected, &file.display_name);

        match streamed {
            Ok(received) if received == expected => {
                fs::rename(&partial, target)?;
                Ok(received)
            }
            Ok(received) => {
                let _ = fs::remove_file(&partial);
                Err(CmpdError::Truncated {
                    url: file.url.clone(),
                    expected,
                    received,
                })
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }

    /// Stream a body to disk in `chunk_size` pieces
    fn stream_to_file(
        &self,
        mut reader: Box<dyn Read + Send>,
        path: &Path,
        total: u64,
        display_name: &str,
    ) -> Result<u64> {
        let mut out = File::create(path)?;
        let bar = byte_bar(total, display_name, self.settings.show_progress);
        let mut buffer = vec![0u8; self.settings.chunk_size.max(1)];
        let mut received: u64 = 0;

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    bar.abandon();
                    return Err(e.into());
                }
            };

            out.write_all(&buffer[..read])?;
            received += read as u64;
            bar.set_position(received);

            if total > 0 {
                trace!(
                    "{:>3}% :: {} of {}",
                    received * 100 / total,
                    format_bytes(received),
                    format_bytes(total)
                );
            }
        }

        out.flush()?;
        bar.finish_and_clear();
        Ok(received)
    }
}

fn is_complete(path: &Path, expected: u64) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() == expected)
        .unwrap_or(false)
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}

fn write_record<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec(value)?)?;
    Ok(())
}

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }

    let bytes = fs::read(path)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        error!("XX Record {} is empty", path.display());
        return Err(CmpdError::CorruptRecord {
            path: path.to_path_buf(),
            reason: "empty record".to_string(),
        });
    }

    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        error!("XX Record {} is unreadable: {}", path.display(), e);
        CmpdError::CorruptRecord {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })
}
