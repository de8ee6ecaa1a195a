//! Shared fixtures: an in-memory catalog and modpack archive builders

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;

use cmpd::config::Config;
use cmpd::{CmpdError, RemoteBody, Result, Transport};
use serde_json::json;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const API: &str = "http://catalog.test/api/v2";

/// Catalog that serves JSON pages and file bodies from memory
#[derive(Default)]
pub struct FakeCatalog {
    pages: HashMap<String, String>,
    blobs: HashMap<String, Vec<u8>>,
    faults: Mutex<HashMap<String, usize>>,
    log: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a package info response
    pub fn package(mut self, id: i64, name: &str, latest_files: Vec<serde_json::Value>) -> Self {
        let body = json!({
            "id": id,
            "name": name,
            "summary": format!("{name} summary"),
            "websiteUrl": format!("https://catalog.test/projects/{id}"),
            "latestFiles": latest_files,
        });
        self.pages
            .insert(format!("{API}/addon/{id}"), body.to_string());
        self
    }

    /// Serve a file record response for `(project, id)`
    pub fn file(mut self, project: i64, record: serde_json::Value) -> Self {
        let id = record["id"].as_i64().expect("file record needs an id");
        self.pages
            .insert(format!("{API}/addon/{project}/file/{id}"), record.to_string());
        self
    }

    /// Serve `bytes` at `url`
    pub fn blob(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.blobs.insert(url.to_string(), bytes);
        self
    }

    /// Fail the next `count` downloads of `url`
    pub fn failing(self, url: &str, count: usize) -> Self {
        self.faults
            .lock()
            .unwrap()
            .insert(url.to_string(), count);
        self
    }

    /// Every request made so far, as `"GET <url>"` or `"OPEN <url>"`
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn opens_of(&self, url: &str) -> usize {
        let wanted = format!("OPEN {url}");
        self.requests().iter().filter(|r| **r == wanted).count()
    }
}

impl Transport for FakeCatalog {
    fn get_text(&self, url: &str) -> Result<String> {
        self.log.lock().unwrap().push(format!("GET {url}"));
        self.pages.get(url).cloned().ok_or_else(|| CmpdError::HttpStatus {
            url: url.to_string(),
            status: 404,
        })
    }

    fn open(&self, url: &str) -> Result<RemoteBody> {
        self.log.lock().unwrap().push(format!("OPEN {url}"));

        if let Some(remaining) = self.faults.lock().unwrap().get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CmpdError::Http {
                    url: url.to_string(),
                    message: "connection reset".to_string(),
                });
            }
        }

        let bytes = self.blobs.get(url).cloned().ok_or_else(|| CmpdError::HttpStatus {
            url: url.to_string(),
            status: 404,
        })?;

        Ok(RemoteBody {
            content_length: Some(bytes.len() as u64),
            reader: Box::new(Cursor::new(bytes)),
        })
    }
}

/// Wire-format file record
pub fn file_record(id: i64, file_name: &str, length: usize, date: &str) -> serde_json::Value {
    json!({
        "id": id,
        "displayName": file_name,
        "fileName": file_name,
        "downloadUrl": download_url(file_name),
        "fileLength": length,
        "fingerprint": id * 7,
        "fileDate": date,
    })
}

pub fn download_url(file_name: &str) -> String {
    format!("https://cdn.test/files/{file_name}")
}

/// Build a modpack archive with the given manifest document and extra entries
pub fn modpack_zip(manifest: &serde_json::Value, entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("manifest.json", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(manifest.to_string().as_bytes()).unwrap();

    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

/// Configuration rooted in `dir`, pointed at the fake catalog
pub fn config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.api.base_url = API.to_string();
    config.store.dir = dir.join("store");
    config.store.retry_delay_ms = 0;
    config.store.show_progress = false;
    config.output.dir = dir.join("modpack");
    config.log.file = dir.join("cmpd.log");
    config
}
