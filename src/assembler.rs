//! Modpack assembly
//!
//! Turns a project id into a ready-to-run directory:
//!
//! 1. resolve the project (fatal on failure)
//! 2. pick its newest file (no files ends the run with a warning)
//! 3. record the project in the store (best effort)
//! 4. download the modpack archive (fatal on failure)
//! 5. read the archive manifest (fatal on failure)
//! 6. resolve and download every dependency, skipping the ones that fail
//! 7. copy dependency files into the mods directory
//! 8. extract the overrides subtree and merge it into the output root

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::client::CatalogClient;
use crate::config::Config;
use crate::error::{CmpdError, Result};
use crate::manifest::Manifest;
use crate::package::{PackageFile, PackageInfo};
use crate::store::ArtifactStore;
use crate::transport::Transport;

/// How a run ended
#[derive(Debug)]
pub enum Assembly {
    /// The project has no downloadable files
    NoFiles { project_id: i64 },
    /// The output tree was built
    Complete(AssemblyReport),
}

#[derive(Debug)]
pub struct AssemblyReport {
    /// The resolved project
    pub package: PackageInfo,
    /// The modpack file that was installed
    pub archive: PackageFile,
    pub manifest: Manifest,
    /// Dependencies that were downloaded, with their local paths linked
    pub resolved: Vec<PackageFile>,
    /// Dependencies that could not be resolved or downloaded
    pub skipped: Vec<SkippedDependency>,
    /// Files placed in the mods directory (including ones already there)
    pub copied: usize,
    /// Files merged from the overrides subtree
    pub overrides: usize,
}

#[derive(Debug)]
pub struct SkippedDependency {
    pub project_id: i64,
    pub file_id: i64,
    /// Whether the manifest marked the entry as required
    pub required: bool,
    pub reason: String,
}

pub struct Assembler {
    config: Config,
    store: ArtifactStore,
    transport: Arc<dyn Transport>,
}

impl Assembler {
    /// Open the configured store and prepare to assemble into `config.output.dir`
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let store = ArtifactStore::open(&config.store, transport.clone())?;
        Ok(Self {
            config,
            store,
            transport,
        })
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn client(&self) -> CatalogClient<'_> {
        CatalogClient::new(&self.store, self.transport.clone(), self.config.api.clone())
    }

    /// Assemble the modpack for `project_id`
    pub fn run(&self, project_id: i64) -> Result<Assembly> {
        let client = self.client();

        let package = client
            .get_package_info(project_id)
            .map_err(|e| CmpdError::RootUnavailable {
                project_id,
                source: Box::new(e),
            })?;

        info!(
            ":: {} (project {}) :: {}",
            package.display_name, package.uid, package.summary
        );

        let Some(newest) = package.select_newest().cloned() else {
            warn!("Project {} has no files to download", project_id);
            return Ok(Assembly::NoFiles { project_id });
        };

        if let Err(e) = self.store.put_package_info(&package) {
            warn!("Could not record project {} in the store: {}", project_id, e);
        }

        info!("-- Downloading modpack file [{}]", newest.display_name);
        let mut archive = newest;
        let archive_path = self.store.download(&archive)?;
        archive.link(archive_path.clone());

        info!("-- Loading manifest");
        let manifest = Manifest::read_from_archive(&archive_path)?;
        info!("-- Manifest lists {} files", manifest.files.len());

        let (resolved, skipped) = self.fetch_dependencies(&client, &manifest);

        let output = &self.config.output.dir;
        fs::create_dir_all(output)?;

        let copied = self.install_files(&resolved)?;
        let overrides = extract_overrides(&archive_path, &manifest, output)?;

        info!(
            "-- Finished: {} files installed, {} skipped, {} overrides",
            copied,
            skipped.len(),
            overrides
        );

        Ok(Assembly::Complete(AssemblyReport {
            package,
            archive,
            manifest,
            resolved,
            skipped,
            copied,
            overrides,
        }))
    }

    /// Resolve and download each manifest entry in order
    fn fetch_dependencies(
        &self,
        client: &CatalogClient<'_>,
        manifest: &Manifest,
    ) -> (Vec<PackageFile>, Vec<SkippedDependency>) {
        let total = manifest.files.len();
        let mut resolved = Vec::with_capacity(total);
        let mut skipped = Vec::new();

        for (i, entry) in manifest.files.iter().enumerate() {
            info!(
                "-- Downloading mod [{} of {}] :: id [{}]",
                i + 1,
                total,
                entry.file_id
            );

            let skip = |reason: String| {
                if entry.required {
                    warn!("Skipping file {}: {}", entry.file_id, reason);
                } else {
                    info!("Skipping optional file {}: {}", entry.file_id, reason);
                }
                SkippedDependency {
                    project_id: entry.project_id,
                    file_id: entry.file_id,
                    required: entry.required,
                    reason,
                }
            };

            let mut file = match client.get_package_file(entry.project_id, entry.file_id) {
                Ok(file) => file,
                Err(e) => {
                    skipped.push(skip(e.to_string()));
                    continue;
                }
            };

            match self.store.download(&file) {
                Ok(path) => {
                    file.link(path);
                    resolved.push(file);
                }
                Err(e) => {
                    skipped.push(skip(format!("[{}] {}", file.display_name, e)));
                }
            }
        }

        (resolved, skipped)
    }

    /// Copy downloaded files into the mods directory
    fn install_files(&self, files: &[PackageFile]) -> Result<usize> {
        let mods_dir = self.config.output.mods_path();
        fs::create_dir_all(&mods_dir)?;

        let mut installed = 0;
        for file in files {
            let Some(source) = file.local_path() else {
                warn!("File [{}] was never downloaded, not copying", file.display_name);
                continue;
            };
            let Some(name) = source.file_name() else {
                warn!("File [{}] has no usable name", file.display_name);
                continue;
            };

            let dest = mods_dir.join(name);
            if same_size(source, &dest) {
                debug!("{} is already in place", dest.display());
                installed += 1;
                continue;
            }

            match fs::copy(source, &dest) {
                Ok(_) => installed += 1,
                Err(e) => error!("Failed to copy {} to {}: {}", source.display(), dest.display(), e),
            }
        }

        Ok(installed)
    }
}

fn same_size(a: &Path, b: &Path) -> bool {
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => b.is_file() && a.len() == b.len(),
        _ => false,
    }
}

/// Extract the manifest's overrides subtree into a scratch directory, then
/// merge it into `output`. Returns the number of files merged.
pub fn extract_overrides(archive_path: &Path, manifest: &Manifest, output: &Path) -> Result<usize> {
    let prefix = manifest.overrides_prefix();
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    let scratch = tempfile::Builder::new().prefix("cmpd-overrides").tempdir()?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.name().starts_with(&prefix) {
            continue;
        }

        let Some(relative) = entry.enclosed_name() else {
            warn!("Ignoring archive entry outside the output tree: {}", entry.name());
            continue;
        };
        let dest = scratch.path().join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&dest)?;
        io::copy(&mut entry, &mut out)?;
    }

    let staged = scratch.path().join(&manifest.overrides);
    if !staged.is_dir() {
        debug!("Archive has no {} entries", prefix);
        return Ok(0);
    }

    merge_tree(&staged, output)
}

/// Move every file under `from` to the same relative path under `to`,
/// replacing what is there
fn merge_tree(from: &Path, to: &Path) -> Result<usize> {
    let mut moved = 0;

    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(|e| {
            io::Error::new(io::ErrorKind::Other, format!("walking {}: {e}", from.display()))
        })?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target: PathBuf = to.join(relative);

        if entry.file_type().is_dir() {
            if target.is_file() {
                fs::remove_file(&target)?;
            }
            fs::create_dir_all(&target)?;
            continue;
        }

        if target.is_dir() {
            fs::remove_dir_all(&target)?;
        }
        if fs::rename(entry.path(), &target).is_err() {
            fs::copy(entry.path(), &target)?;
        }
        moved += 1;
    }

    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    fn manifest() -> Manifest {
        Manifest::parse(br#"{"files": []}"#).unwrap()
    }

    #[test]
    fn test_extract_overrides_merges_into_root() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pack.zip");
        let out = dir.path().join("out");
        write_zip(
            &archive,
            &[
                ("manifest.json", b"{}"),
                ("overrides/", b""),
                ("overrides/config/mod.cfg", b"new"),
                ("overrides/options.txt", b"opts"),
                ("other/ignored.txt", b"nope"),
            ],
        );

        fs::create_dir_all(out.join("config")).unwrap();
        fs::write(out.join("config/mod.cfg"), b"old").unwrap();
        fs::write(out.join("config/keep.cfg"), b"keep").unwrap();

        let merged = extract_overrides(&archive, &manifest(), &out).unwrap();
        assert_eq!(merged, 2);
        assert_eq!(fs::read(out.join("config/mod.cfg")).unwrap(), b"new");
        assert_eq!(fs::read(out.join("config/keep.cfg")).unwrap(), b"keep");
        assert_eq!(fs::read(out.join("options.txt")).unwrap(), b"opts");
        assert!(!out.join("overrides").exists());
        assert!(!out.join("other").exists());
        assert!(!out.join("manifest.json").exists());
    }

    #[test]
    fn test_extract_overrides_without_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pack.zip");
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        write_zip(&archive, &[("manifest.json", b"{}")]);

        assert_eq!(extract_overrides(&archive, &manifest(), &out).unwrap(), 0);
    }

    #[test]
    fn test_extract_overrides_skips_escaping_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pack.zip");
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        write_zip(
            &archive,
            &[
                ("overrides/../../escape.txt", b"bad"),
                ("overrides/fine.txt", b"ok"),
            ],
        );

        assert_eq!(extract_overrides(&archive, &manifest(), &out).unwrap(), 1);
        assert!(out.join("fine.txt").exists());
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_extract_overrides_nested_overrides_dir() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pack.zip");
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        write_zip(&archive, &[("overrides/overrides/keep.txt", b"kept")]);

        assert_eq!(extract_overrides(&archive, &manifest(), &out).unwrap(), 1);
        assert_eq!(fs::read(out.join("overrides/keep.txt")).unwrap(), b"kept");
    }

    #[test]
    fn test_extract_overrides_leaves_existing_dir_alone() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pack.zip");
        let out = dir.path().join("out");
        fs::create_dir_all(out.join("overrides")).unwrap();
        fs::write(out.join("overrides/mine.txt"), b"mine").unwrap();
        write_zip(&archive, &[("manifest.json", b"{}")]);

        assert_eq!(extract_overrides(&archive, &manifest(), &out).unwrap(), 0);
        assert_eq!(fs::read(out.join("overrides/mine.txt")).unwrap(), b"mine");
        assert!(!out.join("mine.txt").exists());
    }

    #[test]
    fn test_extract_overrides_custom_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pack.zip");
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        write_zip(
            &archive,
            &[("extra/options.txt", b"opts"), ("overrides/ignored.txt", b"no")],
        );

        let manifest = Manifest::parse(br#"{"overrides": "extra", "files": []}"#).unwrap();
        assert_eq!(extract_overrides(&archive, &manifest, &out).unwrap(), 1);
        assert!(out.join("options.txt").is_file());
        assert!(!out.join("ignored.txt").exists());
    }

    #[test]
    fn test_same_size() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"1234").unwrap();
        assert!(!same_size(&a, &b));
        fs::write(&b, b"abcd").unwrap();
        assert!(same_size(&a, &b));
        fs::write(&b, b"abc").unwrap();
        assert!(!same_size(&a, &b));
    }
}
