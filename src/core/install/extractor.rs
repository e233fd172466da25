use std::fs::File;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

/// Unpacks one component's medium into a staging directory.
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// Returns the number of files written under `staging`.
    async fn extract(&self, archive: &Path, staging: &Path) -> LauncherResult<usize>;
}

/// Zip archives.
pub struct ZipArchiveExtractor;

#[async_trait]
impl ArchiveExtractor for ZipArchiveExtractor {
    async fn extract(&self, archive: &Path, staging: &Path) -> LauncherResult<usize> {
        let archive = archive.to_path_buf();
        let staging = staging.to_path_buf();
        tokio::task::spawn_blocking(move || extract_zip(&archive, &staging))
            .await
            .map_err(|e| LauncherError::Other(format!("Extraction task failed: {}", e)))?
    }
}

fn extract_zip(archive_path: &Path, staging: &Path) -> LauncherResult<usize> {
    let file = File::open(archive_path).map_err(|e| LauncherError::Io {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let target = staging.join(relative);

        if entry.is_dir() {
            create_dir(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }
        let mut out = File::create(&target).map_err(|e| LauncherError::Io {
            path: target.clone(),
            source: e,
        })?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::Io {
            path: target.clone(),
            source: e,
        })?;
        written += 1;
    }

    debug!("Extracted {} files from {:?}", written, archive_path);
    Ok(written)
}

/// An already unpacked medium (a mounted disc or a copied folder).
pub struct DirectoryExtractor;

#[async_trait]
impl ArchiveExtractor for DirectoryExtractor {
    async fn extract(&self, archive: &Path, staging: &Path) -> LauncherResult<usize> {
        let source = archive.to_path_buf();
        let staging = staging.to_path_buf();
        tokio::task::spawn_blocking(move || copy_tree(&source, &staging))
            .await
            .map_err(|e| LauncherError::Other(format!("Copy task failed: {}", e)))?
    }
}

/// Picks the extractor for a medium without boxing.
pub enum Extractor {
    Zip(ZipArchiveExtractor),
    Directory(DirectoryExtractor),
}

impl Extractor {
    pub fn for_medium(path: &Path) -> Self {
        if path.is_dir() {
            Self::Directory(DirectoryExtractor)
        } else {
            Self::Zip(ZipArchiveExtractor)
        }
    }
}

#[async_trait]
impl ArchiveExtractor for Extractor {
    async fn extract(&self, archive: &Path, staging: &Path) -> LauncherResult<usize> {
        match self {
            Extractor::Zip(e) => e.extract(archive, staging).await,
            Extractor::Directory(e) => e.extract(archive, staging).await,
        }
    }
}

/// Chooses per medium on every call.
pub struct AutoExtractor;

#[async_trait]
impl ArchiveExtractor for AutoExtractor {
    async fn extract(&self, archive: &Path, staging: &Path) -> LauncherResult<usize> {
        Extractor::for_medium(archive).extract(archive, staging).await
    }
}

pub(crate) fn create_dir(path: &Path) -> LauncherResult<()> {
    std::fs::create_dir_all(path).map_err(|e| LauncherError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Recursive copy that overwrites existing files; returns files copied.
pub(crate) fn copy_tree(source: &Path, destination: &Path) -> LauncherResult<usize> {
    create_dir(destination)?;
    let mut copied = 0;
    for entry in std::fs::read_dir(source).map_err(io_err(source))? {
        let entry = entry.map_err(io_err(source))?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry.file_type().map_err(io_err(&src_path))?;

        if file_type.is_dir() {
            copied += copy_tree(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            if dst_path.exists() {
                std::fs::remove_file(&dst_path).map_err(io_err(&dst_path))?;
            }
            std::fs::copy(&src_path, &dst_path).map_err(io_err(&dst_path))?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> LauncherError {
    let path = path.to_path_buf();
    move |source| LauncherError::Io { path, source }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Writes a zip at `path` holding `files` as (name, contents).
    pub(crate) fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, contents) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn zip_extracts_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("base.zip");
        write_zip(
            &archive,
            &[
                ("Data Files/Base.esm", "TES3"),
                ("Data Files/Meshes/a.nif", "mesh"),
            ],
        );
        let staging = dir.path().join("staging");

        let count = ZipArchiveExtractor.extract(&archive, &staging).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            std::fs::read_to_string(staging.join("Data Files/Meshes/a.nif")).unwrap(),
            "mesh"
        );
    }

    #[tokio::test]
    async fn missing_archive_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ZipArchiveExtractor
            .extract(&dir.path().join("nope.zip"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::Io { .. }));
    }

    #[tokio::test]
    async fn auto_extractor_copies_directories() {
        let dir = tempfile::tempdir().unwrap();
        let medium = dir.path().join("disc");
        std::fs::create_dir_all(medium.join("Data Files")).unwrap();
        std::fs::write(medium.join("Data Files/Base.esm"), "TES3").unwrap();
        let staging = dir.path().join("staging");

        let count = AutoExtractor.extract(&medium, &staging).await.unwrap();

        assert_eq!(count, 1);
        assert!(staging.join("Data Files/Base.esm").is_file());
    }
}
