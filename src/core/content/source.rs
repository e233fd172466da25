use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::record::RawFileDescriptor;
use crate::core::error::{LauncherError, LauncherResult};

/// Supplies one load cycle's worth of raw descriptors, in load order.
///
/// Implementations do the I/O; the controller never touches the file
/// system itself.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self) -> LauncherResult<Vec<RawFileDescriptor>>;
}

/// Reads descriptors from a JSON manifest and checks each file's presence
/// under `data_dir`.
///
/// Manifest entries with an empty `path` are looked up by identifier.
pub struct JsonManifestSource {
    manifest: PathBuf,
    data_dir: PathBuf,
}

impl JsonManifestSource {
    pub fn new(manifest: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest: manifest.into(),
            data_dir: data_dir.into(),
        }
    }

    fn resolve_path(&self, descriptor: &RawFileDescriptor) -> PathBuf {
        if descriptor.path.as_os_str().is_empty() {
            self.data_dir.join(&descriptor.identifier)
        } else if descriptor.path.is_absolute() {
            descriptor.path.clone()
        } else {
            self.data_dir.join(&descriptor.path)
        }
    }
}

#[async_trait]
impl ContentSource for JsonManifestSource {
    async fn fetch(&self) -> LauncherResult<Vec<RawFileDescriptor>> {
        let raw = tokio::fs::read_to_string(&self.manifest)
            .await
            .map_err(|e| LauncherError::Io {
                path: self.manifest.clone(),
                source: e,
            })?;
        let mut descriptors: Vec<RawFileDescriptor> = serde_json::from_str(&raw)?;

        for descriptor in &mut descriptors {
            let path = self.resolve_path(descriptor);
            descriptor.exists_on_disk = file_exists(&path).await;
            if !descriptor.exists_on_disk {
                debug!("Content file not on disk: {:?}", path);
            }
            descriptor.path = path;
        }

        info!(
            "Read {} content descriptors from {:?}",
            descriptors.len(),
            self.manifest
        );
        Ok(descriptors)
    }
}

/// Fixed descriptor list; handy for callers that already parsed their
/// configuration elsewhere.
pub struct StaticSource(pub Vec<RawFileDescriptor>);

#[async_trait]
impl ContentSource for StaticSource {
    async fn fetch(&self) -> LauncherResult<Vec<RawFileDescriptor>> {
        Ok(self.0.clone())
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
