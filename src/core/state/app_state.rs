use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::content::{ContentListStore, ContentSelectorController, JsonManifestSource};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::install::engine::DEFAULT_EXTRA_DIRECTORIES;
use crate::core::install::extractor::{copy_tree, create_dir};
use crate::core::install::{InstallComponent, InstallEngine, OrderConstraint};
use crate::core::wizard::WizardSession;

const APP_DIR_NAME: &str = "Launchpad";
const BOOTSTRAP_FILE: &str = "launchpad_bootstrap.json";
const SETTINGS_FILE: &str = "launcher_settings.json";
const CONTENT_LISTS_FILE: &str = "content_lists.json";

pub const DEFAULT_LOG_FILTER: &str = "info,launchpad_lib=debug";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LauncherSettings {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// JSON list of content descriptors in load order.
    pub content_manifest: Option<PathBuf>,
    /// Where content files live; defaults to the manifest's directory.
    pub content_data_dir: Option<PathBuf>,
    /// Default destination offered by the setup wizard.
    pub install_dir: Option<PathBuf>,
    /// Directories copied verbatim from an install medium.
    pub extra_install_directories: Vec<String>,
    pub install_components: Vec<InstallComponent>,
    pub install_order: Vec<OrderConstraint>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            content_manifest: None,
            content_data_dir: None,
            install_dir: None,
            extra_install_directories: DEFAULT_EXTRA_DIRECTORIES
                .iter()
                .map(|d| d.to_string())
                .collect(),
            install_components: Vec::new(),
            install_order: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BootstrapConfig {
    data_dir: PathBuf,
}

/// Everything one launcher session owns. Commands receive it explicitly.
pub struct AppState {
    pub data_dir: PathBuf,
    pub settings: LauncherSettings,
    pub content: ContentSelectorController,
    pub content_lists: ContentListStore,
    pub wizard: Option<WizardSession>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_data_dir(default_data_dir())
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let settings = load_json(&data_dir.join(SETTINGS_FILE)).unwrap_or_default();
        let content_lists = load_json(&data_dir.join(CONTENT_LISTS_FILE)).unwrap_or_default();
        info!("Launcher data dir: {:?}", data_dir);

        Self {
            data_dir,
            settings,
            content: ContentSelectorController::new(),
            content_lists,
            wizard: None,
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn content_lists_path(&self) -> PathBuf {
        self.data_dir.join(CONTENT_LISTS_FILE)
    }

    pub fn save_settings(&self) -> LauncherResult<()> {
        save_json(&self.settings_path(), &self.settings)
    }

    pub fn save_content_lists(&self) -> LauncherResult<()> {
        save_json(&self.content_lists_path(), &self.content_lists)
    }

    pub fn content_source(&self) -> Option<JsonManifestSource> {
        let manifest = self.settings.content_manifest.as_ref()?;
        let data_dir = self
            .settings
            .content_data_dir
            .clone()
            .or_else(|| manifest.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| self.data_dir.clone());
        Some(JsonManifestSource::new(manifest, data_dir))
    }

    /// Re-read the configured manifest into the controller. The previous
    /// state stays in place if reading or validation fails.
    pub async fn reload_content(&mut self) -> LauncherResult<()> {
        let source = self
            .content_source()
            .ok_or_else(|| LauncherError::Other("No content manifest configured".into()))?;
        self.content.load_from(&source).await
    }

    /// Start a fresh setup run from the configured components.
    pub fn start_wizard(&mut self) -> &mut WizardSession {
        let mut session = WizardSession::new(
            self.settings.install_components.clone(),
            self.settings.install_order.clone(),
        );
        if let Some(dir) = &self.settings.install_dir {
            session.set_target(dir.clone());
        }
        self.wizard.insert(session)
    }

    pub fn install_engine(&self, destination: impl Into<PathBuf>) -> InstallEngine {
        InstallEngine::new(destination)
            .extra_directories(self.settings.extra_install_directories.clone())
    }

    /// Point future sessions at another data dir, copying what is there now.
    pub fn relocate_data_dir(&mut self, target_dir: PathBuf) -> LauncherResult<PathBuf> {
        let destination = if target_dir
            .file_name()
            .map(|n| n.to_string_lossy() == APP_DIR_NAME)
            .unwrap_or(false)
        {
            target_dir
        } else {
            target_dir.join(APP_DIR_NAME)
        };
        if destination == self.data_dir {
            return Ok(destination);
        }

        self.copy_data_dir(&destination)?;
        save_json(
            &default_base_dir().join(BOOTSTRAP_FILE),
            &BootstrapConfig {
                data_dir: destination.clone(),
            },
        )?;
        info!("Launcher data dir moved to {:?}", destination);
        Ok(destination)
    }

    /// Copy the whole data dir to `destination` and switch to it. The
    /// in-memory settings and lists win over the copied files.
    fn copy_data_dir(&mut self, destination: &Path) -> LauncherResult<()> {
        if destination.starts_with(&self.data_dir) {
            return Err(LauncherError::Other(format!(
                "Cannot move the data dir into itself: {:?}",
                destination
            )));
        }
        create_dir(destination)?;
        if self.data_dir.is_dir() {
            let copied = copy_tree(&self.data_dir, destination)?;
            debug!("Copied {} files from {:?}", copied, self.data_dir);
        }
        self.data_dir = destination.to_path_buf();
        self.save_settings()?;
        self.save_content_lists()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => {
            debug!("No {:?}, using defaults", path);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring unreadable {:?}: {}", path, e);
            None
        }
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|e| LauncherError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base = default_base_dir();
    if let Some(cfg) = load_json::<BootstrapConfig>(&base.join(BOOTSTRAP_FILE)) {
        return cfg.data_dir;
    }
    base.join(APP_DIR_NAME)
}
