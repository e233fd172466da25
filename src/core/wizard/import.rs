use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::install::InstallComponent;

pub use crate::core::install::engine::GAME_INI;

/// Languages the retail media ship in.
pub const LANGUAGES: [&str; 7] = [
    "English", "French", "German", "Italian", "Polish", "Russian", "Spanish",
];

/// Which parts of a legacy setup should be carried over.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportOptions {
    #[serde(default)]
    pub addons: bool,
    #[serde(default)]
    pub fonts: bool,
}

/// What an importer needs to carry an installation's settings over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSettings {
    pub game_files: bool,
    pub encoding: String,
    pub fonts: bool,
    pub ini: Option<PathBuf>,
}

/// Text encoding of the legacy data for a language.
pub fn encoding_for(language: &str) -> &'static str {
    match language {
        "Polish" => "win1250",
        "Russian" => "win1251",
        _ => "win1252",
    }
}

/// Mark components whose master or archive file is already in `path`.
pub fn detect_installed(path: &Path, components: &mut [InstallComponent]) {
    for component in components.iter_mut() {
        let found = ["esm", "bsa"]
            .iter()
            .any(|ext| path.join(format!("{}.{}", component.name, ext)).is_file());
        if found {
            debug!("Found {} in {:?}", component.name, path);
            component.installed = true;
            component.selected = false;
        }
    }
}

/// Settings file for an installation: inside the data path, else its parent.
/// Retail installs put it next to the data files.
pub fn find_ini(path: &Path) -> Option<PathBuf> {
    let direct = path.join(GAME_INI);
    if direct.is_file() {
        return Some(direct);
    }
    path.parent()
        .map(|parent| parent.join(GAME_INI))
        .filter(|p| p.is_file())
}
