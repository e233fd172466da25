use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One installable unit (base game, expansion, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallComponent {
    pub name: String,
    /// Archive or unpacked medium holding the component's files.
    pub archive: PathBuf,
    /// The user asked for this component in this run.
    #[serde(default)]
    pub selected: bool,
    /// Already present in the destination from an earlier run.
    #[serde(default)]
    pub installed: bool,
}

impl InstallComponent {
    pub fn new(name: impl Into<String>, archive: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            archive: archive.into(),
            selected: false,
            installed: false,
        }
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn installed(mut self, installed: bool) -> Self {
        self.installed = installed;
        self
    }

    /// Label shown in a component list.
    pub fn label(&self) -> String {
        if self.installed {
            format!("{}\t\t(installed)", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// "Install `before` before `after`."
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderConstraint {
    pub before: String,
    pub after: String,
}

impl OrderConstraint {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }
}
