use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::activation::BulkOutcome;
use super::controller::ContentSelectorController;
use crate::core::error::{LauncherError, LauncherResult};

/// Named selections of user content files ("content lists"). Only the
/// user-controlled files are stored; built-in and externally pinned files
/// follow their own rules on every load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentListStore {
    lists: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    current: Option<String>,
}

impl ContentListStore {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.lists.keys().map(String::as_str)
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn files(&self, name: &str) -> Option<&[String]> {
        self.lists.get(name).map(Vec::as_slice)
    }

    pub fn create(&mut self, name: &str) -> LauncherResult<()> {
        let name = valid_name(name)?;
        if self.lists.contains_key(name) {
            return Err(LauncherError::ContentListExists(name.to_string()));
        }
        self.lists.insert(name.to_string(), Vec::new());
        Ok(())
    }

    pub fn clone_list(&mut self, source: &str, name: &str) -> LauncherResult<()> {
        let files = self
            .lists
            .get(source)
            .cloned()
            .ok_or_else(|| LauncherError::ContentListNotFound(source.to_string()))?;
        let name = valid_name(name)?;
        if self.lists.contains_key(name) {
            return Err(LauncherError::ContentListExists(name.to_string()));
        }
        self.lists.insert(name.to_string(), files);
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> LauncherResult<()> {
        if self.lists.remove(name).is_none() {
            return Err(LauncherError::ContentListNotFound(name.to_string()));
        }
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        Ok(())
    }

    pub fn select(&mut self, name: &str) -> LauncherResult<()> {
        if !self.lists.contains_key(name) {
            return Err(LauncherError::ContentListNotFound(name.to_string()));
        }
        self.current = Some(name.to_string());
        Ok(())
    }

    /// Store the controller's active user files under `name`, creating the
    /// list when needed.
    pub fn capture(
        &mut self,
        name: &str,
        controller: &ContentSelectorController,
    ) -> LauncherResult<()> {
        let name = valid_name(name)?;
        let files = controller.active_user_identifiers();
        info!("Saved content list '{}' ({} files)", name, files.len());
        self.lists.insert(name.to_string(), files);
        Ok(())
    }

    /// Make the controller's user selection match the list: everything else
    /// is unchecked, then the list's files are checked. Files the list names
    /// but the controller can't activate show up as failures in the outcome.
    pub fn apply(
        &self,
        name: &str,
        controller: &mut ContentSelectorController,
    ) -> LauncherResult<BulkOutcome> {
        let files = self
            .lists
            .get(name)
            .ok_or_else(|| LauncherError::ContentListNotFound(name.to_string()))?;
        controller.deactivate_all();
        Ok(controller.set_active_many(files, true))
    }
}

fn valid_name(name: &str) -> LauncherResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LauncherError::Other("Content list name cannot be empty".into()));
    }
    Ok(trimmed)
}
