use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::error::CollectionError;

/// Where a file's enabled/disabled state comes from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Picked by the user; the only kind the controller may toggle.
    UserConfig,
    /// Shipped with the installation; always active.
    BuiltIn,
    /// Pinned by a configuration file this model does not edit.
    ExternalConfig,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::UserConfig => write!(f, "user"),
            Provenance::BuiltIn => write!(f, "built-in"),
            Provenance::ExternalConfig => write!(f, "external"),
        }
    }
}

/// Content file kind, derived from the file extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// A master file a game can start from (`.esm`, `.omwgame`).
    GameFile,
    /// Everything layered on top of a game file (`.esp`, `.omwaddon`, ...).
    Addon,
}

impl FileKind {
    pub fn from_identifier(identifier: &str) -> Self {
        let ext = Path::new(identifier)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("esm") | Some("omwgame") => FileKind::GameFile,
            _ => FileKind::Addon,
        }
    }
}

/// A content file as handed over by the configuration/archive loader,
/// before any validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFileDescriptor {
    pub identifier: String,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub format_version: i32,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub modified_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default = "default_provenance")]
    pub provenance: Provenance,
    /// Initial toggle; ignored for built-in files.
    #[serde(default)]
    pub active: bool,
    #[serde(default = "default_exists")]
    pub exists_on_disk: bool,
}

fn default_provenance() -> Provenance {
    Provenance::UserConfig
}

fn default_exists() -> bool {
    true
}

impl RawFileDescriptor {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            requires: Vec::new(),
            format_version: 0,
            author: String::new(),
            description: String::new(),
            modified_timestamp: None,
            path: PathBuf::new(),
            provenance: Provenance::UserConfig,
            active: false,
            exists_on_disk: true,
        }
    }

    pub fn requires<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn missing(mut self) -> Self {
        self.exists_on_disk = false;
        self
    }
}

/// Immutable descriptor of one content file.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    identifier: String,
    key: String,
    kind: FileKind,
    format_version: i32,
    author: String,
    description: String,
    modified_timestamp: Option<DateTime<Utc>>,
    path: PathBuf,
    requires: Vec<String>,
    provenance: Provenance,
    declared_active: bool,
    exists_on_disk: bool,
}

impl FileRecord {
    /// Validate one descriptor. `requires` becomes an ordered set: repeats
    /// collapse onto their first occurrence.
    pub fn from_descriptor(raw: RawFileDescriptor) -> Result<Self, CollectionError> {
        let identifier = raw.identifier.trim().to_string();
        if identifier.is_empty() {
            return Err(CollectionError::EmptyIdentifier);
        }
        let key = normalize(&identifier);

        let mut seen = HashSet::new();
        let mut requires = Vec::with_capacity(raw.requires.len());
        for dep in raw.requires {
            let dep = dep.trim().to_string();
            if dep.is_empty() {
                continue;
            }
            let dep_key = normalize(&dep);
            if dep_key == key {
                return Err(CollectionError::SelfDependency(identifier));
            }
            if seen.insert(dep_key) {
                requires.push(dep);
            }
        }

        Ok(Self {
            kind: FileKind::from_identifier(&identifier),
            identifier,
            key,
            format_version: raw.format_version,
            author: raw.author,
            description: raw.description,
            modified_timestamp: raw.modified_timestamp,
            path: raw.path,
            requires,
            provenance: raw.provenance,
            declared_active: raw.active,
            exists_on_disk: raw.exists_on_disk,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Lowercased identifier used for every lookup.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn format_version(&self) -> i32 {
        self.format_version
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn modified_timestamp(&self) -> Option<DateTime<Utc>> {
        self.modified_timestamp
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Active flag as reported by the loader for this load cycle.
    pub fn declared_active(&self) -> bool {
        self.declared_active
    }

    pub fn exists_on_disk(&self) -> bool {
        self.exists_on_disk
    }
}

pub(crate) fn normalize(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

/// The full set of records in load order. Position in `records` *is* the
/// load order.
#[derive(Debug, Clone, Default)]
pub struct OrderedCollection {
    records: Vec<FileRecord>,
}

impl OrderedCollection {
    pub fn new(records: Vec<FileRecord>) -> Result<Self, CollectionError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.key().to_string()) {
                return Err(CollectionError::DuplicateIdentifier(
                    record.identifier().to_string(),
                ));
            }
        }
        Ok(Self { records })
    }

    pub fn from_descriptors(raw: Vec<RawFileDescriptor>) -> Result<Self, CollectionError> {
        let records = raw
            .into_iter()
            .map(FileRecord::from_descriptor)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(records)
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn get(&self, position: usize) -> Option<&FileRecord> {
        self.records.get(position)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Move the record at `from` so that it ends up at `to` in the
    /// resulting order.
    pub(crate) fn relocate(&mut self, from: usize, to: usize) {
        let record = self.records.remove(from);
        self.records.insert(to, record);
    }

    /// Rebuild the collection in the given permutation of positions.
    pub(crate) fn reorder(&mut self, order: &[usize]) {
        let mut slots: Vec<Option<FileRecord>> = self.records.drain(..).map(Some).collect();
        self.records = order.iter().filter_map(|&i| slots[i].take()).collect();
    }
}
