use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the entire launcher backend.
/// Every module returns `Result<T, LauncherError>` at its outer boundary;
/// the content and install models keep their own narrow error enums and
/// convert into this one with `?`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Content files ───────────────────────────────────
    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error(transparent)]
    Repair(#[from] RepairError),

    #[error("No game file selected")]
    NoGameFileSelected,

    // ── Content lists ───────────────────────────────────
    #[error("Content list not found: {0}")]
    ContentListNotFound(String),

    #[error("Content list already exists: {0}")]
    ContentListExists(String),

    // ── Installation ────────────────────────────────────
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("Failed to install component {component}: {reason}")]
    Install { component: String, reason: String },

    #[error(transparent)]
    Wizard(#[from] WizardError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

/// Rejections raised while assembling a load order from raw descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("Content file has an empty identifier")]
    EmptyIdentifier,

    #[error("Content file {0} is listed more than once")]
    DuplicateIdentifier(String),

    #[error("Content file {0} cannot depend on itself")]
    SelfDependency(String),
}

/// Why an activation toggle was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
    #[error("Unable to find file {0}")]
    NotFound(String),

    #[error("{0} is part of the base installation and cannot be disabled")]
    ImmutableBuiltIn(String),

    #[error("{0} is fixed by an external configuration and cannot be changed here")]
    ImmutableExternal(String),

    #[error("{0} is declared but missing from storage")]
    MissingOnDisk(String),
}

/// Reported by repair-suggestion tooling only; status computation never
/// needs a global cycle check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepairError {
    #[error("Unable to find file {0}")]
    NotFound(String),

    #[error("Load order cannot be repaired, these files require each other: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    #[error(transparent)]
    Activation(ActivationError),
}

impl From<ActivationError> for RepairError {
    fn from(e: ActivationError) -> Self {
        match e {
            ActivationError::NotFound(id) => RepairError::NotFound(id),
            other => RepairError::Activation(other),
        }
    }
}

/// Problems found while ordering installable components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Unknown installation component: {0}")]
    UnknownComponent(String),

    #[error("Installation component {0} is listed more than once")]
    DuplicateComponent(String),

    #[error("Conflicting install order: {first} and {second} both need to be installed first")]
    ConflictingOrder { first: String, second: String },
}

/// Refused wizard transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("Cannot go {direction} from {state}")]
    InvalidTransition {
        state: String,
        direction: &'static str,
    },

    #[error("Cannot leave {state}: {reason}")]
    Blocked { state: String, reason: String },
}

// ── Serialization for the command surface ───────────────
// Commands hand errors to a UI as their rendered message.
impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl serde::Serialize for ActivationError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
