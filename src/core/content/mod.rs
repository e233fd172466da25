pub mod activation;
pub mod controller;
pub mod index;
pub mod lists;
pub mod record;
pub mod source;
pub mod validator;

pub use activation::{ActivationModel, ActivationState, BulkOutcome};
pub use controller::{ContentEntry, ContentSelectorController, Diagnostic};
pub use index::DependencyIndex;
pub use lists::ContentListStore;
pub use record::{FileKind, FileRecord, OrderedCollection, Provenance, RawFileDescriptor};
pub use source::{ContentSource, JsonManifestSource, StaticSource};
pub use validator::{OrderingValidator, Repair, Status};
