pub mod component;
pub mod engine;
pub mod extractor;
pub mod plan;

pub use component::{InstallComponent, OrderConstraint};
pub use engine::{ComponentOutcome, ComponentReport, InstallEngine, InstallEvent, InstallReport};
pub use extractor::{ArchiveExtractor, AutoExtractor, Extractor, ZipArchiveExtractor};
pub use plan::{InstallPlan, PlanStep, Remediation};
