pub mod import;
pub mod session;

pub use import::{ImportOptions, ImportSettings, LANGUAGES};
pub use session::{InstallMethod, WizardSession, WizardState};
