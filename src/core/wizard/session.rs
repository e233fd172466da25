use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::import::{self, ImportOptions, ImportSettings};
use crate::core::error::{LauncherResult, PlanError, WizardError};
use crate::core::install::{
    ArchiveExtractor, InstallComponent, InstallEngine, InstallPlan, InstallReport, OrderConstraint,
    Remediation,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardState {
    Intro,
    MethodSelection,
    LanguageSelection,
    ExistingInstallation,
    InstallationTarget,
    ComponentSelection,
    Installation,
    Import,
    Conclusion,
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WizardState::Intro => "introduction",
            WizardState::MethodSelection => "method selection",
            WizardState::LanguageSelection => "language selection",
            WizardState::ExistingInstallation => "existing installation",
            WizardState::InstallationTarget => "installation target",
            WizardState::ComponentSelection => "component selection",
            WizardState::Installation => "installation",
            WizardState::Import => "import",
            WizardState::Conclusion => "conclusion",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMethod {
    /// Install from the retail media.
    RetailDisc,
    /// Use a copy that is already on disk.
    Existing,
}

/// One run of the setup flow. Every page reads and writes this object;
/// nothing about the run lives anywhere else.
#[derive(Debug, Clone, Serialize)]
pub struct WizardSession {
    id: Uuid,
    state: WizardState,
    history: Vec<WizardState>,
    method: Option<InstallMethod>,
    language: Option<String>,
    target: Option<PathBuf>,
    existing: Option<PathBuf>,
    components: Vec<InstallComponent>,
    constraints: Vec<OrderConstraint>,
    accept_reinstall: bool,
    import: ImportOptions,
    plan: Option<InstallPlan>,
    report: Option<InstallReport>,
}

impl WizardSession {
    pub fn new(components: Vec<InstallComponent>, constraints: Vec<OrderConstraint>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: WizardState::Intro,
            history: Vec::new(),
            method: None,
            language: None,
            target: None,
            existing: None,
            components,
            constraints,
            accept_reinstall: true,
            import: ImportOptions::default(),
            plan: None,
            report: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn history(&self) -> &[WizardState] {
        &self.history
    }

    pub fn method(&self) -> Option<InstallMethod> {
        self.method
    }

    pub fn components(&self) -> &[InstallComponent] {
        &self.components
    }

    pub fn plan(&self) -> Option<&InstallPlan> {
        self.plan.as_ref()
    }

    pub fn report(&self) -> Option<&InstallReport> {
        self.report.as_ref()
    }

    // ─── Page inputs ───

    pub fn choose_method(&mut self, method: InstallMethod) {
        self.method = Some(method);
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = Some(language.into());
    }

    /// Where a retail install goes. Components already in that directory
    /// count as installed.
    pub fn set_target(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        import::detect_installed(&path, &mut self.components);
        self.target = Some(path);
    }

    pub fn set_existing_installation(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        import::detect_installed(&path, &mut self.components);
        self.existing = Some(path);
    }

    pub fn select_component(&mut self, name: &str, selected: bool) -> Result<(), PlanError> {
        let component = self
            .components
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| PlanError::UnknownComponent(name.to_string()))?;
        component.selected = selected;
        Ok(())
    }

    /// Answer to "re-install in the corrected order?".
    pub fn accept_reinstall(&mut self, accept: bool) {
        self.accept_reinstall = accept;
    }

    pub fn set_import_options(&mut self, options: ImportOptions) {
        self.import = options;
    }

    /// Remediations the current selection would need, without committing.
    pub fn pending_remediations(&self) -> Result<Vec<Remediation>, PlanError> {
        InstallPlan::build(&self.components, &self.constraints)
            .map(|plan| plan.remediations().to_vec())
    }

    /// Directory the session installs into or imports from.
    pub fn installation_path(&self) -> Option<&Path> {
        match self.method? {
            InstallMethod::RetailDisc => self.target.as_deref(),
            InstallMethod::Existing => self.existing.as_deref(),
        }
    }

    // ─── Transitions ───

    /// Validate the current page and move to the next one.
    pub fn advance(&mut self) -> Result<WizardState, WizardError> {
        let next = self.next_state()?;
        info!("Wizard {}: {} -> {}", self.id, self.state, next);
        self.history.push(self.state);
        self.state = next;
        Ok(next)
    }

    pub fn back(&mut self) -> Result<WizardState, WizardError> {
        if self.state == WizardState::Conclusion {
            return Err(self.invalid("back"));
        }
        if self.report.is_some()
            && matches!(self.state, WizardState::Installation | WizardState::Import)
        {
            return Err(self.blocked("installation has already run"));
        }
        let previous = self.history.pop().ok_or_else(|| self.invalid("back"))?;
        info!("Wizard {}: {} <- {}", self.id, previous, self.state);
        self.state = previous;
        Ok(previous)
    }

    fn next_state(&mut self) -> Result<WizardState, WizardError> {
        use WizardState::*;

        match self.state {
            Intro => Ok(MethodSelection),
            MethodSelection => match self.method {
                Some(InstallMethod::RetailDisc) => Ok(InstallationTarget),
                Some(InstallMethod::Existing) => Ok(ExistingInstallation),
                None => Err(self.blocked("select an installation method")),
            },
            InstallationTarget => match &self.target {
                Some(_) => Ok(LanguageSelection),
                None => Err(self.blocked("select an installation directory")),
            },
            ExistingInstallation => match &self.existing {
                Some(_) => Ok(LanguageSelection),
                None => Err(self.blocked("select an existing installation")),
            },
            LanguageSelection => {
                if self.language.is_none() {
                    return Err(self.blocked("select a language"));
                }
                let complete = self.components.iter().all(|c| c.installed);
                if self.method == Some(InstallMethod::Existing) && complete {
                    Ok(Import)
                } else {
                    Ok(ComponentSelection)
                }
            }
            ComponentSelection => {
                let plan = InstallPlan::build(&self.components, &self.constraints)
                    .map_err(|e| self.blocked(e.to_string()))?;
                let plan = if self.accept_reinstall {
                    plan
                } else {
                    plan.without_remediation()
                };
                if plan.is_empty() {
                    self.plan = None;
                    return match self.method {
                        Some(InstallMethod::Existing) => Ok(Import),
                        _ => Err(self.blocked("select at least one component")),
                    };
                }
                self.plan = Some(plan);
                Ok(Installation)
            }
            Installation => match &self.report {
                None => Err(self.blocked("installation has not run")),
                Some(report) if !report.all_installed() => {
                    let failed: Vec<&str> = report
                        .components
                        .iter()
                        .filter(|r| !r.outcome.is_installed())
                        .map(|r| r.component.as_str())
                        .collect();
                    Err(self.blocked(format!("failed to install {}", failed.join(", "))))
                }
                Some(_) => Ok(Import),
            },
            Import => Ok(Conclusion),
            Conclusion => Err(self.invalid("forward")),
        }
    }

    fn blocked(&self, reason: impl Into<String>) -> WizardError {
        WizardError::Blocked {
            state: self.state.to_string(),
            reason: reason.into(),
        }
    }

    fn invalid(&self, direction: &'static str) -> WizardError {
        WizardError::InvalidTransition {
            state: self.state.to_string(),
            direction,
        }
    }

    // ─── Work done on pages ───

    /// Run the committed plan. Only valid on the installation page.
    pub async fn install<E: ArchiveExtractor>(
        &mut self,
        engine: &InstallEngine<E>,
    ) -> LauncherResult<&InstallReport> {
        if self.state != WizardState::Installation {
            return Err(self.blocked("not on the installation page").into());
        }
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| self.blocked("no install plan"))?;
        let report = engine.run(plan).await?;
        if report.all_installed() {
            for component in &mut self.components {
                if report.outcome(&component.name).is_some() {
                    component.installed = true;
                    component.selected = false;
                }
            }
        } else {
            warn!("Wizard {}: installation finished with failures", self.id);
        }
        Ok(self.report.insert(report))
    }

    /// Arguments for the settings importer, once the flow reached import.
    pub fn import_settings(&self) -> Option<ImportSettings> {
        let path = self.installation_path()?;
        let retail = self.method == Some(InstallMethod::RetailDisc);
        let language = self.language.as_deref().unwrap_or_default();
        Some(ImportSettings {
            game_files: retail || self.import.addons,
            encoding: import::encoding_for(language).to_string(),
            fonts: self.import.fonts,
            ini: if retail {
                Some(path.join(import::GAME_INI))
            } else {
                import::find_ini(path)
            },
        })
    }

    pub fn conclusion_message(&self) -> &'static str {
        match (&self.report, self.method) {
            (Some(report), _) if !report.all_installed() => {
                "The wizard failed to install the game files."
            }
            (Some(_), _) => "The game files were installed successfully.",
            (None, Some(InstallMethod::Existing)) => {
                "The existing installation was set up successfully."
            }
            (None, _) => "The wizard was cancelled.",
        }
    }
}
