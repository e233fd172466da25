use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::extractor::{copy_tree, create_dir, ArchiveExtractor, AutoExtractor};
use super::plan::{InstallPlan, PlanStep};
use crate::core::error::{LauncherError, LauncherResult};

const STAGING_DIR: &str = "extract-temp";
const DATA_DIR: &str = "Data Files";
const PATCH_SUFFIX: &str = " Patch";
const APP_DIR: &str = "App Executables";

/// Game settings file shipped with the base game.
pub const GAME_INI: &str = "Morrowind.ini";

pub const DEFAULT_EXTRA_DIRECTORIES: [&str; 5] = ["Fonts", "Music", "Sound", "Splash", "Video"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ComponentOutcome {
    Installed { files: usize },
    Failed { reason: String },
    /// Not attempted because a component it must follow did not install.
    Skipped { blocked_by: String },
}

impl ComponentOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, ComponentOutcome::Installed { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentReport {
    pub component: String,
    #[serde(flatten)]
    pub outcome: ComponentOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallReport {
    pub session_id: Uuid,
    pub destination: PathBuf,
    pub components: Vec<ComponentReport>,
}

impl InstallReport {
    pub fn outcome(&self, component: &str) -> Option<&ComponentOutcome> {
        self.components
            .iter()
            .find(|r| r.component.eq_ignore_ascii_case(component))
            .map(|r| &r.outcome)
    }

    pub fn all_installed(&self) -> bool {
        self.components.iter().all(|r| r.outcome.is_installed())
    }
}

/// Progress notifications for a UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InstallEvent {
    Started { component: String },
    Extracted { component: String, files: usize },
    Progress { message: String },
    Finished { component: String, outcome: ComponentOutcome },
    Done { installed: usize, total: usize },
}

/// Everything a single step needs.
pub struct InstallContext<'a> {
    pub step: &'a PlanStep,
    pub destination: &'a Path,
    pub staging: &'a Path,
    pub extra_directories: &'a [String],
}

impl InstallContext<'_> {
    /// Folder the medium lives in; loose directories are copied from here.
    fn medium_dir(&self) -> Option<&Path> {
        if self.medium_is_extracted() {
            Some(self.step.archive.as_path())
        } else {
            self.step.archive.parent()
        }
    }

    /// A directory medium is staged as a whole, its `Data Files` included.
    fn medium_is_extracted(&self) -> bool {
        self.step.archive.is_dir()
    }
}

/// What [`place_files`] put into the destination.
struct Placed {
    files: usize,
    ini: bool,
}

/// Lays the components of an [`InstallPlan`] onto disk in plan order.
pub struct InstallEngine<E = AutoExtractor> {
    extractor: E,
    destination: PathBuf,
    extra_directories: Vec<String>,
    events: Option<UnboundedSender<InstallEvent>>,
}

impl InstallEngine<AutoExtractor> {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self::with_extractor(AutoExtractor, destination)
    }
}

impl<E: ArchiveExtractor> InstallEngine<E> {
    pub fn with_extractor(extractor: E, destination: impl Into<PathBuf>) -> Self {
        Self {
            extractor,
            destination: destination.into(),
            extra_directories: DEFAULT_EXTRA_DIRECTORIES
                .iter()
                .map(|d| d.to_string())
                .collect(),
            events: None,
        }
    }

    pub fn extra_directories(mut self, directories: Vec<String>) -> Self {
        self.extra_directories = directories;
        self
    }

    pub fn events(mut self, sender: UnboundedSender<InstallEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    fn emit(&self, event: InstallEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Install every step. A failing step does not abort the run: steps
    /// that must follow it are skipped, the rest still install.
    pub async fn run(&self, plan: &InstallPlan) -> LauncherResult<InstallReport> {
        let session_id = Uuid::new_v4();
        info!(
            "Install session {} into {:?}: {} components",
            session_id,
            self.destination,
            plan.steps().len()
        );
        create_dir(&self.destination)?;
        let staging = self.destination.join(STAGING_DIR);

        let mut reports: Vec<ComponentReport> = Vec::with_capacity(plan.steps().len());
        for step in plan.steps() {
            let blocker = step.after.iter().find(|name| {
                reports
                    .iter()
                    .any(|r| &r.component == *name && !r.outcome.is_installed())
            });

            let outcome = if let Some(blocker) = blocker {
                info!("Skipping {}: {} did not install", step.component, blocker);
                ComponentOutcome::Skipped {
                    blocked_by: blocker.clone(),
                }
            } else {
                self.emit(InstallEvent::Started {
                    component: step.component.clone(),
                });
                let ctx = InstallContext {
                    step,
                    destination: &self.destination,
                    staging: &staging,
                    extra_directories: &self.extra_directories,
                };
                match self.install_step(&ctx).await {
                    Ok(files) => ComponentOutcome::Installed { files },
                    Err(e) => {
                        warn!("Failed to install {}: {}", step.component, e);
                        ComponentOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            };

            self.emit(InstallEvent::Finished {
                component: step.component.clone(),
                outcome: outcome.clone(),
            });
            reports.push(ComponentReport {
                component: step.component.clone(),
                outcome,
            });
        }

        if staging.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
                warn!("Could not remove staging dir {:?}: {}", staging, e);
            }
        }

        let installed = reports.iter().filter(|r| r.outcome.is_installed()).count();
        self.emit(InstallEvent::Done {
            installed,
            total: reports.len(),
        });
        info!(
            "Install session {} finished: {}/{} installed",
            session_id,
            installed,
            reports.len()
        );

        Ok(InstallReport {
            session_id,
            destination: self.destination.clone(),
            components: reports,
        })
    }

    async fn install_step(&self, ctx: &InstallContext<'_>) -> LauncherResult<usize> {
        info!(
            "Installing {}{}",
            ctx.step.component,
            if ctx.step.reinstall { " (re-install)" } else { "" }
        );

        // staging starts empty for each component
        if ctx.staging.exists() {
            tokio::fs::remove_dir_all(ctx.staging)
                .await
                .map_err(|e| LauncherError::Io {
                    path: ctx.staging.to_path_buf(),
                    source: e,
                })?;
        }
        let component_staging = ctx.staging.join(ctx.step.component.to_lowercase());
        create_dir(&component_staging)?;

        let extracted = self
            .extractor
            .extract(&ctx.step.archive, &component_staging)
            .await
            .map_err(|e| install_error(&ctx.step.component, e))?;
        self.emit(InstallEvent::Extracted {
            component: ctx.step.component.clone(),
            files: extracted,
        });
        self.emit(InstallEvent::Progress {
            message: format!("Installing: {} directory", DATA_DIR),
        });

        let destination = ctx.destination.to_path_buf();
        let medium = ctx.medium_dir().map(Path::to_path_buf);
        let loose_data = !ctx.medium_is_extracted();
        let extras = ctx.extra_directories.to_vec();
        let placed = tokio::task::spawn_blocking(move || {
            place_files(
                &component_staging,
                &destination,
                medium.as_deref(),
                loose_data,
                &extras,
            )
        })
        .await
        .map_err(|e| LauncherError::Other(format!("Install task failed: {}", e)))?
        .map_err(|e| install_error(&ctx.step.component, e))?;

        if placed.ini {
            self.emit(InstallEvent::Progress {
                message: format!("Installing: {}", GAME_INI),
            });
        }
        debug!("{}: {} files placed", ctx.step.component, placed.files);
        Ok(placed.files)
    }
}

fn install_error(component: &str, e: LauncherError) -> LauncherError {
    match e {
        LauncherError::Install { .. } => e,
        other => LauncherError::Install {
            component: component.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Move the staged `Data Files` and game settings file into the
/// destination, copy loose media directories, then apply any bundled
/// patches to files already present.
fn place_files(
    staging: &Path,
    destination: &Path,
    medium: Option<&Path>,
    loose_data: bool,
    extra_directories: &[String],
) -> LauncherResult<Placed> {
    let data = staging.join(DATA_DIR);
    if !data.is_dir() {
        return Err(LauncherError::Other(format!(
            "No {} directory in the extracted archive",
            DATA_DIR
        )));
    }
    let mut placed = copy_tree(&data, destination)?;
    std::fs::remove_dir_all(&data).map_err(|e| LauncherError::Io {
        path: data.clone(),
        source: e,
    })?;

    let ini = staging.join(APP_DIR).join(GAME_INI);
    let ini_found = ini.is_file();
    if ini_found {
        let target = destination.join(GAME_INI);
        debug!("Moving {:?} to {:?}", ini, target);
        std::fs::copy(&ini, &target).map_err(|e| LauncherError::Io {
            path: target.clone(),
            source: e,
        })?;
        std::fs::remove_file(&ini).map_err(|e| LauncherError::Io {
            path: ini.clone(),
            source: e,
        })?;
        placed += 1;
    }

    if let Some(medium) = medium {
        for name in extra_directories {
            let dir = medium.join(name);
            if dir.is_dir() && !dir.is_symlink() {
                debug!("Copying {} directory", name);
                placed += copy_tree(&dir, &destination.join(name))?;
            }
        }
        let loose = medium.join(DATA_DIR);
        if loose_data && loose.is_dir() {
            placed += copy_tree(&loose, destination)?;
        }
    }

    placed += apply_patches(staging, destination)?;
    Ok(Placed {
        files: placed,
        ini: ini_found,
    })
}

/// A staged `<Name> Patch` directory replaces files of the same name that
/// an earlier component already installed. Files not yet installed are
/// left alone.
fn apply_patches(staging: &Path, destination: &Path) -> LauncherResult<usize> {
    let mut patched = 0;
    let entries = std::fs::read_dir(staging).map_err(|e| LauncherError::Io {
        path: staging.to_path_buf(),
        source: e,
    })?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(PATCH_SUFFIX) || !entry.path().is_dir() {
            continue;
        }
        let patch_files = std::fs::read_dir(entry.path()).map_err(|e| LauncherError::Io {
            path: entry.path(),
            source: e,
        })?;
        for file in patch_files.flatten() {
            let target = destination.join(file.file_name());
            if file.path().is_file() && target.is_file() {
                info!("Applying {}: {:?}", name, file.file_name());
                std::fs::copy(file.path(), &target).map_err(|e| LauncherError::Io {
                    path: target.clone(),
                    source: e,
                })?;
                patched += 1;
            }
        }
    }
    Ok(patched)
}
