use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::content::{BulkOutcome, ContentEntry, Diagnostic, Repair};
use crate::core::error::{LauncherError, LauncherResult, WizardError};
use crate::core::install::{InstallComponent, InstallEvent, InstallReport, Remediation};
use crate::core::state::{AppState, LauncherSettings};
use crate::core::wizard::{ImportOptions, ImportSettings, InstallMethod, WizardState};

/// The state every command runs against; one lock serializes all calls.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn shared(state: AppState) -> SharedState {
    Arc::new(Mutex::new(state))
}

// ─── Content ───

#[derive(Debug, Serialize)]
pub struct ContentOverview {
    pub entries: Vec<ContentEntry>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ContentOverview {
    fn of(state: &AppState) -> Self {
        Self {
            entries: state.content.entries(),
            diagnostics: state.content.diagnostics(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetActivePayload {
    pub identifier: String,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveManyPayload {
    pub identifiers: Vec<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovePosition {
    Before,
    After,
}

#[derive(Debug, Deserialize)]
pub struct MoveContentPayload {
    pub identifier: String,
    pub anchor: String,
    pub position: MovePosition,
}

#[derive(Debug, Serialize)]
pub struct BulkItem {
    pub identifier: String,
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkActivationResponse {
    pub results: Vec<BulkItem>,
    pub overview: ContentOverview,
}

impl BulkActivationResponse {
    fn of(outcome: &BulkOutcome, state: &AppState) -> Self {
        let results = outcome
            .iter()
            .map(|(identifier, result)| BulkItem {
                identifier: identifier.to_string(),
                ok: result.is_ok(),
                error: result.as_ref().err().map(ToString::to_string),
            })
            .collect();
        Self {
            results,
            overview: ContentOverview::of(state),
        }
    }
}

pub async fn load_content(state: &SharedState) -> LauncherResult<ContentOverview> {
    let mut state = state.lock().await;
    state.reload_content().await?;
    Ok(ContentOverview::of(&state))
}

pub async fn content_statuses(state: &SharedState) -> LauncherResult<ContentOverview> {
    let state = state.lock().await;
    Ok(ContentOverview::of(&state))
}

pub async fn set_content_active(
    state: &SharedState,
    payload: SetActivePayload,
) -> LauncherResult<ContentOverview> {
    let mut state = state.lock().await;
    state
        .content
        .set_active(&payload.identifier, payload.active)?;
    Ok(ContentOverview::of(&state))
}

pub async fn set_content_active_many(
    state: &SharedState,
    payload: SetActiveManyPayload,
) -> LauncherResult<BulkActivationResponse> {
    let mut state = state.lock().await;
    let outcome = state
        .content
        .set_active_many(&payload.identifiers, payload.active);
    if !outcome.all_succeeded() {
        warn!(
            "{} of {} content files could not be changed",
            outcome.failed().count(),
            outcome.len()
        );
    }
    Ok(BulkActivationResponse::of(&outcome, &state))
}

pub async fn move_content(
    state: &SharedState,
    payload: MoveContentPayload,
) -> LauncherResult<ContentOverview> {
    let mut state = state.lock().await;
    match payload.position {
        MovePosition::Before => state
            .content
            .move_before(&payload.identifier, &payload.anchor)?,
        MovePosition::After => state
            .content
            .move_after(&payload.identifier, &payload.anchor)?,
    }
    Ok(ContentOverview::of(&state))
}

pub async fn content_summary(state: &SharedState, identifier: String) -> LauncherResult<String> {
    let state = state.lock().await;
    Ok(state.content.summary(&identifier)?)
}

pub async fn suggest_repairs(state: &SharedState) -> LauncherResult<Vec<Repair>> {
    let state = state.lock().await;
    Ok(state.content.suggest_repairs()?)
}

/// Reorder everything so each file loads after what it requires.
pub async fn repair_load_order(state: &SharedState) -> LauncherResult<ContentOverview> {
    let mut state = state.lock().await;
    state.content.apply_dependency_order()?;
    Ok(ContentOverview::of(&state))
}

pub async fn launch_readiness(state: &SharedState) -> LauncherResult<Vec<Diagnostic>> {
    let state = state.lock().await;
    state.content.launch_readiness()
}

// ─── Content lists ───

#[derive(Debug, Serialize)]
pub struct ContentListsResponse {
    pub names: Vec<String>,
    pub current: Option<String>,
}

impl ContentListsResponse {
    fn of(state: &AppState) -> Self {
        Self {
            names: state.content_lists.names().map(String::from).collect(),
            current: state.content_lists.current().map(String::from),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CloneContentListPayload {
    pub source: String,
    pub name: String,
}

pub async fn list_content_lists(state: &SharedState) -> LauncherResult<ContentListsResponse> {
    let state = state.lock().await;
    Ok(ContentListsResponse::of(&state))
}

pub async fn create_content_list(
    state: &SharedState,
    name: String,
) -> LauncherResult<ContentListsResponse> {
    let mut state = state.lock().await;
    state.content_lists.create(&name)?;
    state.save_content_lists()?;
    Ok(ContentListsResponse::of(&state))
}

pub async fn clone_content_list(
    state: &SharedState,
    payload: CloneContentListPayload,
) -> LauncherResult<ContentListsResponse> {
    let mut state = state.lock().await;
    state
        .content_lists
        .clone_list(&payload.source, &payload.name)?;
    state.save_content_lists()?;
    Ok(ContentListsResponse::of(&state))
}

pub async fn delete_content_list(
    state: &SharedState,
    name: String,
) -> LauncherResult<ContentListsResponse> {
    let mut state = state.lock().await;
    state.content_lists.delete(&name)?;
    state.save_content_lists()?;
    Ok(ContentListsResponse::of(&state))
}

/// Store the current selection of user files under `name`.
pub async fn save_content_list(
    state: &SharedState,
    name: String,
) -> LauncherResult<ContentListsResponse> {
    let mut guard = state.lock().await;
    let state = &mut *guard;
    state.content_lists.capture(&name, &state.content)?;
    state.content_lists.select(&name)?;
    state.save_content_lists()?;
    Ok(ContentListsResponse::of(state))
}

/// Make `name` current and apply its selection to the loaded content.
pub async fn select_content_list(
    state: &SharedState,
    name: String,
) -> LauncherResult<BulkActivationResponse> {
    let mut guard = state.lock().await;
    let state = &mut *guard;
    let outcome = state.content_lists.apply(&name, &mut state.content)?;
    state.content_lists.select(&name)?;
    state.save_content_lists()?;
    info!("Selected content list '{}'", name);
    Ok(BulkActivationResponse::of(&outcome, state))
}

// ─── Settings ───

pub async fn get_launcher_settings(state: &SharedState) -> LauncherResult<LauncherSettings> {
    let state = state.lock().await;
    Ok(state.settings.clone())
}

pub async fn update_launcher_settings(
    state: &SharedState,
    settings: LauncherSettings,
) -> LauncherResult<LauncherSettings> {
    let mut state = state.lock().await;
    state.settings = settings;
    state.save_settings()?;
    info!("Launcher settings updated");
    Ok(state.settings.clone())
}

// ─── Setup wizard ───

#[derive(Debug, Serialize)]
pub struct WizardSnapshot {
    pub id: Uuid,
    pub state: WizardState,
    pub history: Vec<WizardState>,
    pub method: Option<InstallMethod>,
    pub components: Vec<InstallComponent>,
    pub install_order: Vec<String>,
    pub remediations: Vec<Remediation>,
    pub import: Option<ImportSettings>,
    pub message: &'static str,
}

/// Page inputs; absent fields are left as they are.
#[derive(Debug, Default, Deserialize)]
pub struct WizardInputPayload {
    pub method: Option<InstallMethod>,
    pub language: Option<String>,
    pub target: Option<PathBuf>,
    pub existing: Option<PathBuf>,
    #[serde(default)]
    pub selections: Vec<(String, bool)>,
    pub accept_reinstall: Option<bool>,
    pub import: Option<ImportOptions>,
}

fn wizard_snapshot(state: &AppState) -> LauncherResult<WizardSnapshot> {
    let session = state.wizard.as_ref().ok_or_else(no_wizard)?;
    Ok(WizardSnapshot {
        id: session.id(),
        state: session.state(),
        history: session.history().to_vec(),
        method: session.method(),
        components: session.components().to_vec(),
        install_order: session
            .plan()
            .map(|p| p.steps().iter().map(|s| s.component.clone()).collect())
            .unwrap_or_default(),
        remediations: session.pending_remediations().unwrap_or_default(),
        import: session.import_settings(),
        message: session.conclusion_message(),
    })
}

fn no_wizard() -> LauncherError {
    LauncherError::Wizard(WizardError::InvalidTransition {
        state: "none".into(),
        direction: "anywhere",
    })
}

pub async fn start_wizard(state: &SharedState) -> LauncherResult<WizardSnapshot> {
    let mut state = state.lock().await;
    let id = state.start_wizard().id();
    info!("Started setup wizard {}", id);
    wizard_snapshot(&state)
}

pub async fn update_wizard(
    state: &SharedState,
    payload: WizardInputPayload,
) -> LauncherResult<WizardSnapshot> {
    let mut state = state.lock().await;
    let session = state.wizard.as_mut().ok_or_else(no_wizard)?;
    if let Some(method) = payload.method {
        session.choose_method(method);
    }
    if let Some(language) = payload.language {
        session.set_language(language);
    }
    if let Some(target) = payload.target {
        session.set_target(target);
    }
    if let Some(existing) = payload.existing {
        session.set_existing_installation(existing);
    }
    for (name, selected) in &payload.selections {
        session.select_component(name, *selected)?;
    }
    if let Some(accept) = payload.accept_reinstall {
        session.accept_reinstall(accept);
    }
    if let Some(import) = payload.import {
        session.set_import_options(import);
    }
    wizard_snapshot(&state)
}

pub async fn wizard_next(state: &SharedState) -> LauncherResult<WizardSnapshot> {
    let mut state = state.lock().await;
    state.wizard.as_mut().ok_or_else(no_wizard)?.advance()?;
    wizard_snapshot(&state)
}

pub async fn wizard_back(state: &SharedState) -> LauncherResult<WizardSnapshot> {
    let mut state = state.lock().await;
    state.wizard.as_mut().ok_or_else(no_wizard)?.back()?;
    wizard_snapshot(&state)
}

/// Run the wizard's committed install plan into its installation path.
pub async fn wizard_install(
    state: &SharedState,
    events: Option<UnboundedSender<InstallEvent>>,
) -> LauncherResult<InstallReport> {
    let mut state = state.lock().await;
    let destination = state
        .wizard
        .as_ref()
        .ok_or_else(no_wizard)?
        .installation_path()
        .map(PathBuf::from)
        .ok_or_else(|| LauncherError::Other("No installation directory selected".into()))?;

    let mut engine = state.install_engine(destination);
    if let Some(tx) = events {
        engine = engine.events(tx);
    }
    let session = state.wizard.as_mut().ok_or_else(no_wizard)?;
    let report = session.install(&engine).await?.clone();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::install::{ComponentOutcome, OrderConstraint};

    fn write_manifest(dir: &std::path::Path) -> PathBuf {
        for file in ["Base.esm", "A.esp", "B.esp"] {
            std::fs::write(dir.join(file), "").unwrap();
        }
        let manifest = dir.join("content.json");
        std::fs::write(
            &manifest,
            serde_json::json!([
                { "identifier": "Base.esm", "provenance": "built_in" },
                { "identifier": "A.esp", "requires": ["Base.esm"], "active": true },
                { "identifier": "B.esp", "requires": ["A.esp"] }
            ])
            .to_string(),
        )
        .unwrap();
        manifest
    }

    async fn loaded_state(dir: &std::path::Path) -> SharedState {
        let mut app = AppState::with_data_dir(dir);
        app.settings.content_manifest = Some(write_manifest(dir));
        let state = shared(app);
        load_content(&state).await.unwrap();
        state
    }

    #[tokio::test]
    async fn toggling_and_moving_update_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let state = loaded_state(dir.path()).await;

        let overview = set_content_active(
            &state,
            SetActivePayload {
                identifier: "B.esp".into(),
                active: true,
            },
        )
        .await
        .unwrap();
        assert!(overview.diagnostics.is_empty());

        let overview = move_content(
            &state,
            MoveContentPayload {
                identifier: "B.esp".into(),
                anchor: "A.esp".into(),
                position: MovePosition::Before,
            },
        )
        .await
        .unwrap();
        assert_eq!(overview.diagnostics.len(), 1);
        assert_eq!(overview.diagnostics[0].identifier, "B.esp");

        let repairs = suggest_repairs(&state).await.unwrap();
        assert_eq!(repairs.len(), 1);
        let overview = repair_load_order(&state).await.unwrap();
        assert!(overview.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn refused_toggle_serializes_as_message() {
        let dir = tempfile::tempdir().unwrap();
        let state = loaded_state(dir.path()).await;

        let err = set_content_active(
            &state,
            SetActivePayload {
                identifier: "Base.esm".into(),
                active: false,
            },
        )
        .await
        .unwrap_err();
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.as_str().unwrap().contains("cannot be disabled"));
    }

    #[tokio::test]
    async fn bulk_activation_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = loaded_state(dir.path()).await;

        let response = set_content_active_many(
            &state,
            SetActiveManyPayload {
                identifiers: vec!["B.esp".into(), "Nope.esp".into()],
                active: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(response.results.len(), 2);
        assert!(response.results[0].ok);
        assert!(!response.results[1].ok);
        assert!(response.results[1].error.is_some());
    }

    #[tokio::test]
    async fn content_lists_are_saved_and_applied() {
        let dir = tempfile::tempdir().unwrap();
        let state = loaded_state(dir.path()).await;

        save_content_list(&state, "Just A".into()).await.unwrap();
        set_content_active(
            &state,
            SetActivePayload {
                identifier: "A.esp".into(),
                active: false,
            },
        )
        .await
        .unwrap();

        let response = select_content_list(&state, "Just A".into()).await.unwrap();
        assert!(response.results.iter().all(|r| r.ok));
        let lists = list_content_lists(&state).await.unwrap();
        assert_eq!(lists.current.as_deref(), Some("Just A"));
        assert!(dir.path().join("content_lists.json").is_file());

        assert!(matches!(
            delete_content_list(&state, "Missing".into()).await,
            Err(LauncherError::ContentListNotFound(_))
        ));
    }

    #[tokio::test]
    async fn launch_needs_a_game_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = shared(AppState::with_data_dir(dir.path()));
        assert!(matches!(
            launch_readiness(&state).await,
            Err(LauncherError::NoGameFileSelected)
        ));
    }

    #[tokio::test]
    async fn wizard_commands_walk_the_flow() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = AppState::with_data_dir(dir.path());
        app.settings.install_components = vec![
            InstallComponent::new("Base", dir.path().join("base.zip")),
            InstallComponent::new("Expansion", dir.path().join("expansion.zip")),
        ];
        app.settings.install_order = vec![OrderConstraint::new("Base", "Expansion")];
        let state = shared(app);

        assert!(wizard_next(&state).await.is_err());
        let snapshot = start_wizard(&state).await.unwrap();
        assert_eq!(snapshot.state, WizardState::Intro);

        wizard_next(&state).await.unwrap();
        update_wizard(
            &state,
            WizardInputPayload {
                method: Some(InstallMethod::RetailDisc),
                target: Some(dir.path().join("game")),
                language: Some("French".into()),
                selections: vec![("Expansion".into(), true), ("Base".into(), true)],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        for _ in 0..3 {
            wizard_next(&state).await.unwrap();
        }
        let snapshot = wizard_next(&state).await.unwrap();
        assert_eq!(snapshot.state, WizardState::Installation);
        assert_eq!(snapshot.install_order, ["Base", "Expansion"]);

        let back = wizard_back(&state).await.unwrap();
        assert_eq!(back.state, WizardState::ComponentSelection);
        wizard_next(&state).await.unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let report = wizard_install(&state, Some(tx)).await.unwrap();
        assert!(matches!(
            report.outcome("Base"),
            Some(ComponentOutcome::Failed { .. })
        ));
        assert_eq!(
            report.outcome("Expansion"),
            Some(&ComponentOutcome::Skipped {
                blocked_by: "Base".into()
            })
        );
        assert!(rx.try_recv().is_ok());

        match wizard_next(&state).await {
            Err(LauncherError::Wizard(WizardError::Blocked { reason, .. })) => {
                assert!(reason.contains("Base"))
            }
            other => panic!("unexpected {:?}", other.map(|s| s.state)),
        }
    }
}
