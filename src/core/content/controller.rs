use serde::Serialize;
use tracing::{debug, info, warn};

use super::activation::{ActivationModel, ActivationState, BulkOutcome};
use super::index::DependencyIndex;
use super::record::{FileKind, FileRecord, OrderedCollection, Provenance, RawFileDescriptor};
use super::source::ContentSource;
use super::validator::{OrderingValidator, Repair, Status};
use crate::core::error::{
    ActivationError, CollectionError, LauncherError, LauncherResult, RepairError,
};

/// One non-ok status, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub identifier: String,
    pub status: Status,
    pub message: String,
}

impl Diagnostic {
    fn new(identifier: &str, status: &Status) -> Self {
        Self {
            identifier: identifier.to_string(),
            status: status.clone(),
            message: status.to_string(),
        }
    }
}

/// Row of the content view handed to a UI.
#[derive(Debug, Clone, Serialize)]
pub struct ContentEntry {
    pub identifier: String,
    pub kind: FileKind,
    pub provenance: Provenance,
    pub state: ActivationState,
    pub status: Status,
    pub toggleable: bool,
}

/// Owns the load order of one configuration, its lookup index, the
/// activation toggles and the derived statuses.
///
/// Single owner, no internal locking: callers sharing one instance across
/// threads wrap it in a mutex.
#[derive(Debug, Default)]
pub struct ContentSelectorController {
    collection: OrderedCollection,
    index: DependencyIndex,
    activation: ActivationModel,
    statuses: Vec<Status>,
}

impl ContentSelectorController {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Loading ─────────────────────────────────────────

    /// Replace the whole state with `collection` and recompute every status.
    pub fn load(&mut self, collection: OrderedCollection) {
        let index = DependencyIndex::build(&collection);
        let activation = ActivationModel::seed(&collection);
        self.collection = collection;
        self.index = index;
        self.activation = activation;
        self.recompute();
        info!(
            "Loaded {} content files ({} with problems)",
            self.collection.len(),
            self.statuses.iter().filter(|s| !s.is_ok()).count()
        );
    }

    /// Validate raw descriptors and load them. On error the previous state
    /// is kept as is.
    pub fn load_descriptors(&mut self, raw: Vec<RawFileDescriptor>) -> Result<(), CollectionError> {
        let collection = OrderedCollection::from_descriptors(raw)?;
        self.load(collection);
        Ok(())
    }

    /// Fetch from a collaborator and load. State only changes once the
    /// source has produced a complete, valid set; dropping the returned
    /// future before that leaves everything untouched.
    pub async fn load_from(&mut self, source: &dyn ContentSource) -> LauncherResult<()> {
        let raw = source.fetch().await?;
        let collection = OrderedCollection::from_descriptors(raw).map_err(|e| {
            warn!("Rejected content set: {}", e);
            LauncherError::from(e)
        })?;
        self.load(collection);
        Ok(())
    }

    fn recompute(&mut self) {
        self.statuses =
            OrderingValidator::compute_all(&self.collection, &self.index, &self.activation);
    }

    fn reindex(&mut self) {
        self.index = DependencyIndex::build(&self.collection);
        self.recompute();
    }

    // ── Queries ─────────────────────────────────────────

    pub fn records(&self) -> &[FileRecord] {
        self.collection.records()
    }

    pub fn record(&self, identifier: &str) -> Option<&FileRecord> {
        self.index.resolve(&self.collection, identifier)
    }

    pub fn status_of(&self, identifier: &str) -> Result<Status, ActivationError> {
        self.index
            .position(identifier)
            .and_then(|pos| self.statuses.get(pos).cloned())
            .ok_or_else(|| ActivationError::NotFound(identifier.to_string()))
    }

    pub fn is_active(&self, identifier: &str) -> Result<bool, ActivationError> {
        self.record(identifier)
            .map(|r| self.activation.is_active(r))
            .ok_or_else(|| ActivationError::NotFound(identifier.to_string()))
    }

    /// Full view in load order.
    pub fn entries(&self) -> Vec<ContentEntry> {
        self.collection
            .records()
            .iter()
            .zip(&self.statuses)
            .map(|(record, status)| ContentEntry {
                identifier: record.identifier().to_string(),
                kind: record.kind(),
                provenance: record.provenance(),
                state: self.activation.state(record),
                status: status.clone(),
                toggleable: record.provenance() == Provenance::UserConfig,
            })
            .collect()
    }

    /// Every record whose status isn't ok, in load order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.collection
            .records()
            .iter()
            .zip(&self.statuses)
            .filter(|(_, status)| !status.is_ok())
            .map(|(record, status)| Diagnostic::new(record.identifier(), status))
            .collect()
    }

    /// Active files in load order.
    pub fn active_files(&self) -> Vec<&FileRecord> {
        self.activation.active_records(&self.collection).collect()
    }

    /// Identifiers of active user-controlled files, in load order.
    pub fn active_user_identifiers(&self) -> Vec<String> {
        self.activation
            .active_records(&self.collection)
            .filter(|r| r.provenance() == Provenance::UserConfig)
            .map(|r| r.identifier().to_string())
            .collect()
    }

    /// Problems among active files that would break a launch. Fails outright
    /// when no game file is active.
    pub fn launch_readiness(&self) -> LauncherResult<Vec<Diagnostic>> {
        let has_game_file = self
            .activation
            .active_records(&self.collection)
            .any(|r| r.kind() == FileKind::GameFile);
        if !has_game_file {
            return Err(LauncherError::NoGameFileSelected);
        }

        Ok(self
            .collection
            .records()
            .iter()
            .zip(&self.statuses)
            .filter(|(record, status)| self.activation.is_active(record) && !status.is_ok())
            .map(|(record, status)| Diagnostic::new(record.identifier(), status))
            .collect())
    }

    /// Human readable description assembled from the record's metadata.
    pub fn summary(&self, identifier: &str) -> Result<String, ActivationError> {
        let record = self
            .record(identifier)
            .ok_or_else(|| ActivationError::NotFound(identifier.to_string()))?;

        let modified = record
            .modified_timestamp()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let dependencies = if record.requires().is_empty() {
            "none".to_string()
        } else {
            record
                .requires()
                .iter()
                .map(|dep| match self.record(dep) {
                    Some(found) => found.identifier().to_string(),
                    None => format!("{} (not found)", dep),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };

        let author = if record.author().is_empty() {
            "unknown"
        } else {
            record.author()
        };

        let mut text = format!(
            "Author: {}\nFormat version: {}\nModified: {}\nPath: {}\nDependencies: {}",
            author,
            record.format_version(),
            modified,
            record.path().display(),
            dependencies
        );
        if !record.description().is_empty() {
            text.push_str("\n\n");
            text.push_str(record.description());
        }
        Ok(text)
    }

    // ── Activation ──────────────────────────────────────

    pub fn set_active(&mut self, identifier: &str, active: bool) -> Result<(), ActivationError> {
        self.activation
            .set_active(&self.collection, &self.index, identifier, active)?;
        self.recompute();
        Ok(())
    }

    pub fn set_active_many<I, S>(&mut self, identifiers: I, active: bool) -> BulkOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let outcome = self.activation.set_active_many(
            &self.collection,
            &self.index,
            identifiers,
            active,
        );
        if outcome.succeeded().next().is_some() {
            self.recompute();
        }
        info!(
            "Bulk {}: {} ok, {} refused",
            if active { "check" } else { "uncheck" },
            outcome.succeeded().count(),
            outcome.failed().count()
        );
        outcome
    }

    /// Uncheck every user-controlled file.
    pub fn deactivate_all(&mut self) -> usize {
        let changed = self.activation.deactivate_all_user(&self.collection);
        if changed > 0 {
            self.recompute();
        }
        changed
    }

    // ── Ordering ────────────────────────────────────────

    /// Put `identifier` immediately before `anchor`. Already being there is
    /// a successful no-op.
    pub fn move_before(&mut self, identifier: &str, anchor: &str) -> Result<(), ActivationError> {
        let (from, anchor_pos) = self.positions(identifier, anchor)?;
        if from == anchor_pos || from + 1 == anchor_pos {
            return Ok(());
        }
        let to = if from < anchor_pos { anchor_pos - 1 } else { anchor_pos };
        self.collection.relocate(from, to);
        self.reindex();
        debug!("Moved {} before {}", identifier, anchor);
        Ok(())
    }

    /// Put `identifier` immediately after `anchor`.
    pub fn move_after(&mut self, identifier: &str, anchor: &str) -> Result<(), ActivationError> {
        let (from, anchor_pos) = self.positions(identifier, anchor)?;
        if from == anchor_pos || from == anchor_pos + 1 {
            return Ok(());
        }
        let to = if from < anchor_pos { anchor_pos } else { anchor_pos + 1 };
        self.collection.relocate(from, to);
        self.reindex();
        debug!("Moved {} after {}", identifier, anchor);
        Ok(())
    }

    fn positions(&self, identifier: &str, anchor: &str) -> Result<(usize, usize), ActivationError> {
        let from = self
            .index
            .position(identifier)
            .ok_or_else(|| ActivationError::NotFound(identifier.to_string()))?;
        let anchor_pos = self
            .index
            .position(anchor)
            .ok_or_else(|| ActivationError::NotFound(anchor.to_string()))?;
        Ok((from, anchor_pos))
    }

    // ── Repair ──────────────────────────────────────────

    pub fn suggest_repairs(&self) -> Result<Vec<Repair>, RepairError> {
        OrderingValidator::suggest_repairs(&self.collection, &self.index, &self.statuses)
    }

    pub fn apply_repair(&mut self, repair: &Repair) -> Result<(), RepairError> {
        match repair {
            Repair::MoveAfter { file, anchor } => {
                self.move_after(file, anchor).map_err(RepairError::from)
            }
        }
    }

    /// Reorder everything so each file follows its requirements, keeping the
    /// existing order where possible.
    pub fn apply_dependency_order(&mut self) -> Result<(), RepairError> {
        let order = OrderingValidator::dependency_order(&self.collection, &self.index)?;
        self.collection.reorder(&order);
        self.reindex();
        info!("Applied dependency order to {} files", self.collection.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content::source::StaticSource;

    fn controller(raw: Vec<RawFileDescriptor>) -> ContentSelectorController {
        let mut c = ContentSelectorController::new();
        c.load_descriptors(raw).unwrap();
        c
    }

    fn order(c: &ContentSelectorController) -> Vec<&str> {
        c.records().iter().map(|r| r.identifier()).collect()
    }

    fn mtb() -> Vec<RawFileDescriptor> {
        vec![
            RawFileDescriptor::new("M.esm").active(true),
            RawFileDescriptor::new("T.esp").requires(["M.esm"]).active(true),
            RawFileDescriptor::new("B.esp").requires(["M.esm"]).active(true),
        ]
    }

    #[test]
    fn scenario_all_ok_then_reordered() {
        let mut c = controller(mtb());
        for id in ["M.esm", "T.esp", "B.esp"] {
            assert_eq!(c.status_of(id), Ok(Status::Ok));
        }

        c.move_before("T.esp", "M.esm").unwrap();
        assert_eq!(order(&c), ["T.esp", "M.esm", "B.esp"]);
        assert_eq!(
            c.status_of("T.esp"),
            Ok(Status::LoadOrderViolation("M.esm".into()))
        );
        assert_eq!(c.status_of("B.esp"), Ok(Status::Ok));
    }

    #[test]
    fn moving_dependency_first_clears_violation() {
        let mut c = controller(vec![
            RawFileDescriptor::new("A.esp").requires(["B.esm"]).active(true),
            RawFileDescriptor::new("B.esm").active(true),
        ]);
        assert_eq!(
            c.status_of("A.esp"),
            Ok(Status::LoadOrderViolation("B.esm".into()))
        );
        c.move_before("B.esm", "A.esp").unwrap();
        assert_eq!(c.status_of("A.esp"), Ok(Status::Ok));
    }

    #[test]
    fn move_before_noop_and_not_found() {
        let mut c = controller(mtb());
        c.move_before("M.esm", "T.esp").unwrap();
        assert_eq!(order(&c), ["M.esm", "T.esp", "B.esp"]);

        assert_eq!(
            c.move_before("Nope.esp", "M.esm"),
            Err(ActivationError::NotFound("Nope.esp".into()))
        );
        assert_eq!(
            c.move_before("M.esm", "Nope.esp"),
            Err(ActivationError::NotFound("Nope.esp".into()))
        );
    }

    #[test]
    fn move_before_from_front_to_back() {
        let mut c = controller(mtb());
        c.move_before("M.esm", "B.esp").unwrap();
        assert_eq!(order(&c), ["T.esp", "M.esm", "B.esp"]);
    }

    #[test]
    fn status_of_unknown_is_not_found() {
        let c = controller(mtb());
        assert_eq!(
            c.status_of("X.esp"),
            Err(ActivationError::NotFound("X.esp".into()))
        );
    }

    #[test]
    fn reload_is_deterministic() {
        let mut c = controller(vec![
            RawFileDescriptor::new("T.esp").requires(["M.esm"]).active(true),
            RawFileDescriptor::new("M.esm").active(true),
            RawFileDescriptor::new("Q.esp").requires(["Gone.esm"]),
            RawFileDescriptor::new("Off.esp"),
            RawFileDescriptor::new("R.esp").requires(["Off.esp"]),
        ]);
        let first = c.entries().into_iter().map(|e| e.status).collect::<Vec<_>>();
        c.load_descriptors(vec![
            RawFileDescriptor::new("T.esp").requires(["M.esm"]).active(true),
            RawFileDescriptor::new("M.esm").active(true),
            RawFileDescriptor::new("Q.esp").requires(["Gone.esm"]),
            RawFileDescriptor::new("Off.esp"),
            RawFileDescriptor::new("R.esp").requires(["Off.esp"]),
        ])
        .unwrap();
        let second = c.entries().into_iter().map(|e| e.status).collect::<Vec<_>>();
        assert_eq!(first, second);
        assert_eq!(
            second,
            [
                Status::LoadOrderViolation("M.esm".into()),
                Status::Ok,
                Status::MissingDependency("Gone.esm".into()),
                Status::Ok,
                Status::DependencyInactive("Off.esp".into()),
            ]
        );
    }

    #[test]
    fn invalid_load_keeps_previous_state() {
        let mut c = controller(mtb());
        let err = c
            .load_descriptors(vec![
                RawFileDescriptor::new("X.esp"),
                RawFileDescriptor::new("x.esp"),
            ])
            .unwrap_err();
        assert_eq!(err, CollectionError::DuplicateIdentifier("x.esp".into()));
        assert_eq!(order(&c), ["M.esm", "T.esp", "B.esp"]);
    }

    #[test]
    fn external_config_cannot_be_toggled() {
        let mut c = controller(vec![RawFileDescriptor::new("P.esp")
            .provenance(Provenance::ExternalConfig)
            .active(true)]);
        assert_eq!(
            c.set_active("P.esp", false),
            Err(ActivationError::ImmutableExternal("P.esp".into()))
        );
        assert_eq!(c.is_active("P.esp"), Ok(true));
    }

    #[test]
    fn deactivating_dependency_updates_dependents() {
        let mut c = controller(mtb());
        c.set_active("M.esm", false).unwrap();
        assert_eq!(
            c.status_of("T.esp"),
            Ok(Status::DependencyInactive("M.esm".into()))
        );
        assert_eq!(c.diagnostics().len(), 2);
    }

    #[test]
    fn bulk_mixed_provenance() {
        let mut c = controller(vec![
            RawFileDescriptor::new("Base.esm").provenance(Provenance::BuiltIn),
            RawFileDescriptor::new("A.esp"),
            RawFileDescriptor::new("B.esp"),
        ]);
        let outcome = c.set_active_many(["Base.esm", "A.esp", "B.esp"], false);
        assert_eq!(outcome.len(), 3);
        assert_eq!(outcome.succeeded().collect::<Vec<_>>(), ["A.esp", "B.esp"]);
        assert_eq!(c.is_active("Base.esm"), Ok(true));

        let outcome = c.set_active_many(["A.esp", "B.esp"], true);
        assert!(outcome.all_succeeded());
        assert_eq!(c.active_user_identifiers(), ["A.esp", "B.esp"]);
    }

    #[test]
    fn summary_lists_metadata_and_dependencies() {
        let mut raw = RawFileDescriptor::new("T.esp").requires(["m.esm", "Gone.esm"]);
        raw.author = "Someone".into();
        raw.format_version = 1;
        raw.description = "Adds things.".into();
        raw.path = "/data/T.esp".into();
        raw.modified_timestamp = Some(
            chrono::DateTime::parse_from_rfc3339("2020-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&chrono::Utc),
        );
        let c = controller(vec![RawFileDescriptor::new("M.esm"), raw]);

        let text = c.summary("t.esp").unwrap();
        assert!(text.contains("Author: Someone"));
        assert!(text.contains("Format version: 1"));
        assert!(text.contains("Modified: 2020-01-02 03:04:05"));
        assert!(text.contains("Path: /data/T.esp"));
        assert!(text.contains("Dependencies: M.esm, Gone.esm (not found)"));
        assert!(text.ends_with("Adds things."));
    }

    #[test]
    fn launch_needs_an_active_game_file() {
        let mut c = controller(vec![
            RawFileDescriptor::new("M.esm"),
            RawFileDescriptor::new("T.esp").requires(["M.esm"]).active(true),
        ]);
        assert!(matches!(
            c.launch_readiness(),
            Err(LauncherError::NoGameFileSelected)
        ));

        c.set_active("M.esm", true).unwrap();
        assert!(c.launch_readiness().unwrap().is_empty());
    }

    #[test]
    fn repairs_and_dependency_order() {
        let mut c = controller(vec![
            RawFileDescriptor::new("T.esp").requires(["M.esm"]).active(true),
            RawFileDescriptor::new("B.esp").requires(["T.esp"]).active(true),
            RawFileDescriptor::new("M.esm").active(true),
        ]);
        let repairs = c.suggest_repairs().unwrap();
        assert_eq!(
            repairs,
            [Repair::MoveAfter {
                file: "T.esp".into(),
                anchor: "M.esm".into()
            }]
        );

        c.apply_dependency_order().unwrap();
        assert_eq!(order(&c), ["M.esm", "T.esp", "B.esp"]);
        assert!(c.diagnostics().is_empty());
    }

    #[test]
    fn apply_repair_moves_file_after_anchor() {
        let mut c = controller(vec![
            RawFileDescriptor::new("T.esp").requires(["M.esm"]).active(true),
            RawFileDescriptor::new("X.esp"),
            RawFileDescriptor::new("M.esm").active(true),
        ]);
        let repairs = c.suggest_repairs().unwrap();
        c.apply_repair(&repairs[0]).unwrap();
        assert_eq!(order(&c), ["X.esp", "M.esm", "T.esp"]);
        assert_eq!(c.status_of("T.esp"), Ok(Status::Ok));

        let stale = Repair::MoveAfter {
            file: "Gone.esp".into(),
            anchor: "M.esm".into(),
        };
        assert_eq!(
            c.apply_repair(&stale),
            Err(RepairError::NotFound("Gone.esp".into()))
        );
    }

    #[tokio::test]
    async fn load_from_failing_source_leaves_state() {
        let mut c = controller(mtb());
        let bad = StaticSource(vec![
            RawFileDescriptor::new("A.esp").requires(["a.esp"]),
        ]);
        assert!(c.load_from(&bad).await.is_err());
        assert_eq!(order(&c), ["M.esm", "T.esp", "B.esp"]);

        c.load_from(&StaticSource(vec![RawFileDescriptor::new("Z.esm")]))
            .await
            .unwrap();
        assert_eq!(order(&c), ["Z.esm"]);
    }
}
