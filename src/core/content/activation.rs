use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use super::index::DependencyIndex;
use super::record::{normalize, FileRecord, OrderedCollection, Provenance};
use crate::core::error::ActivationError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    Active,
    Inactive,
}

/// Owns the enabled/disabled toggle of every record in the current load
/// cycle. Only `UserConfig` records ever change after seeding.
#[derive(Debug, Clone, Default)]
pub struct ActivationModel {
    active: HashSet<String>,
}

impl ActivationModel {
    /// Seed the states from what the loader reported.
    ///
    /// - `BuiltIn` is always active.
    /// - `ExternalConfig` keeps the declared flag.
    /// - `UserConfig` keeps the declared flag, unless the file is missing
    ///   from storage.
    pub fn seed(collection: &OrderedCollection) -> Self {
        let active = collection
            .records()
            .iter()
            .filter(|r| match r.provenance() {
                Provenance::BuiltIn => true,
                Provenance::ExternalConfig => r.declared_active(),
                Provenance::UserConfig => r.declared_active() && r.exists_on_disk(),
            })
            .map(|r| r.key().to_string())
            .collect();
        Self { active }
    }

    pub fn is_active(&self, record: &FileRecord) -> bool {
        self.active.contains(record.key())
    }

    pub fn state(&self, record: &FileRecord) -> ActivationState {
        if self.is_active(record) {
            ActivationState::Active
        } else {
            ActivationState::Inactive
        }
    }

    /// Toggle one user-controlled record. Does not touch dependencies and
    /// does not reorder anything.
    pub fn set_active(
        &mut self,
        collection: &OrderedCollection,
        index: &DependencyIndex,
        identifier: &str,
        active: bool,
    ) -> Result<(), ActivationError> {
        let record = index
            .resolve(collection, identifier)
            .ok_or_else(|| ActivationError::NotFound(identifier.to_string()))?;

        match record.provenance() {
            Provenance::BuiltIn => {
                return Err(ActivationError::ImmutableBuiltIn(
                    record.identifier().to_string(),
                ))
            }
            Provenance::ExternalConfig => {
                return Err(ActivationError::ImmutableExternal(
                    record.identifier().to_string(),
                ))
            }
            Provenance::UserConfig => {}
        }

        if active && !record.exists_on_disk() {
            return Err(ActivationError::MissingOnDisk(
                record.identifier().to_string(),
            ));
        }

        if active {
            self.active.insert(record.key().to_string());
        } else {
            self.active.remove(record.key());
        }
        debug!(
            "{} -> {}",
            record.identifier(),
            if active { "active" } else { "inactive" }
        );
        Ok(())
    }

    /// Apply the same toggle to many identifiers. Each one succeeds or fails
    /// on its own; a failure never stops the rest of the batch.
    pub fn set_active_many<I, S>(
        &mut self,
        collection: &OrderedCollection,
        index: &DependencyIndex,
        identifiers: I,
        active: bool,
    ) -> BulkOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcome = BulkOutcome::default();
        for id in identifiers {
            let id = id.as_ref();
            if outcome.contains(id) {
                continue;
            }
            let result = self.set_active(collection, index, id, active);
            outcome.push(id, result);
        }
        outcome
    }

    /// Clear every user-controlled toggle. Returns how many changed.
    pub fn deactivate_all_user(&mut self, collection: &OrderedCollection) -> usize {
        let mut changed = 0;
        for record in collection.records() {
            if record.provenance() == Provenance::UserConfig && self.active.remove(record.key()) {
                changed += 1;
            }
        }
        changed
    }

    /// Active records in load order.
    pub fn active_records<'a>(
        &'a self,
        collection: &'a OrderedCollection,
    ) -> impl Iterator<Item = &'a FileRecord> + 'a {
        collection
            .records()
            .iter()
            .filter(move |r| self.active.contains(r.key()))
    }
}

/// Per-identifier results of a bulk toggle, in input order. Repeated
/// identifiers (ignoring case) appear once.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkOutcome {
    results: Vec<(String, Result<(), ActivationError>)>,
    #[serde(skip)]
    seen: HashMap<String, usize>,
}

impl BulkOutcome {
    fn push(&mut self, identifier: &str, result: Result<(), ActivationError>) {
        self.seen.insert(normalize(identifier), self.results.len());
        self.results.push((identifier.to_string(), result));
    }

    fn contains(&self, identifier: &str) -> bool {
        self.seen.contains_key(&normalize(identifier))
    }

    pub fn get(&self, identifier: &str) -> Option<&Result<(), ActivationError>> {
        self.seen
            .get(&normalize(identifier))
            .map(|&i| &self.results[i].1)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Result<(), ActivationError>)> {
        self.results.iter().map(|(id, r)| (id.as_str(), r))
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, r)| r.is_ok()).map(|(id, _)| id)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &ActivationError)> {
        self.iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (id, e)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content::record::RawFileDescriptor;

    fn setup(raw: Vec<RawFileDescriptor>) -> (OrderedCollection, DependencyIndex, ActivationModel) {
        let c = OrderedCollection::from_descriptors(raw).unwrap();
        let i = DependencyIndex::build(&c);
        let a = ActivationModel::seed(&c);
        (c, i, a)
    }

    #[test]
    fn seeding_respects_provenance() {
        let (c, _, a) = setup(vec![
            RawFileDescriptor::new("Base.esm").provenance(Provenance::BuiltIn),
            RawFileDescriptor::new("Pinned.esp").provenance(Provenance::ExternalConfig).active(true),
            RawFileDescriptor::new("Gone.esp").active(true).missing(),
            RawFileDescriptor::new("Mod.esp").active(true),
        ]);
        let states: Vec<_> = c.records().iter().map(|r| a.state(r)).collect();
        assert_eq!(
            states,
            [
                ActivationState::Active,
                ActivationState::Active,
                ActivationState::Inactive,
                ActivationState::Active
            ]
        );
    }

    #[test]
    fn immutable_records_refuse_and_stay_unchanged() {
        let (c, i, mut a) = setup(vec![
            RawFileDescriptor::new("Base.esm").provenance(Provenance::BuiltIn),
            RawFileDescriptor::new("Pinned.esp").provenance(Provenance::ExternalConfig).active(true),
        ]);

        assert_eq!(
            a.set_active(&c, &i, "base.esm", false),
            Err(ActivationError::ImmutableBuiltIn("Base.esm".into()))
        );
        assert_eq!(
            a.set_active(&c, &i, "Pinned.esp", false),
            Err(ActivationError::ImmutableExternal("Pinned.esp".into()))
        );
        assert!(c.records().iter().all(|r| a.is_active(r)));
    }

    #[test]
    fn missing_file_cannot_be_activated_but_can_be_cleared() {
        let (c, i, mut a) = setup(vec![RawFileDescriptor::new("Gone.esp").missing()]);
        assert_eq!(
            a.set_active(&c, &i, "Gone.esp", true),
            Err(ActivationError::MissingOnDisk("Gone.esp".into()))
        );
        assert_eq!(a.set_active(&c, &i, "Gone.esp", false), Ok(()));
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let (c, i, mut a) = setup(vec![]);
        assert_eq!(
            a.set_active(&c, &i, "Nope.esp", true),
            Err(ActivationError::NotFound("Nope.esp".into()))
        );
    }

    #[test]
    fn activation_does_not_cascade() {
        let (c, i, mut a) = setup(vec![
            RawFileDescriptor::new("Lib.esp"),
            RawFileDescriptor::new("Mod.esp").requires(["Lib.esp"]),
        ]);
        a.set_active(&c, &i, "Mod.esp", true).unwrap();
        assert!(a.is_active(&c.records()[1]));
        assert!(!a.is_active(&c.records()[0]));
    }

    #[test]
    fn bulk_toggle_is_partial() {
        let (c, i, mut a) = setup(vec![
            RawFileDescriptor::new("Base.esm").provenance(Provenance::BuiltIn),
            RawFileDescriptor::new("A.esp"),
            RawFileDescriptor::new("B.esp"),
        ]);
        let outcome = a.set_active_many(&c, &i, ["A.esp", "Base.esm", "B.esp", "a.ESP"], false);

        assert_eq!(outcome.len(), 3);
        assert_eq!(outcome.get("A.esp"), Some(&Ok(())));
        assert_eq!(outcome.get("B.esp"), Some(&Ok(())));
        assert!(matches!(
            outcome.get("Base.esm"),
            Some(Err(ActivationError::ImmutableBuiltIn(_)))
        ));
        assert!(!outcome.all_succeeded());
        assert_eq!(outcome.failed().count(), 1);
    }

    #[test]
    fn deactivate_all_only_touches_user_files() {
        let (c, _, mut a) = setup(vec![
            RawFileDescriptor::new("Base.esm").provenance(Provenance::BuiltIn),
            RawFileDescriptor::new("A.esp").active(true),
            RawFileDescriptor::new("B.esp").active(true),
        ]);
        assert_eq!(a.deactivate_all_user(&c), 2);
        let active: Vec<_> = a.active_records(&c).map(|r| r.identifier()).collect();
        assert_eq!(active, ["Base.esm"]);
    }
}
