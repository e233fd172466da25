use std::collections::HashMap;

use super::record::{normalize, FileRecord, OrderedCollection};

/// Case-insensitive lookup from identifier to load-order position.
///
/// Absence is an expected condition: every lookup returns `None` instead of
/// failing.
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    positions: HashMap<String, usize>,
}

impl DependencyIndex {
    pub fn build(collection: &OrderedCollection) -> Self {
        let positions = collection
            .records()
            .iter()
            .enumerate()
            .map(|(pos, record)| (record.key().to_string(), pos))
            .collect();
        Self { positions }
    }

    pub fn position(&self, identifier: &str) -> Option<usize> {
        self.positions.get(&normalize(identifier)).copied()
    }

    pub fn resolve<'a>(
        &self,
        collection: &'a OrderedCollection,
        identifier: &str,
    ) -> Option<&'a FileRecord> {
        self.position(identifier).and_then(|pos| collection.get(pos))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.position(identifier).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content::record::RawFileDescriptor;

    #[test]
    fn resolves_ignoring_case() {
        let c = OrderedCollection::from_descriptors(vec![
            RawFileDescriptor::new("Morrowind.esm"),
            RawFileDescriptor::new("Tribunal.esm"),
        ])
        .unwrap();
        let index = DependencyIndex::build(&c);

        assert_eq!(index.position("tribunal.ESM"), Some(1));
        assert_eq!(
            index.resolve(&c, "MORROWIND.esm").map(|r| r.identifier()),
            Some("Morrowind.esm")
        );
        assert!(index.resolve(&c, "Bloodmoon.esm").is_none());
    }
}
