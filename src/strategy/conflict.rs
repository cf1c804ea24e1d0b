//! Movement conflict table for right-hand traffic
//!
//! Keys and entries use `"<Dir>-<Movement>"` codes. Lookups are symmetric:
//! two movements conflict when either one lists the other.

use std::collections::BTreeMap;

use crate::simulation::MovementKey;

/// Movements that may never be green together with the keyed movement
const STANDARD_CONFLICTS: &[(&str, &[&str])] = &[
    ("N-L", &["E-L", "E-F", "S-F", "S-R", "W-L", "W-F"]),
    ("N-F", &["E-L", "E-F", "S-L", "W-L", "W-F", "W-R"]),
    ("N-R", &["E-F", "S-L"]),
    ("E-L", &["S-L", "S-F", "W-F", "W-R", "N-L", "N-F"]),
    ("E-F", &["S-L", "S-F", "W-L", "N-L", "N-F", "N-R"]),
    ("E-R", &["S-F", "W-L"]),
    ("S-L", &["W-L", "W-F", "N-F", "N-R", "E-L", "E-F"]),
    ("S-F", &["W-L", "W-F", "N-L", "E-L", "E-F", "E-R"]),
    ("S-R", &["W-F", "N-L"]),
    ("W-L", &["N-L", "N-F", "E-F", "E-R", "S-L", "S-F"]),
    ("W-F", &["N-L", "N-F", "E-L", "S-L", "S-F", "S-R"]),
    ("W-R", &["N-F", "E-L"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ConflictTable {
    entries: BTreeMap<MovementKey, Vec<MovementKey>>,
}

impl Default for ConflictTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl ConflictTable {
    /// The full table for a four-way intersection
    pub fn standard() -> Self {
        let entries = STANDARD_CONFLICTS
            .iter()
            .filter_map(|(key, conflicts)| {
                let key: MovementKey = key.parse().ok()?;
                let conflicts: Vec<MovementKey> = conflicts
                    .iter()
                    .filter_map(|code| code.parse().ok())
                    .collect();
                Some((key, conflicts))
            })
            .collect();
        Self { entries }
    }

    /// The standard table without any entry touching an absent approach
    pub fn for_approaches(approaches: [bool; 4]) -> Self {
        let mut table = Self::standard();
        if approaches.iter().any(|present| !present) {
            table.prune_absent(approaches);
        }
        table
    }

    pub fn prune_absent(&mut self, approaches: [bool; 4]) {
        let present = |key: &MovementKey| approaches[key.direction.index()];
        self.entries.retain(|key, _| present(key));
        for conflicts in self.entries.values_mut() {
            conflicts.retain(|key| present(key));
        }
    }

    /// Whether two movements may not be green at the same time
    pub fn conflicts(&self, a: MovementKey, b: MovementKey) -> bool {
        let listed = |from: MovementKey, to: MovementKey| {
            self.entries
                .get(&from)
                .is_some_and(|conflicts| conflicts.contains(&to))
        };
        listed(a, b) || listed(b, a)
    }

    pub fn conflicts_of(&self, key: MovementKey) -> &[MovementKey] {
        self.entries.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any pair in `movements` conflicts
    pub fn has_conflict(&self, movements: &[MovementKey]) -> bool {
        movements.iter().enumerate().any(|(i, a)| {
            movements[i + 1..].iter().any(|b| self.conflicts(*a, *b))
        })
    }

    /// Number of keyed movements
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
