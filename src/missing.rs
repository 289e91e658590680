use std::collections::{BTreeMap, BTreeSet};

use crate::awards::PendingAwards;
use crate::content::Award;
use crate::graph::ConnectionGraph;
use crate::store::ContentStore;

/// Referenced targets with fewer mentions than this get no stub page.
pub const MIN_REFERENCES: usize = 2;

/// A target that is referenced often enough to deserve a stub page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingEntry {
    pub to: String,
    /// Source ID → labels it used for the target.
    pub from: BTreeMap<String, Vec<String>>,
    pub awards: Vec<Award>,
}

impl MissingEntry {
    pub fn count(&self) -> usize {
        self.from.len() + self.awards.len()
    }
}

/// Absent targets with at least [`MIN_REFERENCES`] inbound sources and pending
/// awards combined, most referenced first, then by ID.
pub fn resolve(graph: &ConnectionGraph, store: &ContentStore, pending: &PendingAwards) -> Vec<MissingEntry> {
    let candidates: BTreeSet<String> = graph
        .targets()
        .into_iter()
        .chain(pending.keys().cloned())
        .filter(|target| !store.contains(target))
        .collect();

    let mut entries: Vec<MissingEntry> = candidates
        .into_iter()
        .map(|to| {
            let from = graph
                .sources(&to)
                .into_iter()
                .map(|(source, connections)| {
                    let mut labels: Vec<String> = Vec::new();
                    for connection in connections {
                        if !labels.contains(&connection.label) {
                            labels.push(connection.label);
                        }
                    }
                    (source, labels)
                })
                .collect();
            let awards = pending.get(&to).cloned().unwrap_or_default();
            MissingEntry { to, from, awards }
        })
        .filter(|entry| entry.count() >= MIN_REFERENCES)
        .collect();

    entries.sort_by(|a, b| b.count().cmp(&a.count()).then_with(|| a.to.cmp(&b.to)));
    entries
}
