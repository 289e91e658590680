use std::collections::{BTreeMap, HashMap};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::connection::{Connection, Meta};

/// Inbound index: target → source → connections the source declared.
///
/// A source's connections are installed under one write lock, so readers
/// never observe a partially added source.
#[derive(Debug, Default)]
pub struct ConnectionGraph {
    targets: RwLock<HashMap<String, BTreeMap<String, Vec<Connection>>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionGroup {
    pub label: String,
    pub info: Vec<String>,
}

/// Everything one source says about a target, merged for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionLine {
    pub from: String,
    pub groups: Vec<ConnectionGroup>,
    /// Distinct episode scopes the connections came from.
    pub parents: Vec<String>,
}

impl ConnectionGraph {
    pub fn add(&self, source: &str, connections: Vec<Connection>) {
        if connections.is_empty() {
            return;
        }
        let mut targets = self.targets.write();
        for connection in connections {
            targets
                .entry(connection.to.clone())
                .or_default()
                .entry(source.to_string())
                .or_default()
                .push(connection);
        }
    }

    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.targets.read().keys().cloned().collect();
        targets.sort();
        targets
    }

    /// Snapshot of the sources pointing at `target`, ordered by source ID.
    pub fn sources(&self, target: &str) -> BTreeMap<String, Vec<Connection>> {
        self.targets.read().get(target).cloned().unwrap_or_default()
    }

    pub fn grouped(&self, target: &str) -> Vec<ConnectionLine> {
        self.sources(target)
            .iter()
            .map(|(from, connections)| ConnectionLine::from_connections(from, connections))
            .collect()
    }
}

impl ConnectionLine {
    pub fn from_connections(from: &str, connections: &[Connection]) -> Self {
        let mut line = Self::empty(from);
        for connection in connections {
            let label = match connection.meta {
                Meta::None => "",
                _ => connection.label.as_str(),
            };
            line.push(label, connection.info.as_deref());
            line.push_parent(connection.parent.as_deref());
        }
        line.fix_label_case();
        line
    }

    /// Groups already grouped output again. The result equals `self`.
    pub fn regroup(&self) -> Self {
        let mut line = Self::empty(&self.from);
        for group in &self.groups {
            if group.info.is_empty() {
                line.push(&group.label, None);
            }
            for info in &group.info {
                line.push(&group.label, Some(info));
            }
        }
        for parent in &self.parents {
            line.push_parent(Some(parent));
        }
        line.fix_label_case();
        line
    }

    fn empty(from: &str) -> Self {
        Self {
            from: from.to_string(),
            groups: Vec::new(),
            parents: Vec::new(),
        }
    }

    fn push(&mut self, label: &str, info: Option<&str>) {
        let idx = match self.groups.iter().position(|group| group.label == label) {
            Some(idx) => idx,
            None => {
                self.groups.push(ConnectionGroup {
                    label: label.to_string(),
                    info: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        if let Some(info) = info.filter(|info| !info.is_empty()) {
            let group = &mut self.groups[idx];
            if !group.info.iter().any(|existing| existing == info) {
                group.info.push(info.to_string());
            }
        }
    }

    fn push_parent(&mut self, parent: Option<&str>) {
        if let Some(parent) = parent.filter(|parent| !parent.is_empty())
            && !self.parents.iter().any(|existing| existing == parent)
        {
            self.parents.push(parent.to_string());
        }
    }

    // A single group keeps its label; with several, the labels after the
    // first read as a continuation ("Director, writer").
    fn fix_label_case(&mut self) {
        for group in self.groups.iter_mut().skip(1) {
            group.label = lowercase_first(&group.label);
        }
    }
}

fn lowercase_first(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Label shown for a group of `count` items: a trailing plural `s` is
/// dropped when there is exactly one.
pub fn count_label(label: &str, count: usize) -> &str {
    if count == 1 {
        label.strip_suffix('s').unwrap_or(label)
    } else {
        label
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainLinks {
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// Previous/next navigation recorded from `previous` fields.
#[derive(Debug, Default)]
pub struct ChainPages {
    links: Mutex<HashMap<String, ChainLinks>>,
}

impl ChainPages {
    pub fn record(&self, from: &str, previous: &str) {
        let mut links = self.links.lock();
        links.entry(from.to_string()).or_default().prev = Some(previous.to_string());
        links.entry(previous.to_string()).or_default().next = Some(from.to_string());
    }

    pub fn get(&self, id: &str) -> ChainLinks {
        self.links.lock().get(id).cloned().unwrap_or_default()
    }
}
