use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use sha2::{Digest as _, Sha256};
use tokio::fs;

/// Relative content path → SHA-256 hex of the file bytes.
pub type IndexState = BTreeMap<String, String>;

pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn is_indexable(path: &str) -> bool {
    path.ends_with(".yml") || path.ends_with(".yaml")
}

/// Hashes every indexable file the walker yields under `info_dir`.
pub fn compute_state(info_dir: &Path, ignore_file: &str) -> anyhow::Result<IndexState> {
    let tree = crate::walk::walk(info_dir, ignore_file)?;
    let mut state = IndexState::new();
    for rel in tree.files.into_iter().filter(|rel| is_indexable(rel)) {
        let bytes = std::fs::read(info_dir.join(&rel)).with_context(|| format!("read: {rel}"))?;
        state.insert(rel, hash_bytes(&bytes));
    }
    Ok(state)
}

/// Reads a state file of `path<TAB>hash` lines. A missing file is an empty
/// state.
pub async fn read_state(path: &Path) -> anyhow::Result<IndexState> {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(IndexState::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("read state: {}", path.display()));
        }
    };
    parse_state(&text).with_context(|| format!("parse state: {}", path.display()))
}

pub fn parse_state(text: &str) -> anyhow::Result<IndexState> {
    let mut state = IndexState::new();
    for (idx, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('\t').collect();
        let [path, hash] = parts.as_slice() else {
            anyhow::bail!("line {}: expected `path<TAB>hash`, got {line:?}", idx + 1);
        };
        state.insert((*path).to_string(), (*hash).to_string());
    }
    Ok(state)
}

pub fn format_state(state: &IndexState) -> String {
    let mut out = String::new();
    for (path, hash) in state {
        out.push_str(path);
        out.push('\t');
        out.push_str(hash);
        out.push('\n');
    }
    out
}

/// Replaces the state file in one rename, so a crash leaves either the old
/// or the new file.
pub async fn write_state(path: &Path, state: &IndexState) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp_path, format_state(state))
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDiff {
    pub to_delete: Vec<String>,
    pub to_update: Vec<String>,
}

pub fn diff(old: &IndexState, new: &IndexState) -> StateDiff {
    StateDiff {
        to_delete: old
            .keys()
            .filter(|path| !new.contains_key(*path))
            .cloned()
            .collect(),
        to_update: new
            .iter()
            .filter(|(path, hash)| old.get(*path) != Some(*hash))
            .map(|(path, _)| path.clone())
            .collect(),
    }
}

/// Which files to push regardless of their hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForceMode {
    Off,
    All,
    Paths(Vec<String>),
}

impl ForceMode {
    /// Accepts `all`, a JSON array of paths, or a comma-separated list.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::Off);
        }
        if raw == "all" {
            return Ok(Self::All);
        }
        let paths: Vec<String> = if raw.starts_with('[') {
            serde_json::from_str(raw).context("parse force list as JSON array")?
        } else {
            raw.split(',').map(|path| path.trim().to_string()).collect()
        };
        Ok(Self::Paths(
            paths.into_iter().filter(|path| !path.is_empty()).collect(),
        ))
    }
}
