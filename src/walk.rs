use std::path::Path;

use anyhow::Context as _;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use walkdir::WalkDir;

/// Eligible directories and files under a content root, as sorted
/// `/`-separated relative paths. The root itself is `""` in `dirs`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tree {
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

fn load_ignore(root: &Path, ignore_file: &str) -> anyhow::Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    let path = root.join(ignore_file);
    if !ignore_file.is_empty() && path.is_file() {
        if let Some(err) = builder.add(&path) {
            return Err(err).with_context(|| format!("read ignore file: {}", path.display()));
        }
        tracing::debug!(ignore = %path.display(), "loaded ignore file");
    }
    builder
        .build()
        .with_context(|| format!("build ignore matcher: {}", path.display()))
}

/// Walks `root`, skipping dot-entries and anything matched by the gitignore
/// patterns in `root/<ignore_file>`.
pub fn walk(root: &Path, ignore_file: &str) -> anyhow::Result<Tree> {
    if !root.is_dir() {
        anyhow::bail!("content dir does not exist: {}", root.display());
    }
    let ignore = load_ignore(root, ignore_file)?;

    let mut tree = Tree::default();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            return false;
        }
        !ignore
            .matched(entry.path(), entry.file_type().is_dir())
            .is_ignore()
    });

    for entry in walker {
        let entry = entry.with_context(|| format!("walk: {}", root.display()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("strip prefix: {}", entry.path().display()))?
            .to_string_lossy()
            .replace('\\', "/");
        if entry.file_type().is_dir() {
            tree.dirs.push(relative);
        } else if entry.file_type().is_file() {
            tree.files.push(relative);
        }
    }

    tree.dirs.sort();
    tree.files.sort();
    Ok(tree)
}
