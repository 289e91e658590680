use std::cmp::Ordering;
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::content::{Column, base_name, dir_name};
use crate::media::Media;
use crate::store::ContentStore;

/// One entry of a directory listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct File {
    pub name: String,
    pub title: String,
    pub is_folder: bool,
    /// No source file exists; the page is a generated stub.
    pub is_missing: bool,
    pub image: Option<Media>,
    pub columns: Vec<Column>,
}

impl File {
    pub fn folder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            title: name.to_string(),
            is_folder: true,
            ..Self::default()
        }
    }
}

/// Directory path → entries. `""` is the root.
#[derive(Debug, Default)]
pub struct DirListing {
    dirs: Mutex<HashMap<String, Vec<File>>>,
}

impl DirListing {
    /// Registers `dir` and lists it as a folder in its parent.
    pub fn add_dir(&self, dir: &str) {
        let mut dirs = self.dirs.lock();
        dirs.entry(dir.to_string()).or_default();
        if dir.is_empty() {
            return;
        }
        let parent = dirs.entry(dir_name(dir).to_string()).or_default();
        let name = base_name(dir);
        if !parent.iter().any(|file| file.is_folder && file.name == name) {
            parent.push(File::folder(name));
        }
    }

    pub fn add_file(&self, dir: &str, file: File) {
        self.dirs.lock().entry(dir.to_string()).or_default().push(file);
    }

    pub fn contains(&self, dir: &str) -> bool {
        self.dirs.lock().contains_key(dir)
    }

    pub fn files(&self, dir: &str) -> Option<Vec<File>> {
        self.dirs.lock().get(dir).cloned()
    }

    pub fn dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = self.dirs.lock().keys().cloned().collect();
        dirs.sort();
        dirs
    }

    /// Lists a stub page for `id` and makes every ancestor folder reachable,
    /// flagging folders that exist only because of stubs.
    pub fn add_missing(&self, id: &str, image: Option<Media>) {
        let mut dirs = self.dirs.lock();
        let name = base_name(id);
        let mut dir = dir_name(id).to_string();
        let entries = dirs.entry(dir.clone()).or_default();
        if entries.iter().any(|file| !file.is_folder && file.name == name) {
            return;
        }
        entries.push(File {
            name: name.to_string(),
            title: name.to_string(),
            is_missing: true,
            image,
            ..File::default()
        });

        while !dir.is_empty() {
            let parent = dir_name(&dir).to_string();
            let folder = base_name(&dir).to_string();
            let siblings = dirs.entry(parent.clone()).or_default();
            if siblings.iter().any(|file| file.is_folder && file.name == folder) {
                break;
            }
            siblings.push(File {
                is_missing: true,
                ..File::folder(&folder)
            });
            dir = parent;
        }
    }

    /// Sorts every listing and fills titles and columns from stored content.
    pub fn finalize(&self, store: &ContentStore) {
        let mut dirs = self.dirs.lock();
        for (dir, files) in dirs.iter_mut() {
            sort_files(files);
            for file in files.iter_mut().filter(|file| !file.is_folder) {
                let id = crate::media::join_dir(dir, &file.name);
                match store.get(&id) {
                    Some(content) if !content.name.is_empty() => {
                        file.title = content.name.clone();
                        file.columns = content.columns();
                    }
                    Some(content) => {
                        file.title = file.name.clone();
                        file.columns = content.columns();
                    }
                    None => file.title = file.name.clone(),
                }
            }
        }
    }
}

fn is_year(name: &str) -> bool {
    name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit())
}

/// Non-year entries first (folders on top, then by name), then year-named
/// entries newest first.
pub fn sort_files(files: &mut [File]) {
    files.sort_by(|a, b| match (is_year(&a.name), is_year(&b.name)) {
        (true, true) => b.name.cmp(&a.name),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b
            .is_folder
            .cmp(&a.is_folder)
            .then_with(|| a.name.cmp(&b.name)),
    });
}

/// Columns worth showing for a listing: those present on more than half of
/// the real files, plus `Died` whenever any file has it.
pub fn choose_columns(files: &[File]) -> Vec<&'static str> {
    let mut total = 0usize;
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    for file in files.iter().filter(|file| !file.is_missing) {
        total += 1;
        for column in &file.columns {
            match counts.iter_mut().find(|(name, _)| *name == column.name) {
                Some((_, count)) => *count += 1,
                None => counts.push((column.name, 1)),
            }
        }
    }
    counts
        .into_iter()
        .filter(|(name, count)| *count > total / 2 || *name == "Died")
        .map(|(name, _)| name)
        .collect()
}
