use std::collections::HashMap;

use parking_lot::RwLock;

use crate::listing::{DirListing, File};
use crate::media::join_dir;
use crate::render::{Renderer, escape_html};

pub const PANEL_CLICK: &str = r#"onclick="panelClick(event)""#;

/// Listing of one directory, shown as a column on every page below it.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub dir: String,
    pub files: Vec<File>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub name: String,
    pub path: String,
}

/// Panels and breadcrumbs from the root down to `path`. For a file page the
/// last segment gets a breadcrumb but no panel.
pub fn build_panels(listing: &DirListing, path: &str, is_file: bool) -> (Vec<Panel>, Vec<Breadcrumb>) {
    let mut segments = vec![""];
    if !path.is_empty() {
        segments.extend(path.split('/'));
    }

    let mut panels = Vec::new();
    let mut breadcrumbs = Vec::new();
    let mut cumulative = String::new();
    for segment in segments {
        cumulative = join_dir(&cumulative, segment);
        breadcrumbs.push(Breadcrumb {
            name: if segment.is_empty() { "Home" } else { segment }.to_string(),
            path: cumulative.clone(),
        });
        if is_file && cumulative == path {
            break;
        }
        panels.push(Panel {
            dir: cumulative.clone(),
            files: listing.files(&cumulative).unwrap_or_default(),
        });
    }
    (panels, breadcrumbs)
}

/// Rendered panel text per directory.
///
/// The cached text never contains request-specific markers; those are
/// patched in by [`mark_in_path`] on every call.
#[derive(Debug, Default)]
pub struct PanelCache {
    rendered: RwLock<HashMap<String, String>>,
}

impl PanelCache {
    pub fn get(
        &self,
        renderer: &dyn Renderer,
        panel: &Panel,
        index: usize,
        path: &str,
        is_last: bool,
    ) -> anyhow::Result<String> {
        let cached = self.rendered.read().get(&panel.dir).cloned();
        let base = match cached {
            Some(text) => text,
            None => {
                // Concurrent misses render the same bytes; the last insert wins.
                let text = renderer.render_panel(panel, index)?;
                self.rendered.write().insert(panel.dir.clone(), text.clone());
                text
            }
        };
        Ok(mark_in_path(&base, panel, path, is_last))
    }

    pub fn len(&self) -> usize {
        self.rendered.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.read().is_empty()
    }
}

/// Marks the entry of `panel` that lies on `path`: an ancestor folder gets
/// `in-path`, the file itself `active in-path`. The last panel of a page
/// also gets the scroll anchor id.
pub fn mark_in_path(text: &str, panel: &Panel, path: &str, is_last: bool) -> String {
    let mut out = if is_last {
        text.replacen(PANEL_CLICK, &format!(r#"{PANEL_CLICK} id="_""#), 1)
    } else {
        text.to_string()
    };

    for file in &panel.files {
        let file_path = join_dir(&panel.dir, &file.name);
        let href = escape_html(&file_path);
        if file.is_folder && (path == file_path || path.starts_with(&format!("{file_path}/"))) {
            out = out.replacen(
                &format!(r#"" href="/{href}/""#),
                &format!(r#" in-path" href="/{href}/""#),
                1,
            );
            break;
        }
        if !file.is_folder && path == file_path {
            out = out.replacen(
                &format!(r#"" href="/{href}""#),
                &format!(r#" active in-path" href="/{href}""#),
                1,
            );
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HtmlRenderer;

    fn listing() -> DirListing {
        let listing = DirListing::default();
        listing.add_dir("");
        listing.add_dir("Movies");
        listing.add_dir("Movies/2022");
        listing.add_file(
            "Movies/2022",
            File {
                name: "Tár".to_string(),
                title: "Tár".to_string(),
                ..File::default()
            },
        );
        listing.add_file(
            "Movies/2022",
            File {
                name: "Aftersun".to_string(),
                title: "Aftersun".to_string(),
                ..File::default()
            },
        );
        listing
    }

    #[test]
    fn build_panels_for_file_skips_own_panel() {
        let (panels, breadcrumbs) = build_panels(&listing(), "Movies/2022/Tár", true);
        let dirs: Vec<&str> = panels.iter().map(|p| p.dir.as_str()).collect();
        assert_eq!(dirs, vec!["", "Movies", "Movies/2022"]);
        let names: Vec<&str> = breadcrumbs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Home", "Movies", "2022", "Tár"]);
    }

    #[test]
    fn cached_base_is_shared_between_requests() -> anyhow::Result<()> {
        let renderer = HtmlRenderer::default();
        let cache = PanelCache::default();
        let (panels, _) = build_panels(&listing(), "Movies/2022/Tár", true);
        let panel = &panels[2];

        let first = cache.get(&renderer, panel, 2, "Movies/2022/Tár", true)?;
        let second = cache.get(&renderer, panel, 2, "Movies/2022/Aftersun", true)?;
        assert_eq!(cache.len(), 1);
        assert_ne!(first, second);

        let strip = |text: &str| text.replace(" active in-path", "");
        assert_eq!(strip(&first), strip(&second));
        assert!(first.contains(r#"class="file active in-path" href="/Movies/2022/Tár""#));
        assert!(second.contains(r#"class="file active in-path" href="/Movies/2022/Aftersun""#));
        assert!(first.contains(r#"onclick="panelClick(event)" id="_""#));
        Ok(())
    }

    #[test]
    fn ancestor_folder_is_marked_in_path() -> anyhow::Result<()> {
        let renderer = HtmlRenderer::default();
        let cache = PanelCache::default();
        let (panels, _) = build_panels(&listing(), "Movies/2022/Tár", true);

        let root = cache.get(&renderer, &panels[0], 0, "Movies/2022/Tár", false)?;
        assert!(root.contains(r#"class="folder in-path" href="/Movies/""#));
        assert!(!root.contains(r#"id="_""#));
        Ok(())
    }
}
