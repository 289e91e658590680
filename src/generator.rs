use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use parking_lot::Mutex;
use tokio::fs;

use crate::cli::BuildArgs;
use crate::config::load_site_config;
use crate::connection::extract;
use crate::content::{Content, base_name, dir_name};
use crate::graph::{ChainPages, ConnectionGraph};
use crate::listing::{DirListing, File};
use crate::media::MediaIndex;
use crate::missing::MissingEntry;
use crate::panel::{PanelCache, build_panels};
use crate::render::{HtmlRenderer, PageData, Renderer, markdown_to_html};
use crate::store::ContentStore;

const COPIED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "mp4"];

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub info_dir: PathBuf,
    pub media_dir: PathBuf,
    pub out_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub ignore_file: String,
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub contents: usize,
    pub missing: usize,
    pub pages: usize,
}

/// Shared maps filled by the parse workers. Each map has its own lock.
#[derive(Debug, Default)]
pub struct SiteState {
    pub store: ContentStore,
    pub graph: ConnectionGraph,
    pub chain: ChainPages,
    pub listing: DirListing,
    pub media: MediaIndex,
    pub panels: PanelCache,
    award_pages: Mutex<Vec<String>>,
}

pub struct Generator {
    options: GeneratorOptions,
    renderer: Arc<dyn Renderer>,
    state: Arc<SiteState>,
}

pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    let config = load_site_config(args.config.as_deref()).context("load site config")?;
    let options = GeneratorOptions {
        info_dir: args.info,
        media_dir: args.media,
        out_dir: args.out,
        static_dir: args.static_dir,
        ignore_file: args.ignore_file,
        workers: args.workers,
    };
    let generator = Generator::new(options, Arc::new(HtmlRenderer::new(config)));
    let summary = generator.generate().await?;
    tracing::info!(
        contents = summary.contents,
        missing = summary.missing,
        pages = summary.pages,
        "build: done"
    );
    Ok(())
}

impl Generator {
    pub fn new(options: GeneratorOptions, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            options,
            renderer,
            state: Arc::new(SiteState::default()),
        }
    }

    pub fn state(&self) -> &SiteState {
        &self.state
    }

    pub async fn generate(&self) -> anyhow::Result<BuildSummary> {
        let info_dir = self.options.info_dir.clone();
        let ignore_file = self.options.ignore_file.clone();
        let tree = tokio::task::spawn_blocking(move || crate::walk::walk(&info_dir, &ignore_file))
            .await
            .context("join walk task")?
            .context("walk content dir")?;
        tracing::info!(dirs = tree.dirs.len(), files = tree.files.len(), "walk: done");

        let state = Arc::clone(&self.state);
        let media_dir = self.options.media_dir.clone();
        tokio::task::spawn_blocking(move || state.media.load(&media_dir))
            .await
            .context("join media task")?
            .context("load media")?;
        let state = &self.state;

        for dir in &tree.dirs {
            state.listing.add_dir(dir);
        }

        self.parse_all(state, tree.files).await?;

        // Everything below runs after the barrier, on this task only.
        let award_pages = state.award_pages.lock().clone();
        let pending = crate::awards::link_awards(&state.store, &award_pages);
        let missing = crate::missing::resolve(&state.graph, &state.store, &pending);
        for entry in &missing {
            state.listing.add_missing(&entry.to, state.media.image_for(&entry.to));
        }
        state.listing.finalize(&state.store);
        tracing::info!(missing = missing.len(), "resolve: done");

        let pages = self.render_all(&missing).await?;
        self.copy_static().await?;

        Ok(BuildSummary {
            contents: state.store.len(),
            missing: missing.len(),
            pages,
        })
    }

    async fn parse_all(&self, state: &Arc<SiteState>, files: Vec<String>) -> anyhow::Result<()> {
        let workers = self.options.workers.max(1);
        tracing::info!(files = files.len(), workers = workers, "parse: start");

        let done = run_bounded(workers, files, |rel| {
            let state = Arc::clone(state);
            let info_dir = self.options.info_dir.clone();
            let out_dir = self.options.out_dir.clone();
            async move {
                parse_file(&state, &info_dir, &out_dir, &rel)
                    .await
                    .with_context(|| format!("parse: {rel}"))
            }
        })
        .await?;

        tracing::info!(done = done, contents = state.store.len(), "parse: done");
        Ok(())
    }

    async fn render_all(&self, missing: &[MissingEntry]) -> anyhow::Result<usize> {
        let timestamp = chrono::Utc::now().timestamp();
        let mut pages = 0usize;

        for id in self.state.store.ids() {
            let Some(content) = self.state.store.get(&id) else {
                continue;
            };
            let html = self.render_page(&id, true, Some(&content), timestamp)?;
            self.write_page(&format!("{id}.html"), &html).await?;
            pages += 1;
        }

        for entry in missing {
            let mut content = Content {
                name: base_name(&entry.to).to_string(),
                image: self.state.media.image_for(&entry.to),
                awards: entry.awards.clone(),
                ..Content::default()
            };
            content.set_source(&format!("{}.yml", entry.to));
            let html = self.render_page(&entry.to, true, Some(&content), timestamp)?;
            self.write_page(&format!("{}.html", entry.to), &html).await?;
            pages += 1;
        }

        for dir in self.state.listing.dirs() {
            let html = self.render_page(&dir, false, None, timestamp)?;
            let path = if dir.is_empty() {
                "index.html".to_string()
            } else {
                format!("{dir}/index.html")
            };
            self.write_page(&path, &html).await?;
            pages += 1;
        }

        tracing::info!(pages = pages, panels = self.state.panels.len(), "render: done");
        Ok(pages)
    }

    fn render_page(
        &self,
        path: &str,
        is_file: bool,
        content: Option<&Content>,
        timestamp: i64,
    ) -> anyhow::Result<String> {
        let (panels, breadcrumbs) = build_panels(&self.state.listing, path, is_file);
        let count = panels.len();
        let rendered = panels
            .iter()
            .enumerate()
            .map(|(idx, panel)| {
                self.state
                    .panels
                    .get(self.renderer.as_ref(), panel, idx, path, idx + 1 == count)
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .with_context(|| format!("render panels: {path}"))?;
        let connections = if is_file {
            self.state.graph.grouped(path)
        } else {
            Vec::new()
        };

        self.renderer
            .render_page(&PageData {
                current_path: path,
                breadcrumbs: &breadcrumbs,
                panels: &rendered,
                content,
                connections: &connections,
                chain: self.state.chain.get(path),
                timestamp,
            })
            .with_context(|| format!("render page: {path}"))
    }

    async fn write_page(&self, rel: &str, html: &str) -> anyhow::Result<()> {
        let path = self.options.out_dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        fs::write(&path, html)
            .await
            .with_context(|| format!("write page: {}", path.display()))
    }

    async fn copy_static(&self) -> anyhow::Result<()> {
        let Some(static_dir) = self.options.static_dir.clone() else {
            return Ok(());
        };
        let out_dir = self.options.out_dir.clone();
        let copied = tokio::task::spawn_blocking(move || copy_tree(&static_dir, &out_dir))
            .await
            .context("join static copy task")??;
        tracing::info!(files = copied, "static: copied");
        Ok(())
    }
}

/// Runs `task` for every item with at most `workers` tasks in flight.
/// The first error is returned; dropping the set aborts the rest.
pub async fn run_bounded<T, F, Fut>(workers: usize, items: Vec<T>, task: F) -> anyhow::Result<usize>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let workers = workers.max(1);
    let mut join_set = tokio::task::JoinSet::new();
    let mut pending = items.into_iter();
    let mut next = pending.next();
    let mut done = 0usize;

    while next.is_some() || !join_set.is_empty() {
        while join_set.len() < workers {
            let Some(item) = next.take() else {
                break;
            };
            join_set.spawn(task(item));
            next = pending.next();
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        joined.context("join worker task")??;
        done += 1;
    }
    Ok(done)
}

async fn parse_file(state: &SiteState, info_dir: &Path, out_dir: &Path, rel: &str) -> anyhow::Result<()> {
    let extension = Path::new(rel)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "yml" | "yaml" => {
            let text = fs::read_to_string(info_dir.join(rel))
                .await
                .with_context(|| format!("read: {rel}"))?;
            let mut content = Content::from_yaml(rel, &text)?;
            content.add_media(|target| state.media.image_for(target));
            add_content(state, content);
        }
        "md" => {
            let text = fs::read_to_string(info_dir.join(rel))
                .await
                .with_context(|| format!("read: {rel}"))?;
            let mut content = Content {
                html: markdown_to_html(&text),
                ..Content::default()
            };
            content.set_source(rel);
            add_content(state, content);
        }
        ext if COPIED_EXTENSIONS.contains(&ext) || base_name(rel) == "_redirects" => {
            let target = out_dir.join(rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("create dir: {}", parent.display()))?;
            }
            fs::copy(info_dir.join(rel), &target)
                .await
                .with_context(|| format!("copy: {rel}"))?;
        }
        _ => anyhow::bail!("unknown file type: {rel}"),
    }
    Ok(())
}

/// Stores `content` and installs its outgoing connections. Connections are
/// added only after the record itself is visible.
fn add_content(state: &SiteState, content: Content) {
    let id = content.content_id();
    let connections = extract(&content);

    if let Some(previous) = content.previous.as_ref().filter(|p| !p.path.is_empty()) {
        state.chain.record(&id, previous.path.trim_matches('/'));
    }
    if content.is_award_page() {
        state.award_pages.lock().push(id.clone());
    }
    state.listing.add_file(
        dir_name(&id),
        File {
            name: base_name(&id).to_string(),
            image: content.image.clone(),
            ..File::default()
        },
    );
    state.store.insert(content);
    state.graph.add(&id, connections);
}

fn copy_tree(from: &Path, to: &Path) -> anyhow::Result<usize> {
    let mut copied = 0usize;
    for entry in walkdir::WalkDir::new(from) {
        let entry = entry.with_context(|| format!("walk static: {}", from.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(from)
            .with_context(|| format!("strip prefix: {}", entry.path().display()))?;
        let target = to.join(rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        std::fs::copy(entry.path(), &target)
            .with_context(|| format!("copy static: {}", entry.path().display()))?;
        copied += 1;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, text: &str) -> anyhow::Result<()> {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().expect("parent"))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    fn options(root: &Path, workers: usize) -> GeneratorOptions {
        GeneratorOptions {
            info_dir: root.join("info"),
            media_dir: root.join("media"),
            out_dir: root.join("out"),
            static_dir: None,
            ignore_file: ".ignore".to_string(),
            workers,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn worker_pool_never_exceeds_bound() -> anyhow::Result<()> {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = run_bounded(2, (0..10).collect(), |_: usize| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await?;

        assert_eq!(done, 10);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn worker_pool_stops_at_first_error() {
        let err = run_bounded(1, vec!["a", "bad", "c"], |item| async move {
            if item == "bad" {
                anyhow::bail!("task failed: {item}");
            }
            Ok(())
        })
        .await
        .expect_err("error must surface");
        assert!(err.to_string().contains("task failed: bad"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn characters_get_stills_and_actor_portraits() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(
            dir.path(),
            "info/Movies/1979/Alien.yml",
            "name: Alien\ncharacters:\n  - name: Ripley\n    actor: Sigourney Weaver\n",
        )?;
        write(dir.path(), "media/People/.thumbs.yml", "- path: Sigourney Weaver.jpg\n  thumb: People/.thumbs-0.jpg\n")?;
        write(dir.path(), "media/Movies/1979/Alien/Characters/.thumbs.yml", "- path: Ripley.png\n")?;

        let generator = Generator::new(options(dir.path(), 2), Arc::new(HtmlRenderer::default()));
        generator.generate().await?;

        let alien = generator.state().store.get("Movies/1979/Alien").expect("stored");
        let ripley = &alien.characters[0];
        assert_eq!(ripley.image.as_ref().map(|m| m.path.as_str()), Some("Ripley.png"));
        assert_eq!(
            ripley.actor_image.as_ref().map(|m| m.thumb.as_str()),
            Some("People/.thumbs-0.jpg")
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unknown_file_type_aborts_run() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "info/Movies/X.yml", "name: X\n")?;
        write(dir.path(), "info/Movies/X.exe", "")?;

        let generator = Generator::new(options(dir.path(), 2), Arc::new(HtmlRenderer::default()));
        let err = generator.generate().await.expect_err("must fail");
        assert!(format!("{err:#}").contains("unknown file type"), "{err:#}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn malformed_yaml_aborts_run() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "info/Movies/X.yml", "name: [unterminated\n")?;

        let generator = Generator::new(options(dir.path(), 1), Arc::new(HtmlRenderer::default()));
        assert!(generator.generate().await.is_err());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn markdown_and_redirects() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "info/About.md", "# About\n\nHello.\n")?;
        write(dir.path(), "info/_redirects", "/old /new\n")?;

        let generator = Generator::new(options(dir.path(), 4), Arc::new(HtmlRenderer::default()));
        let summary = generator.generate().await?;
        assert_eq!(summary.contents, 1);

        let about = std::fs::read_to_string(dir.path().join("out/About.html"))?;
        assert!(about.contains("<p>Hello.</p>"));
        assert!(dir.path().join("out/_redirects").is_file());
        assert!(dir.path().join("out/index.html").is_file());
        Ok(())
    }
}
