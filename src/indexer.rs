use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::fs;

use crate::cli::IndexArgs;
use crate::content::{Content, content_id, dir_name, search_id};
use crate::index_state::{ForceMode, compute_state, diff, read_state, write_state};
use crate::media::{Media, find_image, join_dir, read_sidecar};
use crate::search::{MeiliSearch, SearchEngine, wait_for_task};

pub const BATCH_SIZE: usize = 100;
pub const ID_FIELD: &str = "id";

#[derive(Debug, Clone)]
pub struct IndexerOptions {
    pub info_dir: PathBuf,
    pub media_dir: PathBuf,
    pub state_file: PathBuf,
    pub ignore_file: String,
    pub force: ForceMode,
    pub batch_size: usize,
    pub task_timeout: Duration,
    pub poll_interval: Duration,
}

impl IndexerOptions {
    pub fn new(info_dir: PathBuf, media_dir: PathBuf, state_file: PathBuf) -> Self {
        Self {
            info_dir,
            media_dir,
            state_file,
            ignore_file: ".ignore".to_string(),
            force: ForceMode::Off,
            batch_size: BATCH_SIZE,
            task_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub deleted: Vec<String>,
    pub updated: Vec<String>,
    /// Unchanged files pushed because they share a sprite sheet with an
    /// updated one.
    pub fanned_out: Vec<String>,
}

pub struct Indexer {
    options: IndexerOptions,
    engine: Arc<dyn SearchEngine>,
}

pub async fn run(args: IndexArgs) -> anyhow::Result<()> {
    let engine = MeiliSearch::new(&args.search_host, &args.search_index, args.search_api_key)
        .context("create search client")?;
    let mut options = IndexerOptions::new(args.info, args.media, args.state);
    options.ignore_file = args.ignore_file;
    options.force = ForceMode::parse(&args.force).context("parse --force")?;

    let summary = Indexer::new(options, Arc::new(engine)).index().await?;
    tracing::info!(
        deleted = summary.deleted.len(),
        updated = summary.updated.len(),
        fanned_out = summary.fanned_out.len(),
        "index: done"
    );
    Ok(())
}

impl Indexer {
    pub fn new(options: IndexerOptions, engine: Arc<dyn SearchEngine>) -> Self {
        Self { options, engine }
    }

    /// One incremental run. The state file is rewritten only after every
    /// search task succeeded.
    pub async fn index(&self) -> anyhow::Result<IndexSummary> {
        let info_dir = self.options.info_dir.clone();
        let ignore_file = self.options.ignore_file.clone();
        let new_state = tokio::task::spawn_blocking(move || compute_state(&info_dir, &ignore_file))
            .await
            .context("join hash task")?
            .context("hash content files")?;
        let old_state = read_state(&self.options.state_file).await?;

        let (to_delete, to_update) = match &self.options.force {
            ForceMode::All => (Vec::new(), new_state.keys().cloned().collect()),
            ForceMode::Paths(paths) => (Vec::new(), paths.clone()),
            ForceMode::Off => {
                let diff = diff(&old_state, &new_state);
                (diff.to_delete, diff.to_update)
            }
        };
        tracing::info!(
            files = new_state.len(),
            delete = to_delete.len(),
            update = to_update.len(),
            "index: diff"
        );

        if !to_delete.is_empty() {
            self.delete(&to_delete).await.context("delete documents")?;
        }

        let mut summary = IndexSummary {
            deleted: to_delete,
            ..IndexSummary::default()
        };
        let documents = self
            .collect_documents(&to_update, &mut summary)
            .await
            .context("collect documents")?;
        self.push(&documents).await.context("push documents")?;

        write_state(&self.options.state_file, &new_state)
            .await
            .context("write state")?;
        Ok(summary)
    }

    async fn delete(&self, paths: &[String]) -> anyhow::Result<()> {
        let ids: Vec<String> = paths.iter().map(|path| search_id(&content_id(path))).collect();
        for path in paths {
            tracing::info!(path = %path, "delete");
        }
        let task = self.engine.delete_by_ids(&ids).await?;
        wait_for_task(
            self.engine.as_ref(),
            task,
            self.options.task_timeout,
            self.options.poll_interval,
        )
        .await
    }

    async fn push(&self, documents: &[serde_json::Value]) -> anyhow::Result<()> {
        if documents.is_empty() {
            tracing::info!("index: nothing to push");
            return Ok(());
        }
        let tasks = self
            .engine
            .upsert_batch(documents, self.options.batch_size, ID_FIELD)
            .await?;
        for task in tasks {
            wait_for_task(
                self.engine.as_ref(),
                task,
                self.options.task_timeout,
                self.options.poll_interval,
            )
            .await?;
        }
        Ok(())
    }

    async fn collect_documents(
        &self,
        paths: &[String],
        summary: &mut IndexSummary,
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        let mut siblings = BTreeSet::new();
        let mut documents = Vec::new();
        for path in paths {
            if let Some(document) = self.load_document(path, Some(&mut siblings)).await? {
                documents.push(document);
                summary.updated.push(path.clone());
            }
        }

        // Fan-out goes one level only: siblings do not pull in their own siblings.
        for path in siblings.into_iter().filter(|path| !paths.contains(path)) {
            if let Some(document) = self.load_document(&path, None).await? {
                tracing::info!(path = %path, "update: shares sprite sheet");
                documents.push(document);
                summary.fanned_out.push(path);
            }
        }
        Ok(documents)
    }

    /// Builds the search document for `path`. A file that vanished since
    /// the walk, or an empty one, yields `Ok(None)`.
    async fn load_document(
        &self,
        path: &str,
        mut siblings: Option<&mut BTreeSet<String>>,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        let text = match fs::read_to_string(self.options.info_dir.join(path)).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path, "file not found; skipping");
                return Ok(None);
            }
            Err(err) => return Err(err).with_context(|| format!("read: {path}")),
        };
        if text.trim().is_empty() {
            return Ok(None);
        }

        let mut content = Content::from_yaml(path, &text)?;
        let mut sidecars: HashMap<String, Vec<Media>> = HashMap::new();
        let mut images: HashMap<String, Media> = HashMap::new();

        // The cover plus every character still and actor portrait.
        for target in content.media_targets() {
            let dir = dir_name(&target);
            if !sidecars.contains_key(dir) {
                let media = match read_sidecar(&self.options.media_dir, dir).await {
                    Ok(media) => media.unwrap_or_default(),
                    Err(err) => {
                        tracing::warn!(dir = %dir, error = %format!("{err:#}"), "unreadable media sidecar");
                        Vec::new()
                    }
                };
                sidecars.insert(dir.to_string(), media);
            }
            let Some(media) = sidecars.get(dir) else {
                continue;
            };
            let Some(image) = find_image(media, dir, &target) else {
                continue;
            };

            if let Some(siblings) = siblings.as_deref_mut() {
                for other in media.iter().filter(|other| image.shares_sheet_with(other)) {
                    let sibling = format!("{}.yml", join_dir(dir, &content_id(&other.path)));
                    if sibling != path
                        && !siblings.contains(&sibling)
                        && self.is_content_file(&sibling).await
                    {
                        siblings.insert(sibling);
                    }
                }
            }
            images.insert(target, image.clone());
        }
        content.add_media(|target| images.get(target).cloned());

        let document = serde_json::to_value(&content).with_context(|| format!("serialize: {path}"))?;
        Ok(Some(document))
    }

    async fn is_content_file(&self, rel: &str) -> bool {
        fs::metadata(self.options.info_dir.join(rel))
            .await
            .is_ok_and(|meta| meta.is_file())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::search::{TaskHandle, TaskStatus};

    #[derive(Default)]
    struct Recorder {
        upserted: Mutex<Vec<String>>,
        documents: Mutex<Vec<serde_json::Value>>,
        deleted: Mutex<Vec<String>>,
        fail_tasks: bool,
    }

    #[async_trait]
    impl SearchEngine for Recorder {
        async fn upsert_batch(
            &self,
            documents: &[serde_json::Value],
            batch_size: usize,
            _id_field: &str,
        ) -> anyhow::Result<Vec<TaskHandle>> {
            let mut upserted = self.upserted.lock();
            for document in documents {
                upserted.push(document["source"].as_str().unwrap_or_default().to_string());
            }
            self.documents.lock().extend(documents.iter().cloned());
            Ok((0..documents.len().div_ceil(batch_size) as u64).map(TaskHandle).collect())
        }

        async fn delete_by_ids(&self, ids: &[String]) -> anyhow::Result<TaskHandle> {
            self.deleted.lock().extend(ids.iter().cloned());
            Ok(TaskHandle(99))
        }

        async fn task_status(&self, _task: TaskHandle) -> anyhow::Result<TaskStatus> {
            if self.fail_tasks {
                Ok(TaskStatus::Failed("rejected".to_string()))
            } else {
                Ok(TaskStatus::Succeeded)
            }
        }
    }

    fn write(root: &std::path::Path, rel: &str, text: &str) -> anyhow::Result<()> {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().expect("parent"))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    fn options(root: &std::path::Path) -> IndexerOptions {
        let mut options = IndexerOptions::new(
            root.join("info"),
            root.join("media"),
            root.join("state/index.tsv"),
        );
        options.poll_interval = Duration::from_millis(1);
        options
    }

    const SPRITES: &str = r#"
- path: A.jpg
  thumb: .thumbs-0.jpg
  thumb_x: 0
  thumb_width: 10
  thumb_height: 10
  thumb_total_width: 20
  thumb_total_height: 10
- path: B.jpg
  thumb: .thumbs-0.jpg
  thumb_x: 10
  thumb_width: 10
  thumb_height: 10
  thumb_total_width: 20
  thumb_total_height: 10
"#;

    #[tokio::test]
    async fn changed_file_fans_out_to_sprite_sibling() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "info/Movies/A.yml", "name: A\n")?;
        write(dir.path(), "info/Movies/B.yml", "name: B\n")?;
        write(dir.path(), "media/Movies/.thumbs.yml", SPRITES)?;

        let engine = Arc::new(Recorder::default());
        let indexer = Indexer::new(options(dir.path()), engine.clone());
        indexer.index().await?;
        assert_eq!(*engine.upserted.lock(), vec!["Movies/A.yml", "Movies/B.yml"]);

        write(dir.path(), "info/Movies/A.yml", "name: A2\n")?;
        engine.upserted.lock().clear();
        let summary = indexer.index().await?;
        assert_eq!(summary.updated, vec!["Movies/A.yml".to_string()]);
        assert_eq!(summary.fanned_out, vec!["Movies/B.yml".to_string()]);
        assert_eq!(*engine.upserted.lock(), vec!["Movies/A.yml", "Movies/B.yml"]);
        Ok(())
    }

    #[tokio::test]
    async fn actor_portrait_fans_out_through_people_sheet() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(
            dir.path(),
            "info/Movies/A.yml",
            "name: A\ncharacters:\n  - name: Ripley\n    actor: Jane\n",
        )?;
        write(dir.path(), "info/People/Jane.yml", "name: Jane\n")?;
        write(dir.path(), "info/People/John.yml", "name: John\n")?;
        write(dir.path(), "media/People/.thumbs.yml", &SPRITES.replace("A.jpg", "Jane.jpg").replace("B.jpg", "John.jpg"))?;

        let engine = Arc::new(Recorder::default());
        let indexer = Indexer::new(options(dir.path()), engine.clone());
        indexer.index().await?;

        write(
            dir.path(),
            "info/Movies/A.yml",
            "name: A2\ncharacters:\n  - name: Ripley\n    actor: Jane\n",
        )?;
        engine.upserted.lock().clear();
        engine.documents.lock().clear();
        let summary = indexer.index().await?;
        assert_eq!(summary.updated, vec!["Movies/A.yml".to_string()]);
        assert_eq!(summary.fanned_out, vec!["People/John.yml".to_string()]);

        let documents = engine.documents.lock();
        let movie = documents
            .iter()
            .find(|doc| doc["source"] == "Movies/A.yml")
            .expect("movie document");
        assert_eq!(movie["characters"][0]["actor_image"]["path"], "Jane.jpg");
        assert!(movie.get("image").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn deleted_file_is_removed_by_search_id() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "info/People/Jane Doe.yml", "name: Jane\n")?;
        write(dir.path(), "info/People/John.yml", "name: John\n")?;

        let engine = Arc::new(Recorder::default());
        let indexer = Indexer::new(options(dir.path()), engine.clone());
        indexer.index().await?;

        std::fs::remove_file(dir.path().join("info/People/Jane Doe.yml"))?;
        let summary = indexer.index().await?;
        assert_eq!(summary.deleted, vec!["People/Jane Doe.yml".to_string()]);
        assert!(summary.updated.is_empty());
        assert_eq!(*engine.deleted.lock(), vec!["People_Jane_Doe".to_string()]);

        let state = std::fs::read_to_string(dir.path().join("state/index.tsv"))?;
        assert!(state.starts_with("People/John.yml\t"));
        assert_eq!(state.lines().count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_task_keeps_old_state() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "info/Movies/A.yml", "name: A\n")?;

        let engine = Arc::new(Recorder {
            fail_tasks: true,
            ..Recorder::default()
        });
        let indexer = Indexer::new(options(dir.path()), engine);
        let err = indexer.index().await.expect_err("task failure is fatal");
        assert!(format!("{err:#}").contains("rejected"));
        assert!(!dir.path().join("state/index.tsv").exists());
        Ok(())
    }

    #[tokio::test]
    async fn forced_paths_skip_missing_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "info/Movies/A.yml", "name: A\n")?;
        write(dir.path(), "info/Movies/Empty.yml", "")?;

        let engine = Arc::new(Recorder::default());
        let mut options = options(dir.path());
        options.force = ForceMode::parse("Movies/A.yml,Movies/Gone.yml,Movies/Empty.yml")?;
        let summary = Indexer::new(options, engine.clone()).index().await?;
        assert_eq!(summary.updated, vec!["Movies/A.yml".to_string()]);
        assert_eq!(*engine.upserted.lock(), vec!["Movies/A.yml"]);
        Ok(())
    }
}
