use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::content::content_id;

pub const SIDECAR_NAME: &str = ".thumbs.yml";

/// One entry of a directory's `.thumbs.yml` sidecar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Media {
    pub path: String,
    pub width: u32,
    pub height: u32,
    /// Sprite sheet this thumbnail is cut from.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub thumb: String,
    pub thumb_x: u32,
    pub thumb_y: u32,
    pub thumb_width: u32,
    pub thumb_height: u32,
    pub thumb_total_width: u32,
    pub thumb_total_height: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub blurhash: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub blurhash_image_base64: String,
}

impl Media {
    /// Whether `other` is a different image cut from the same sprite sheet.
    pub fn shares_sheet_with(&self, other: &Media) -> bool {
        !self.thumb.is_empty() && self.thumb == other.thumb && self.path != other.path
    }

    /// CSS placing this thumbnail's region of the sprite sheet, scaled to the
    /// element size. `base` prefixes the sheet URL.
    pub fn thumb_style(&self, base: &str) -> String {
        if self.thumb.is_empty() || self.thumb_width == 0 || self.thumb_height == 0 {
            return String::new();
        }
        let size_x = f64::from(self.thumb_total_width) / f64::from(self.thumb_width) * 100.0;
        let size_y = f64::from(self.thumb_total_height) / f64::from(self.thumb_height) * 100.0;
        let pos_x = position_pct(self.thumb_x, self.thumb_width, self.thumb_total_width);
        let pos_y = position_pct(self.thumb_y, self.thumb_height, self.thumb_total_height);
        format!(
            "background-image: url('{base}/{}'); background-size: {size_x:.2}% {size_y:.2}%; background-position: {pos_x:.2}% {pos_y:.2}%",
            self.thumb
        )
    }
}

fn position_pct(offset: u32, size: u32, total: u32) -> f64 {
    if total <= size {
        return 0.0;
    }
    f64::from(offset) / f64::from(total - size) * 100.0
}

fn parse_media(text: &str, source: &Path) -> anyhow::Result<Vec<Media>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(text).with_context(|| format!("parse media sidecar: {}", source.display()))
}

pub fn parse_media_file(path: &Path) -> anyhow::Result<Vec<Media>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read media sidecar: {}", path.display()))?;
    parse_media(&text, path)
}

/// Reads the sidecar of `dir` under `media_root`. Returns `Ok(None)` when the
/// directory has no sidecar.
pub async fn read_sidecar(media_root: &Path, dir: &str) -> anyhow::Result<Option<Vec<Media>>> {
    let path = media_root.join(dir).join(SIDECAR_NAME);
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("read media sidecar: {}", path.display()));
        }
    };
    parse_media(&text, &path).map(Some)
}

/// Finds the media entry for content `id` among the entries of its directory.
pub fn find_image<'a>(media: &'a [Media], dir: &str, id: &str) -> Option<&'a Media> {
    media.iter().find(|m| join_dir(dir, &content_id(&m.path)) == id)
}

pub fn join_dir(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Directory → sidecar entries for every directory under the media root.
#[derive(Debug, Default)]
pub struct MediaIndex {
    dirs: RwLock<HashMap<String, Arc<Vec<Media>>>>,
}

impl MediaIndex {
    /// Reads every sidecar under `media_root`. Returns the number of
    /// directories with thumbnails.
    pub fn load(&self, media_root: &Path) -> anyhow::Result<usize> {
        if !media_root.is_dir() {
            tracing::warn!(media = %media_root.display(), "media dir not found; no thumbnails");
            return Ok(0);
        }

        for entry in walkdir::WalkDir::new(media_root) {
            let entry = entry.with_context(|| format!("walk media: {}", media_root.display()))?;
            if !entry.file_type().is_file() || entry.file_name() != SIDECAR_NAME {
                continue;
            }
            let dir = entry
                .path()
                .parent()
                .and_then(|parent| parent.strip_prefix(media_root).ok())
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            let media = parse_media_file(entry.path())?;
            self.insert(&dir, media);
        }

        let dirs = self.dirs.read().len();
        tracing::info!(dirs = dirs, "media: loaded sidecars");
        Ok(dirs)
    }

    pub fn insert(&self, dir: &str, media: Vec<Media>) {
        self.dirs.write().insert(dir.to_string(), Arc::new(media));
    }

    pub fn image_for(&self, id: &str) -> Option<Media> {
        let dir = crate::content::dir_name(id);
        let media = self.dirs.read().get(dir).cloned()?;
        find_image(&media, dir, id).cloned()
    }
}
