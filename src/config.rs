use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;

/// Site-wide presentation settings read from `config.yml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub description: String,
    pub lang: String,
    pub repo: String,
    pub url: String,
    pub media_host: String,
    pub search_host: String,
    pub search_api_key: String,
    pub search_index: String,
    pub home_label: String,
    pub search_label: String,
    pub no_results_label: String,
    pub menu: Vec<MenuItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MenuItem {
    pub title: String,
    pub url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Finder".to_string(),
            description: String::new(),
            lang: "en".to_string(),
            repo: String::new(),
            url: String::new(),
            media_host: String::new(),
            search_host: String::new(),
            search_api_key: String::new(),
            search_index: String::new(),
            home_label: "Home".to_string(),
            search_label: "Search".to_string(),
            no_results_label: "No results".to_string(),
            menu: Vec::new(),
        }
    }
}

/// Config values reachable from rendering code by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Title,
    Description,
    Lang,
    Repo,
    Url,
    MediaHost,
    SearchHost,
    SearchApiKey,
    SearchIndex,
    HomeLabel,
    SearchLabel,
    NoResultsLabel,
}

impl SiteConfig {
    pub fn get(&self, key: ConfigKey) -> &str {
        match key {
            ConfigKey::Title => &self.title,
            ConfigKey::Description => &self.description,
            ConfigKey::Lang => &self.lang,
            ConfigKey::Repo => &self.repo,
            ConfigKey::Url => &self.url,
            ConfigKey::MediaHost => &self.media_host,
            ConfigKey::SearchHost => &self.search_host,
            ConfigKey::SearchApiKey => &self.search_api_key,
            ConfigKey::SearchIndex => &self.search_index,
            ConfigKey::HomeLabel => &self.home_label,
            ConfigKey::SearchLabel => &self.search_label,
            ConfigKey::NoResultsLabel => &self.no_results_label,
        }
    }
}

/// Loads the site config. A missing file yields the defaults.
pub fn load_site_config(path: Option<&Path>) -> anyhow::Result<SiteConfig> {
    let Some(path) = path else {
        return Ok(SiteConfig::default());
    };
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(config = %path.display(), "site config not found; using defaults");
            return Ok(SiteConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("read site config: {}", path.display()));
        }
    };
    if text.trim().is_empty() {
        return Ok(SiteConfig::default());
    }
    let config: SiteConfig = serde_yaml::from_str(&text)
        .with_context(|| format!("parse site config: {}", path.display()))?;
    if config.lang.trim().is_empty() {
        anyhow::bail!("site config: lang must not be empty");
    }
    Ok(config)
}
