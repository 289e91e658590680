use std::collections::BTreeMap;
use std::ops::Deref;

use anyhow::Context as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::media::Media;

pub const PEOPLE: &str = "People/";
pub const COMPANIES: &str = "Companies/";

/// A field that may be written as a scalar or as a sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OneOrMany(pub Vec<String>);

impl OneOrMany {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Deref for OneOrMany {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for OneOrMany {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Option::<Repr>::deserialize(deserializer)? {
            None => Self::default(),
            Some(Repr::One(value)) => Self(vec![value]),
            Some(Repr::Many(values)) => Self(values),
        })
    }
}

/// Explicit link to another content path, written either as `path` or `{path, name}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Path(String),
            Full {
                path: String,
                #[serde(default)]
                name: String,
            },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Path(path) => Self {
                path,
                name: String::new(),
            },
            Repr::Full { path, name } => Self { path, name },
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct References(pub Vec<Reference>);

impl Deref for References {
    type Target = [Reference];

    fn deref(&self) -> &[Reference] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for References {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(Reference),
            Many(Vec<Reference>),
        }

        Ok(match Option::<Repr>::deserialize(deserializer)? {
            None => Self::default(),
            Some(Repr::One(reference)) => Self(vec![reference]),
            Some(Repr::Many(references)) => Self(references),
        })
    }
}

/// External link, written either as a bare URL or as `{url, title}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Link {
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
}

impl<'de> Deserialize<'de> for Link {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Url(String),
            Full {
                url: String,
                #[serde(default)]
                title: String,
            },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Url(url) => Self {
                url,
                title: String::new(),
            },
            Repr::Full { url, title } => Self { url, title },
        })
    }
}

/// Dates and lengths are often written unquoted, so accept any YAML scalar.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Option::<Repr>::deserialize(deserializer)? {
        None => String::new(),
        Some(Repr::Text(text)) => text,
        Some(Repr::Int(value)) => value.to_string(),
        Some(Repr::Float(value)) => value.to_string(),
        Some(Repr::Bool(value)) => value.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub category: String,
    pub reference: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub actor: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub voice: String,
    /// Still of the character, from `<content id>/Characters/<name>`.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub image: Option<Media>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub actor_image: Option<Media>,
    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub awards: Vec<Award>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Episode {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(
        deserialize_with = "scalar_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub released: String,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub directors: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub writers: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub editors: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub cinematography: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub teleplay: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub story: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub studio: OneOrMany,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub characters: Vec<Character>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Declared winner of an award category. Exactly one of the name fields is
/// expected to be set; `reference` short-circuits resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Winner {
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub movie: String,
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub game: String,
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub series: String,
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub person: String,
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub actor: String,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub cinematography: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub music: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub editors: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub writers: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub directors: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub screenplay: OneOrMany,
    /// Display name filled in once the winner is resolved.
    #[serde(skip_deserializing, skip_serializing_if = "String::is_empty")]
    pub fallback: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    #[serde(deserialize_with = "scalar_string")]
    pub name: String,
    pub winner: Winner,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// One parsed content file.
///
/// Fields marked `skip_deserializing` are filled by the generator or the
/// indexer and are never read from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Content {
    #[serde(skip_deserializing)]
    pub id: String,
    #[serde(skip_deserializing)]
    pub source: String,
    #[serde(skip_deserializing, skip_serializing_if = "String::is_empty")]
    pub html: String,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub image: Option<Media>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtitle: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(
        deserialize_with = "scalar_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub dob: String,
    #[serde(
        deserialize_with = "scalar_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub dod: String,
    #[serde(
        deserialize_with = "scalar_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub founded: String,
    #[serde(
        deserialize_with = "scalar_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub released: String,
    #[serde(
        deserialize_with = "scalar_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub length: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub parent: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub series: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remake_of: Option<Reference>,
    #[serde(skip_serializing_if = "References::is_empty")]
    pub based_on: References,
    #[serde(skip_serializing_if = "References::is_empty")]
    pub references: References,

    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub cover_artist: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub designer: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub founders: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub publishers: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub artists: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub colorist: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub illustrators: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub directors: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub writers: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub distributors: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub manufacturers: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub network: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub creators: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub developed_by: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub showrunners: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub authors: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub developers: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub editors: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub cinematography: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub producers: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub screenplay: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub story_by: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub dialogues_by: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub music: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub production: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub composers: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub programmers: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub designers: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub hosts: OneOrMany,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    pub guests: OneOrMany,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub characters: Vec<Character>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub episodes: Vec<Episode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,

    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub awards: Vec<Award>,
    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub cinematography_awards: Vec<Award>,
    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub music_awards: Vec<Award>,
    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub editors_awards: Vec<Award>,
    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub writers_awards: Vec<Award>,
    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub directors_awards: Vec<Award>,
    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub screenplay_awards: Vec<Award>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl References {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub value: String,
}

impl Content {
    /// Parse a YAML content file. An empty document yields an empty record.
    pub fn from_yaml(source: &str, text: &str) -> anyhow::Result<Self> {
        let mut content = if text.trim().is_empty() {
            Content::default()
        } else {
            serde_yaml::from_str::<Content>(text)
                .with_context(|| format!("parse yaml: {source}"))?
        };
        content.set_source(source);
        Ok(content)
    }

    pub fn set_source(&mut self, source: &str) {
        self.source = normalize_path(source);
        self.id = search_id(&content_id(&self.source));
    }

    /// ContentID of this record: its source path without extension.
    pub fn content_id(&self) -> String {
        content_id(&self.source)
    }

    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        let id = self.content_id();
        base_name(&id).to_string()
    }

    /// Every media ID this record can show: its own image, then per
    /// character the still and the actor portrait.
    pub fn media_targets(&self) -> Vec<String> {
        let id = self.content_id();
        let mut targets = vec![id.clone()];
        let characters = self
            .characters
            .iter()
            .chain(self.episodes.iter().flat_map(|episode| episode.characters.iter()));
        for character in characters {
            if let Some(still) = character_image_id(&id, character) {
                targets.push(still);
            }
            if let Some(portrait) = actor_image_id(character) {
                targets.push(portrait);
            }
        }
        targets
    }

    /// Fills `image` fields through `lookup`, which maps a media ID to its
    /// sidecar entry.
    pub fn add_media(&mut self, mut lookup: impl FnMut(&str) -> Option<Media>) {
        let id = self.content_id();
        self.image = lookup(&id);
        let characters = self
            .characters
            .iter_mut()
            .chain(self.episodes.iter_mut().flat_map(|episode| episode.characters.iter_mut()));
        for character in characters {
            character.image = character_image_id(&id, character).and_then(|still| lookup(&still));
            character.actor_image = actor_image_id(character).and_then(|portrait| lookup(&portrait));
        }
    }

    pub fn is_award_page(&self) -> bool {
        !self.categories.is_empty()
    }

    /// Extra list-view columns, in display order. Empty values are omitted.
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = Vec::new();
        let mut push = |name: &'static str, value: String| {
            if !value.is_empty() {
                columns.push(Column { name, value });
            }
        };
        push("Born", self.dob.clone());
        push("Died", self.dod.clone());
        push("Founded", self.founded.clone());
        push("Released", self.released.clone());
        push("Publishers", self.publishers.join(", "));
        push("Directors", self.directors.join(", "));
        push("Authors", self.authors.join(", "));
        push("Length", self.length.clone());
        columns
    }
}

fn character_image_id(id: &str, character: &Character) -> Option<String> {
    (!character.name.is_empty()).then(|| format!("{id}/Characters/{}", character.name))
}

fn actor_image_id(character: &Character) -> Option<String> {
    (!character.actor.is_empty()).then(|| format!("{PEOPLE}{}", character.actor))
}

pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Strips the extension from the last path segment. A segment that is only an
/// extension (e.g. `.ignore`) is kept whole.
pub fn content_id(path: &str) -> String {
    let path = normalize_path(path);
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path.as_str()),
    };
    let stem = match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    };
    match dir {
        Some(dir) => format!("{dir}/{stem}"),
        None => stem.to_string(),
    }
}

/// Search document key: every character outside `[A-Za-z0-9_-]` becomes `_`.
pub fn search_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn dir_name(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    }
}

/// Top-level directory of a content path (`Movies/2022/Tár` → `Movies`).
pub fn path_type(path: &str) -> &str {
    path.split('/').next().unwrap_or("")
}

pub fn content_kind(path: &str) -> String {
    match path_type(path) {
        "People" => "person".to_string(),
        "Books" => "book".to_string(),
        "Games" => "game".to_string(),
        "Movies" => "movie".to_string(),
        "Companies" => "company".to_string(),
        "Podcasts" => "podcast".to_string(),
        other => other.to_lowercase(),
    }
}
