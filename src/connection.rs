use serde::Serialize;

use crate::content::{COMPANIES, Character, Content, OneOrMany, PEOPLE, dir_name};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Meta {
    /// Ordinary role connection.
    #[default]
    Unset,
    /// Author-declared reference; rendered without a label.
    None,
    Previous,
    Series,
}

/// One directed edge from the owning content to `to`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Connection {
    pub to: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Connection {
    fn new(to: String, label: &str) -> Self {
        Self {
            to,
            label: label.to_string(),
            ..Self::default()
        }
    }
}

struct RoleField {
    field: fn(&Content) -> &OneOrMany,
    prefix: &'static str,
    label: &'static str,
}

const fn role(field: fn(&Content) -> &OneOrMany, prefix: &'static str, label: &'static str) -> RoleField {
    RoleField {
        field,
        prefix,
        label,
    }
}

const LEADING_ROLES: &[RoleField] = &[
    role(|c| &c.cover_artist, PEOPLE, "Cover artist"),
    role(|c| &c.designer, PEOPLE, "Designer"),
];

const ROLES: &[RoleField] = &[
    role(|c| &c.founders, PEOPLE, "Founder"),
    role(|c| &c.publishers, COMPANIES, "Publisher"),
    role(|c| &c.artists, PEOPLE, "Artist"),
    role(|c| &c.colorist, PEOPLE, "Colorist"),
    role(|c| &c.illustrators, PEOPLE, "Illustrator"),
    role(|c| &c.directors, PEOPLE, "Director"),
    role(|c| &c.writers, PEOPLE, "Writer"),
    role(|c| &c.distributors, COMPANIES, "Distributor"),
    role(|c| &c.manufacturers, COMPANIES, "Manufacturer"),
    role(|c| &c.network, COMPANIES, "Network"),
    role(|c| &c.creators, PEOPLE, "Creator"),
    role(|c| &c.developed_by, PEOPLE, "Developer"),
    role(|c| &c.showrunners, PEOPLE, "Showrunner"),
    role(|c| &c.authors, PEOPLE, "Author"),
    role(|c| &c.developers, COMPANIES, "Developer"),
    role(|c| &c.editors, PEOPLE, "Editor"),
    role(|c| &c.cinematography, PEOPLE, "Cinematography"),
    role(|c| &c.producers, PEOPLE, "Producer"),
    role(|c| &c.screenplay, PEOPLE, "Screenplay"),
    role(|c| &c.story_by, PEOPLE, "Story"),
    role(|c| &c.dialogues_by, PEOPLE, "Dialogues"),
    role(|c| &c.music, PEOPLE, "Music"),
    role(|c| &c.production, COMPANIES, "Production"),
    role(|c| &c.composers, PEOPLE, "Composer"),
    role(|c| &c.programmers, PEOPLE, "Programmer"),
    role(|c| &c.designers, PEOPLE, "Designer"),
    role(|c| &c.hosts, PEOPLE, "Host"),
    role(|c| &c.guests, PEOPLE, "Guest"),
];

struct EpisodeRole {
    field: fn(&crate::content::Episode) -> &OneOrMany,
    prefix: &'static str,
    label: &'static str,
}

const EPISODE_ROLES: &[EpisodeRole] = &[
    EpisodeRole {
        field: |e| &e.directors,
        prefix: PEOPLE,
        label: "Director",
    },
    EpisodeRole {
        field: |e| &e.writers,
        prefix: PEOPLE,
        label: "Writer",
    },
    EpisodeRole {
        field: |e| &e.editors,
        prefix: PEOPLE,
        label: "Editor",
    },
    EpisodeRole {
        field: |e| &e.cinematography,
        prefix: PEOPLE,
        label: "Cinematography",
    },
    EpisodeRole {
        field: |e| &e.teleplay,
        prefix: PEOPLE,
        label: "Teleplay",
    },
    EpisodeRole {
        field: |e| &e.story,
        prefix: PEOPLE,
        label: "Story",
    },
    EpisodeRole {
        field: |e| &e.studio,
        prefix: COMPANIES,
        label: "Studio",
    },
];

/// Path a `series` field points at: two directories above the source, then
/// `Series/<name>`.
pub fn series_path(source: &str, series: &str) -> String {
    let base = dir_name(dir_name(source));
    if base.is_empty() {
        format!("Series/{series}")
    } else {
        format!("{base}/Series/{series}")
    }
}

/// Every connection `content` declares, in a fixed order.
pub fn extract(content: &Content) -> Vec<Connection> {
    let mut out = Vec::new();

    push_roles(&mut out, content, LEADING_ROLES);

    for reference in content.based_on.iter() {
        push_path(&mut out, &reference.path, "Source", Meta::Unset);
    }
    if !content.series.is_empty() {
        let mut connection = Connection::new(series_path(&content.source, &content.series), "Series");
        connection.meta = Meta::Series;
        out.push(connection);
    }
    if let Some(previous) = &content.previous {
        push_path(&mut out, &previous.path, "", Meta::Previous);
    }

    push_roles(&mut out, content, ROLES);

    if let Some(remake) = &content.remake_of {
        push_path(&mut out, &remake.path, "Remake", Meta::Unset);
    }

    push_characters(&mut out, &content.characters, None);

    for reference in content.references.iter() {
        push_path(&mut out, &reference.path, "References", Meta::None);
    }

    for episode in &content.episodes {
        let parent = Some(episode.name.clone()).filter(|name| !name.is_empty());
        for role in EPISODE_ROLES {
            for value in (role.field)(episode).iter().filter(|v| !v.is_empty()) {
                let mut connection = Connection::new(format!("{}{value}", role.prefix), role.label);
                connection.parent = parent.clone();
                out.push(connection);
            }
        }
        push_characters(&mut out, &episode.characters, parent.as_deref());
    }

    out
}

fn push_roles(out: &mut Vec<Connection>, content: &Content, table: &[RoleField]) {
    for role in table {
        for value in (role.field)(content).iter().filter(|v| !v.is_empty()) {
            out.push(Connection::new(format!("{}{value}", role.prefix), role.label));
        }
    }
}

fn push_path(out: &mut Vec<Connection>, path: &str, label: &str, meta: Meta) {
    let path = path.trim_matches('/');
    if path.is_empty() {
        return;
    }
    let mut connection = Connection::new(path.to_string(), label);
    connection.meta = meta;
    out.push(connection);
}

fn push_characters(out: &mut Vec<Connection>, characters: &[Character], parent: Option<&str>) {
    for character in characters {
        let info = Some(character.name.clone()).filter(|name| !name.is_empty());
        for (person, label) in [(&character.actor, "Played"), (&character.voice, "Voiced")] {
            if person.is_empty() {
                continue;
            }
            out.push(Connection {
                to: format!("{PEOPLE}{person}"),
                label: label.to_string(),
                info: info.clone(),
                meta: Meta::Unset,
                parent: parent.map(str::to_string),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str, yaml: &str) -> Content {
        Content::from_yaml(source, yaml).expect("parse test content")
    }

    #[test]
    fn every_role_value_yields_prefixed_connection() {
        let content = parse(
            "Movies/2022/Tár.yml",
            "directors: Todd Field\nwriters: [Todd Field]\nproduction: [Focus Features, Standard Film]\nnetwork: HBO\n",
        );
        let connections = extract(&content);
        let pairs: Vec<(&str, &str)> = connections
            .iter()
            .map(|c| (c.to.as_str(), c.label.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("People/Todd Field", "Director"),
                ("People/Todd Field", "Writer"),
                ("Companies/HBO", "Network"),
                ("Companies/Focus Features", "Production"),
                ("Companies/Standard Film", "Production"),
            ]
        );
    }

    #[test]
    fn characters_carry_name_as_info() {
        let content = parse(
            "Movies/2022/Tár.yml",
            "characters:\n  - name: Lydia Tár\n    actor: Cate Blanchett\n  - name: Narrator\n    voice: Someone\n",
        );
        let connections = extract(&content);
        assert_eq!(connections.len(), 2);
        assert_eq!(connections[0].label, "Played");
        assert_eq!(connections[0].info.as_deref(), Some("Lydia Tár"));
        assert_eq!(connections[1].to, "People/Someone");
        assert_eq!(connections[1].label, "Voiced");
    }

    #[test]
    fn episode_credits_are_scoped_by_parent() {
        let content = parse(
            "Series/2011/Black Mirror.yml",
            "episodes:\n  - name: The National Anthem\n    writers: Charlie Brooker\n  - name: Fifteen Million Merits\n    writers: Charlie Brooker\n    studio: Zeppotron\n",
        );
        let connections = extract(&content);
        assert_eq!(connections.len(), 3);
        assert_eq!(connections[0].parent.as_deref(), Some("The National Anthem"));
        assert_eq!(connections[1].parent.as_deref(), Some("Fifteen Million Merits"));
        assert_eq!(connections[2].to, "Companies/Zeppotron");
        assert_eq!(connections[2].label, "Studio");
    }

    #[test]
    fn series_and_previous_are_tagged() {
        let content = parse(
            "Books/1954/The Two Towers.yml",
            "series: The Lord of the Rings\nprevious: Books/1954/The Fellowship of the Ring\nreferences: [Movies/2002/The Two Towers]\n",
        );
        let connections = extract(&content);
        assert_eq!(connections[0].to, "Books/Series/The Lord of the Rings");
        assert_eq!(connections[0].meta, Meta::Series);
        assert_eq!(connections[1].to, "Books/1954/The Fellowship of the Ring");
        assert_eq!(connections[1].meta, Meta::Previous);
        assert_eq!(connections[1].label, "");
        assert_eq!(connections[2].meta, Meta::None);
    }

    #[test]
    fn empty_values_produce_nothing() {
        let content = parse("Movies/X.yml", "directors: ['']\ncharacters:\n  - name: Nobody\n");
        assert!(extract(&content).is_empty());
    }
}
