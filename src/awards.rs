use std::collections::BTreeMap;

use crate::content::{Award, Content, Reference, Winner, base_name, content_id, path_type};
use crate::store::ContentStore;

/// Awards whose winner has no content yet, keyed by the winner's ContentID.
pub type PendingAwards = BTreeMap<String, Vec<Award>>;

/// Ceremonies held in year N honour works from year N-1.
const PREVIOUS_YEAR_CEREMONIES: &[&str] = &["Oscar", "BAFTA"];

/// Year an award page is about, taken from its file name.
pub fn award_year(source: &str) -> String {
    let id = content_id(source);
    let year = base_name(&id);
    let offset = id
        .split('/')
        .any(|segment| PREVIOUS_YEAR_CEREMONIES.contains(&segment));
    if !offset {
        return year.to_string();
    }
    match year.parse::<i32>() {
        Ok(year) => match year.checked_sub(1) {
            Some(previous) => previous.to_string(),
            None => {
                tracing::warn!(source = %source, "award page: year out of range");
                String::new()
            }
        },
        Err(err) => {
            tracing::warn!(source = %source, error = %err, "award page: year is not a number");
            String::new()
        }
    }
}

/// Where winners of an award page live (`Movies/Awards/Oscar/2023.yml` → `Movies/2022`).
pub fn award_prefix(source: &str, year: &str) -> String {
    let kind = match path_type(source) {
        "Games" => "Games/Video",
        other => other,
    };
    format!("{kind}/{year}")
}

/// Resolves a winner to `(target id, display name)`.
pub fn resolve_winner(winner: &Winner, prefix: &str, year: &str) -> Option<(String, String)> {
    if let Some(reference) = winner.reference.as_ref().filter(|r| !r.path.is_empty()) {
        let name = if reference.name.is_empty() {
            base_name(&reference.path).to_string()
        } else {
            reference.name.clone()
        };
        return Some((reference.path.trim_matches('/').to_string(), name));
    }
    if !winner.movie.is_empty() {
        return Some((format!("{prefix}/{}", winner.movie), winner.movie.clone()));
    }
    if !winner.game.is_empty() {
        return Some((format!("{prefix}/{}", winner.game), winner.game.clone()));
    }
    if !winner.series.is_empty() {
        return Some((format!("Series/{year}/{}", winner.series), winner.series.clone()));
    }
    if !winner.person.is_empty() {
        return Some((format!("People/{}", winner.person), winner.person.clone()));
    }
    None
}

/// Puts `award` on the right list of `target`. Returns `false` when an actor
/// award names nobody among the target's characters.
pub fn attach_award(target: &mut Content, winner: &Winner, award: Award) -> bool {
    if !winner.actor.is_empty() {
        return match target
            .characters
            .iter_mut()
            .find(|character| character.actor == winner.actor)
        {
            Some(character) => {
                character.awards.push(award);
                true
            }
            None => false,
        };
    }

    let bucket = if !winner.cinematography.is_empty() {
        &mut target.cinematography_awards
    } else if !winner.music.is_empty() {
        &mut target.music_awards
    } else if !winner.editors.is_empty() {
        &mut target.editors_awards
    } else if !winner.writers.is_empty() {
        &mut target.writers_awards
    } else if !winner.directors.is_empty() {
        &mut target.directors_awards
    } else if !winner.screenplay.is_empty() {
        &mut target.screenplay_awards
    } else {
        &mut target.awards
    };
    bucket.push(award);
    true
}

/// Links the winners of every award page. Must run after all content is
/// stored; winners whose content is absent are returned as pending.
pub fn link_awards(store: &ContentStore, award_pages: &[String]) -> PendingAwards {
    let mut pending = PendingAwards::new();
    let mut pages = award_pages.to_vec();
    pages.sort();
    pages.dedup();

    for page_id in &pages {
        let Some(mut page) = store.get(page_id) else {
            continue;
        };
        let year = award_year(&page.source);
        let prefix = award_prefix(&page.source, &year);

        let mut resolved = Vec::new();
        for category in &mut page.categories {
            let Some((target, name)) = resolve_winner(&category.winner, &prefix, &year) else {
                tracing::warn!(page = %page_id, category = %category.name, "unknown winner reference");
                continue;
            };
            category.winner.reference = Some(Reference {
                path: target.clone(),
                name: String::new(),
            });
            category.winner.fallback = name;
            resolved.push((
                target,
                category.winner.clone(),
                Award {
                    category: category.name.clone(),
                    reference: page_id.clone(),
                },
            ));
        }
        store.insert(page);

        for (target, winner, award) in resolved {
            if !store.contains(&target) {
                pending.entry(target).or_default().push(award);
                continue;
            }
            let mut matched = true;
            store.update(&target, |content| {
                matched = attach_award(content, &winner, award);
            });
            if !matched {
                tracing::warn!(page = %page_id, target = %target, actor = %winner.actor, "no character found for actor");
            }
        }
    }

    tracing::info!(pages = pages.len(), pending = pending.len(), "awards: linked");
    pending
}
