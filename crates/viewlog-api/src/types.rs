//! Wire types for the catalog API and their conversion into core models.

use serde::Deserialize;
use viewlog_core::models::{Character, Episode};

/// Response of `GET /episode`.
///
/// Only the first page is read; the `info.next` link is not followed, so the
/// live API yields its first 20 episodes.
#[derive(Debug, Deserialize)]
pub struct EpisodesResponse {
    pub results: Vec<ApiEpisode>,
}

#[derive(Debug, Deserialize)]
pub struct ApiEpisode {
    pub id: u32,
    pub name: String,
    pub air_date: String,
    /// Season/episode code such as `S01E01`.
    pub episode: String,
    #[serde(default)]
    pub characters: Vec<String>,
}

impl ApiEpisode {
    pub fn into_episode(self) -> Episode {
        Episode {
            id: self.id,
            name: self.name,
            air_date: self.air_date,
            code: self.episode,
            character_refs: self.characters,
            viewed: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiCharacter {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub url: String,
}

impl ApiCharacter {
    pub fn into_character(self) -> Character {
        Character {
            id: self.id,
            name: self.name,
            image: self.image,
            status: self.status,
            url: self.url,
        }
    }
}

/// `GET /character/{ids}` returns a bare object when a single id is asked for
/// and an array otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}
