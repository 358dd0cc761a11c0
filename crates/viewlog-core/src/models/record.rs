use serde::{Deserialize, Serialize};

use super::Episode;

/// The persisted viewed state of one episode for one user.
///
/// Everything except `viewed` is a denormalized copy of the episode taken at
/// write time and is never read back into memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewedRecord {
    pub episode_id: u32,
    pub name: String,
    pub code: String,
    pub air_date: String,
    pub character_refs: Vec<String>,
    pub viewed: bool,
}

impl ViewedRecord {
    pub fn from_episode(episode: &Episode) -> Self {
        Self {
            episode_id: episode.id,
            name: episode.name.clone(),
            code: episode.code.clone(),
            air_date: episode.air_date.clone(),
            character_refs: episode.character_refs.clone(),
            viewed: episode.viewed,
        }
    }
}
