mod character;
mod episode;
mod record;

pub use character::Character;
pub use episode::{character_id, character_ids, Episode, EpisodeFilter};
pub use record::ViewedRecord;
