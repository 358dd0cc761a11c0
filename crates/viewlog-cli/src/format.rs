use viewlog_core::events::EventEntry;
use viewlog_core::models::{Character, Episode};

/// One list line: checkbox, id, code, name, air date.
pub fn episode_line(episode: &Episode) -> String {
    format!(
        "[{}] {:>3}  {:<7} {}  ({})",
        if episode.viewed { "x" } else { " " },
        episode.id,
        episode.code,
        episode.name,
        episode.air_date
    )
}

pub fn episode_detail(episode: &Episode) -> String {
    format!(
        "{}\n{} - {}\nViewed: {}",
        episode.name,
        episode.code,
        episode.air_date,
        if episode.viewed { "yes" } else { "no" }
    )
}

pub fn character_line(character: &Character) -> String {
    format!("  {:>4}  {} ({})", character.id, character.name, character.status)
}

pub fn notice_line((at, event): &EventEntry) -> String {
    format!("{} {}", at.format("%H:%M:%S"), event)
}
