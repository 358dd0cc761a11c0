use serde::{Deserialize, Serialize};

/// One catalog episode plus the session's viewed flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: u32,
    pub name: String,
    pub air_date: String,
    /// Season/episode code, e.g. `S01E01`.
    pub code: String,
    /// Character resource URLs; each ends in a numeric character id.
    pub character_refs: Vec<String>,
    #[serde(default)]
    pub viewed: bool,
}

impl Episode {
    /// Character ids referenced by this episode, in order, skipping bad refs.
    pub fn character_ids(&self) -> Vec<u32> {
        character_ids(&self.character_refs)
    }
}

/// Parse the trailing numeric id of a character reference.
///
/// Accepts full URLs (`https://host/api/character/42`) as well as bare
/// paths. Returns `None` for anything that does not end in a positive integer.
pub fn character_id(reference: &str) -> Option<u32> {
    let trimmed = reference.trim().trim_end_matches('/');
    let segment = match url::Url::parse(trimmed) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_owned)?,
        Err(_) => trimmed.rsplit('/').next()?.to_owned(),
    };
    segment.parse::<u32>().ok().filter(|id| *id > 0)
}

/// Parse every reference, dropping the ones without a valid id.
pub fn character_ids<S: AsRef<str>>(references: &[S]) -> Vec<u32> {
    references
        .iter()
        .filter_map(|r| {
            let parsed = character_id(r.as_ref());
            if parsed.is_none() {
                tracing::debug!(reference = r.as_ref(), "Skipping unparseable character ref");
            }
            parsed
        })
        .collect()
}

/// Predefined episode list filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeFilter {
    #[default]
    All,
    Watched,
    Pending,
}

impl EpisodeFilter {
    pub fn matches(self, episode: &Episode) -> bool {
        match self {
            Self::All => true,
            Self::Watched => episode.viewed,
            Self::Pending => !episode.viewed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Watched => "watched",
            Self::Pending => "pending",
        }
    }
}

impl std::fmt::Display for EpisodeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EpisodeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "watched" | "viewed" => Ok(Self::Watched),
            "pending" | "unwatched" => Ok(Self::Pending),
            other => Err(format!("unknown filter '{other}'")),
        }
    }
}
