use serde::{Deserialize, Serialize};

/// A character appearing in one or more episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: u32,
    pub name: String,
    /// Avatar image URL.
    pub image: String,
    /// `Alive`, `Dead` or `unknown`, as reported by the catalog.
    pub status: String,
    pub url: String,
}
