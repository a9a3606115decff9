use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

impl PlaylistSummary {
    pub fn new(id: String, name: String, owner_id: String) -> Self {
        Self { id, name, owner_id }
    }

    pub fn get_playlist_url(&self) -> String {
        format!("https://open.spotify.com/playlist/{}", self.id)
    }
}
