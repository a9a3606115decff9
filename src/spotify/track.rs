use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LikedItem {
    pub track_id: String,
    pub added_at: DateTime<Utc>,
}

impl LikedItem {
    pub fn new(track_id: String, added_at: DateTime<Utc>) -> Self {
        Self { track_id, added_at }
    }
}

pub fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}
