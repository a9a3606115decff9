use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::spotify::track::LikedItem;

/// Year and month a track was liked, formatted `YYYY-MM` in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodKey(String);

impl PeriodKey {
    pub fn from_timestamp(added_at: &DateTime<Utc>) -> Self {
        Self(added_at.format("%Y-%m").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodGroup {
    pub period: PeriodKey,
    pub track_ids: Vec<String>,
}

/// Buckets liked items by month. Groups come out in the order their month is
/// first seen and keep the feed order inside each group, duplicates included.
pub fn group_by_period(items: &[LikedItem]) -> Vec<PeriodGroup> {
    let mut groups: Vec<PeriodGroup> = Vec::new();
    let mut index: HashMap<PeriodKey, usize> = HashMap::new();
    for item in items {
        let period = PeriodKey::from_timestamp(&item.added_at);
        let position = *index.entry(period.clone()).or_insert_with(|| {
            groups.push(PeriodGroup {
                period,
                track_ids: Vec::new(),
            });
            groups.len() - 1
        });
        groups[position].track_ids.push(item.track_id.clone());
    }
    groups
}
