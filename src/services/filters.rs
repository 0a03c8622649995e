use serde::Deserialize;

use crate::db::models::{AirdropRecord, Comment, DogRecord, RecordKind};

/// Query-string filters accepted by both record listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub user_id: Option<i64>,
    pub username: Option<String>,
}

impl RecordQuery {
    fn search_term(&self) -> Option<String> {
        non_empty(&self.search).map(str::to_lowercase)
    }

    fn status(&self) -> Option<&str> {
        non_empty(&self.status).filter(|s| *s != "all")
    }

    fn username_term(&self) -> Option<String> {
        non_empty(&self.username).map(str::to_lowercase)
    }

    fn keeps(&self, status: &str, user_id: i64, username: &str, haystack: &[&str]) -> bool {
        if let Some(term) = self.search_term() {
            if !haystack.iter().any(|h| h.to_lowercase().contains(&term)) {
                return false;
            }
        }
        if let Some(wanted) = self.status() {
            if wanted != status {
                return false;
            }
        }
        if let Some(wanted) = self.user_id {
            if wanted != user_id {
                return false;
            }
        }
        if let Some(term) = self.username_term() {
            if !username.to_lowercase().contains(&term) {
                return false;
            }
        }
        true
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Search matches project or platform.
pub fn filter_records(records: Vec<AirdropRecord>, query: &RecordQuery) -> Vec<AirdropRecord> {
    records
        .into_iter()
        .filter(|r| {
            query.keeps(
                r.status.as_str(),
                r.user_id,
                &r.username,
                &[&r.project, &r.platform],
            )
        })
        .collect()
}

/// Search matches token name, contract address or narrative.
pub fn filter_dog_records(records: Vec<DogRecord>, query: &RecordQuery) -> Vec<DogRecord> {
    records
        .into_iter()
        .filter(|r| {
            query.keeps(
                r.status.as_str(),
                r.user_id,
                &r.username,
                &[&r.name, &r.ca, &r.narrative],
            )
        })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentQuery {
    pub record_id: Option<i64>,
    pub record_type: Option<RecordKind>,
}

pub fn filter_comments(comments: Vec<Comment>, query: &CommentQuery) -> Vec<Comment> {
    comments
        .into_iter()
        .filter(|c| query.record_id.map_or(true, |id| c.record_id == id))
        .filter(|c| query.record_type.map_or(true, |kind| c.record_type == kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::*;
    use chrono::Utc;

    fn record(id: i64, project: &str, platform: &str, status: AirdropStatus) -> AirdropRecord {
        NewAirdropRecord {
            user_id: id % 2,
            username: if id % 2 == 0 { "Alice" } else { "bob" }.into(),
            project: project.into(),
            platform: platform.into(),
            status,
            reward: String::new(),
            difficulty: Difficulty::Medium,
            description: String::new(),
            final_reward: 0.0,
            funding: String::new(),
        }
        .into_record(id, Utc::now())
    }

    fn ids(records: &[AirdropRecord]) -> Vec<i64> {
        records.iter().map(|r| r.id).collect()
    }

    fn sample() -> Vec<AirdropRecord> {
        vec![
            record(1, "LayerZero", "Twitter", AirdropStatus::InProgress),
            record(2, "Scroll", "Galxe", AirdropStatus::Completed),
            record(3, "zkSync", "layer3", AirdropStatus::Expired),
        ]
    }

    #[test]
    fn empty_query_keeps_everything() {
        let kept = filter_records(sample(), &RecordQuery::default());
        assert_eq!(ids(&kept), vec![1, 2, 3]);
    }

    #[test]
    fn search_is_case_insensitive_over_project_and_platform() {
        let query = RecordQuery {
            search: Some("LAYER".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_records(sample(), &query)), vec![1, 3]);
    }

    #[test]
    fn status_all_disables_status_filter() {
        let all = RecordQuery {
            status: Some("all".into()),
            ..Default::default()
        };
        assert_eq!(filter_records(sample(), &all).len(), 3);

        let completed = RecordQuery {
            status: Some("completed".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_records(sample(), &completed)), vec![2]);
    }

    #[test]
    fn user_filters_combine() {
        let query = RecordQuery {
            user_id: Some(1),
            username: Some("BO".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_records(sample(), &query)), vec![1, 3]);
    }

    #[test]
    fn dog_search_covers_contract_address() {
        let now = Utc::now();
        let dog = NewDogRecord {
            user_id: 1,
            username: "admin".into(),
            name: "Unknown Token".into(),
            ca: "0xDeadBeef".into(),
            narrative: "meme".into(),
            time: now,
            current_market_cap: 0.0,
            status: TokenStatus::Zeroed,
            reason: String::new(),
            last_updated: now,
        }
        .into_record(1, now);

        let hit = RecordQuery {
            search: Some("deadbeef".into()),
            ..Default::default()
        };
        assert_eq!(filter_dog_records(vec![dog.clone()], &hit).len(), 1);

        let miss = RecordQuery {
            status: Some("normal".into()),
            ..Default::default()
        };
        assert!(filter_dog_records(vec![dog], &miss).is_empty());
    }
}
