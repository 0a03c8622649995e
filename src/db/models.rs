use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "123456";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
    pub last_updated: DateTime<Utc>,
}

impl AdminConfig {
    pub fn default_at(now: DateTime<Utc>) -> Self {
        Self {
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
            last_updated: now,
        }
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AirdropStatus {
    #[default]
    InProgress,
    Completed,
    Expired,
}

impl AirdropStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AirdropStatus::InProgress => "in-progress",
            AirdropStatus::Completed => "completed",
            AirdropStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in-progress" => Some(AirdropStatus::InProgress),
            "completed" => Some(AirdropStatus::Completed),
            "expired" => Some(AirdropStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenStatus {
    Normal,
    SharpDecline,
    NearZero,
    Zeroed,
}

impl TokenStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenStatus::Normal => "normal",
            TokenStatus::SharpDecline => "sharp-decline",
            TokenStatus::NearZero => "near-zero",
            TokenStatus::Zeroed => "zeroed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(TokenStatus::Normal),
            "sharp-decline" => Some(TokenStatus::SharpDecline),
            "near-zero" => Some(TokenStatus::NearZero),
            "zeroed" => Some(TokenStatus::Zeroed),
            _ => None,
        }
    }
}

/// Which parent collection a comment hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "airdrop")]
    Airdrop,
    #[serde(rename = "dog", alias = "scam-token")]
    Dog,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Airdrop => "airdrop",
            RecordKind::Dog => "dog",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "airdrop" => Some(RecordKind::Airdrop),
            "dog" | "scam-token" => Some(RecordKind::Dog),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirdropRecord {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub project: String,
    pub platform: String,
    pub status: AirdropStatus,
    pub reward: String,
    pub difficulty: Difficulty,
    pub description: String,
    pub final_reward: f64,
    pub funding: String,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAirdropRecord {
    pub user_id: i64,
    pub username: String,
    pub project: String,
    pub platform: String,
    pub status: AirdropStatus,
    pub reward: String,
    pub difficulty: Difficulty,
    pub description: String,
    pub final_reward: f64,
    pub funding: String,
}

impl NewAirdropRecord {
    pub fn into_record(self, id: i64, now: DateTime<Utc>) -> AirdropRecord {
        AirdropRecord {
            id,
            user_id: self.user_id,
            username: self.username,
            project: self.project,
            platform: self.platform,
            status: self.status,
            reward: self.reward,
            difficulty: self.difficulty,
            description: self.description,
            final_reward: self.final_reward,
            funding: self.funding,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirdropPatch {
    pub project: Option<String>,
    pub platform: Option<String>,
    pub status: Option<AirdropStatus>,
    pub reward: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub description: Option<String>,
    pub final_reward: Option<f64>,
    pub funding: Option<String>,
}

impl AirdropPatch {
    pub fn apply(self, record: &mut AirdropRecord, now: DateTime<Utc>) {
        if let Some(project) = self.project {
            record.project = project;
        }
        if let Some(platform) = self.platform {
            record.platform = platform;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(reward) = self.reward {
            record.reward = reward;
        }
        if let Some(difficulty) = self.difficulty {
            record.difficulty = difficulty;
        }
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(final_reward) = self.final_reward {
            record.final_reward = final_reward;
        }
        if let Some(funding) = self.funding {
            record.funding = funding;
        }
        record.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DogRecord {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub name: String,
    pub ca: String,
    pub narrative: String,
    pub time: DateTime<Utc>,
    pub current_market_cap: f64,
    pub status: TokenStatus,
    pub reason: String,
    pub comment_count: i64,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDogRecord {
    pub user_id: i64,
    pub username: String,
    pub name: String,
    pub ca: String,
    pub narrative: String,
    pub time: DateTime<Utc>,
    pub current_market_cap: f64,
    pub status: TokenStatus,
    pub reason: String,
    pub last_updated: DateTime<Utc>,
}

impl NewDogRecord {
    pub fn into_record(self, id: i64, now: DateTime<Utc>) -> DogRecord {
        DogRecord {
            id,
            user_id: self.user_id,
            username: self.username,
            name: self.name,
            ca: self.ca,
            narrative: self.narrative,
            time: self.time,
            current_market_cap: self.current_market_cap,
            status: self.status,
            reason: self.reason,
            comment_count: 0,
            last_updated: self.last_updated,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a dog record. The contract address is immutable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DogPatch {
    pub name: Option<String>,
    pub narrative: Option<String>,
    pub current_market_cap: Option<f64>,
    pub status: Option<TokenStatus>,
    pub reason: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DogPatch {
    pub fn apply(self, record: &mut DogRecord, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(narrative) = self.narrative {
            record.narrative = narrative;
        }
        if let Some(cap) = self.current_market_cap {
            record.current_market_cap = cap;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(reason) = self.reason {
            record.reason = reason;
        }
        if let Some(last_updated) = self.last_updated {
            record.last_updated = last_updated;
        }
        record.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub record_id: i64,
    pub record_type: RecordKind,
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub record_id: i64,
    pub record_type: RecordKind,
    pub username: String,
    pub content: String,
}

impl NewComment {
    pub fn into_comment(self, id: i64, now: DateTime<Utc>) -> Comment {
        Comment {
            id,
            record_id: self.record_id,
            record_type: self.record_type,
            username: self.username,
            content: self.content,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Collections listed newest-first carry a creation time and an id tiebreaker.
pub trait Chronological {
    fn id(&self) -> i64;
    fn created_at(&self) -> DateTime<Utc>;
}

impl Chronological for AirdropRecord {
    fn id(&self) -> i64 {
        self.id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Chronological for DogRecord {
    fn id(&self) -> i64 {
        self.id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Chronological for Comment {
    fn id(&self) -> i64 {
        self.id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// `max(existing ids) + 1`, or 1 for an empty collection.
pub fn next_id<T: Chronological>(items: &[T]) -> i64 {
    items.iter().map(Chronological::id).max().unwrap_or(0) + 1
}

pub fn sort_newest_first<T: Chronological>(items: &mut [T]) {
    items.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(&a.id()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn comment(id: i64, created_at: DateTime<Utc>) -> Comment {
        Comment {
            id,
            record_id: 1,
            record_type: RecordKind::Airdrop,
            username: "bob".into(),
            content: "hi".into(),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn next_id_starts_at_one() {
        let empty: Vec<Comment> = Vec::new();
        assert_eq!(next_id(&empty), 1);
    }

    #[test]
    fn next_id_uses_max_not_len() {
        let now = Utc::now();
        let items = vec![comment(7, now), comment(3, now)];
        assert_eq!(next_id(&items), 8);
    }

    #[test]
    fn newest_first_breaks_ties_by_id() {
        let now = Utc::now();
        let mut items = vec![
            comment(1, now - Duration::seconds(5)),
            comment(2, now),
            comment(3, now),
        ];
        sort_newest_first(&mut items);
        let ids: Vec<i64> = items.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn record_kind_accepts_scam_token_alias() {
        let kind: RecordKind = serde_json::from_str("\"scam-token\"").unwrap();
        assert_eq!(kind, RecordKind::Dog);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"dog\"");
    }

    #[test]
    fn record_serializes_camel_case() {
        let now = Utc::now();
        let record = NewAirdropRecord {
            user_id: 1,
            username: "admin".into(),
            project: "Foo".into(),
            platform: "X".into(),
            status: AirdropStatus::InProgress,
            reward: String::new(),
            difficulty: Difficulty::Easy,
            description: String::new(),
            final_reward: 0.0,
            funding: String::new(),
        }
        .into_record(1, now);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["commentCount"], 0);
        assert_eq!(json["status"], "in-progress");
        assert_eq!(json["finalReward"], 0.0);
    }
}
