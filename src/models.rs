use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub type Id = Uuid;

/// Two-state lifecycle of a top-level thread. `Resolved` holds exactly when
/// an accepted answer is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "thread_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadStatus {
    Unanswered,
    Resolved,
}

impl ThreadStatus {
    pub fn for_accepted(accepted_answer_id: Option<Id>) -> Self {
        if accepted_answer_id.is_some() { ThreadStatus::Resolved } else { ThreadStatus::Unanswered }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "UNANSWERED" => Some(ThreadStatus::Unanswered),
            "RESOLVED" => Some(ThreadStatus::Resolved),
            _ => None,
        }
    }
}

/// A discussion post. With `parent_id` set it is a reply to that thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: Id,
    pub title: Option<String>,
    pub content: String,
    pub author_id: Id,
    pub classroom_id: Option<Id>,
    pub unit_id: Option<Id>,
    pub parent_id: Option<Id>,
    pub status: ThreadStatus,
    pub accepted_answer_id: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn is_reply(&self) -> bool { self.parent_id.is_some() }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub title: Option<String>,
    pub content: Option<String>,
    pub classroom_id: Option<Id>,
    pub unit_id: Option<Id>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewReply {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateThread {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl UpdateThread {
    pub fn is_empty(&self) -> bool { self.title.is_none() && self.content.is_none() }
}

/// One row per (subject, user). Unliking flips `is_liked` instead of deleting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub subject_id: Id,
    pub user_id: Id,
    pub is_liked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Records owned by the excluded classroom resources; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Unit {
    pub id: Id,
    pub classroom_id: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Classroom {
    pub id: Id,
    pub faculty_id: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FacultyProfile {
    pub id: Id,
    pub user_id: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Enrollment {
    pub user_id: Id,
    pub classroom_id: Id,
}

/// Thread (or reply) together with its computed engagement counters.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub thread: Thread,
    pub replies_count: i64,
    pub likes_count: i64,
    pub is_liked_by_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplyView {
    #[serde(flatten)]
    pub reply: ThreadSummary,
    pub is_accepted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ThreadPage {
    pub threads: Vec<ThreadSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub thread: ThreadSummary,
    pub replies: Vec<ReplyView>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub subject_id: Id,
    pub user_id: Id,
    pub liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcceptAnswerResponse {
    pub thread_id: Id,
    pub accepted_answer_id: Option<Id>,
    pub status: ThreadStatus,
}
