//! Thread listing filters, sort directives and pagination.
//!
//! Turns the flat query-string bag accepted by `GET /threads` into a
//! [`ThreadFilter`], a [`ThreadSort`] and a [`PageRequest`]. Everything here is
//! storage agnostic: the in-memory store evaluates [`ThreadFilter::matches`]
//! and [`ThreadSort::compare`] directly, the Postgres store renders the same
//! values into SQL.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{ApiError, ApiResult};
use crate::models::{Id, Pagination, Thread, ThreadStatus, ThreadSummary};

/// `classroomId` value selecting threads that belong to no classroom.
pub const GLOBAL_SCOPE: &str = "global";
/// `unitId` value selecting threads that are not attached to a unit.
pub const NO_UNIT: &str = "none";

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ThreadListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    /// A classroom id, or `global` for threads outside any classroom.
    pub classroom_id: Option<String>,
    /// A unit id, or `none` for threads without a unit.
    pub unit_id: Option<String>,
    pub status: Option<String>,
    pub author_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub has_replies: Option<bool>,
    pub has_likes: Option<bool>,
}

/// Paging and sorting knobs shared by the unit listing and the reply listing.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

pub fn parse_id(raw: &str, field: &str) -> ApiResult<Id> {
    Id::parse_str(raw.trim()).map_err(|_| ApiError::validation(format!("{field} must be a valid UUID")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassroomScope {
    /// No classroom constraint at all.
    Any,
    /// `classroom_id IS NULL`
    Global,
    Classroom(Id),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitScope {
    Any,
    /// `unit_id IS NULL`
    Unassigned,
    Unit(Id),
}

/// Resolved listing predicate. Listings are always restricted to top-level
/// threads; the remaining fields narrow that set.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadFilter {
    pub classroom: ClassroomScope,
    pub unit: UnitScope,
    pub status: Option<ThreadStatus>,
    pub author_id: Option<Id>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub has_replies: Option<bool>,
    pub has_likes: Option<bool>,
}

impl ThreadFilter {
    pub fn from_query(q: &ThreadListQuery) -> ApiResult<Self> {
        let classroom = match non_blank(&q.classroom_id) {
            Some(raw) if raw.eq_ignore_ascii_case(GLOBAL_SCOPE) => Some(ClassroomScope::Global),
            Some(raw) => Some(ClassroomScope::Classroom(parse_id(raw, "classroomId")?)),
            None => None,
        };
        let unit = match non_blank(&q.unit_id) {
            Some(raw) if raw.eq_ignore_ascii_case(NO_UNIT) => Some(UnitScope::Unassigned),
            Some(raw) => Some(UnitScope::Unit(parse_id(raw, "unitId")?)),
            None => None,
        };
        // The unscoped feed is the global one, and shows only unit-less
        // threads unless a unit was asked for.
        let (classroom, unit) = match (classroom, unit) {
            (Some(c), u) => (c, u.unwrap_or(UnitScope::Any)),
            (None, u) => (ClassroomScope::Global, u.unwrap_or(UnitScope::Unassigned)),
        };
        let status = match non_blank(&q.status) {
            Some(raw) => Some(ThreadStatus::parse(raw).ok_or_else(|| {
                ApiError::validation("status must be UNANSWERED or RESOLVED")
            })?),
            None => None,
        };
        let author_id = non_blank(&q.author_id).map(|raw| parse_id(raw, "authorId")).transpose()?;
        let date_from = non_blank(&q.date_from).map(|raw| parse_date(raw, false, "dateFrom")).transpose()?;
        let date_to = non_blank(&q.date_to).map(|raw| parse_date(raw, true, "dateTo")).transpose()?;
        Ok(Self {
            classroom,
            unit,
            status,
            author_id,
            date_from,
            date_to,
            has_replies: q.has_replies,
            has_likes: q.has_likes,
        })
    }

    /// Unit listing behind the membership check: the classroom is already
    /// scoped by the caller, so only the unit is fixed.
    pub fn for_unit(unit_id: Id) -> Self {
        Self {
            classroom: ClassroomScope::Any,
            unit: UnitScope::Unit(unit_id),
            status: None,
            author_id: None,
            date_from: None,
            date_to: None,
            has_replies: None,
            has_likes: None,
        }
    }

    pub fn classroom_id(&self) -> Option<Id> {
        match self.classroom {
            ClassroomScope::Classroom(id) => Some(id),
            _ => None,
        }
    }

    pub fn matches(&self, t: &Thread, replies_count: i64, likes_count: i64) -> bool {
        if t.parent_id.is_some() {
            return false;
        }
        let classroom_ok = match self.classroom {
            ClassroomScope::Any => true,
            ClassroomScope::Global => t.classroom_id.is_none(),
            ClassroomScope::Classroom(id) => t.classroom_id == Some(id),
        };
        let unit_ok = match self.unit {
            UnitScope::Any => true,
            UnitScope::Unassigned => t.unit_id.is_none(),
            UnitScope::Unit(id) => t.unit_id == Some(id),
        };
        classroom_ok
            && unit_ok
            && self.status.map_or(true, |s| t.status == s)
            && self.author_id.map_or(true, |a| t.author_id == a)
            && self.date_from.map_or(true, |from| t.created_at >= from)
            && self.date_to.map_or(true, |to| t.created_at <= to)
            && self.has_replies.map_or(true, |want| (replies_count > 0) == want)
            && self.has_likes.map_or(true, |want| (likes_count > 0) == want)
    }
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(raw: &str, end_of_day: bool, field: &str) -> ApiResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let invalid = || ApiError::validation(format!("{field} must be an RFC 3339 timestamp or YYYY-MM-DD"));
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())?;
    let time = if end_of_day {
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(invalid)?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    UpdatedAt,
    RepliesCount,
    LikesCount,
    /// Title, falling back to the body for untitled posts.
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadSort {
    pub key: SortKey,
    pub order: SortOrder,
}

impl ThreadSort {
    /// Newest first.
    pub const THREADS_DEFAULT: ThreadSort = ThreadSort { key: SortKey::CreatedAt, order: SortOrder::Desc };
    /// Conversation order.
    pub const REPLIES_DEFAULT: ThreadSort = ThreadSort { key: SortKey::CreatedAt, order: SortOrder::Asc };

    pub fn resolve(sort_by: Option<&str>, sort_order: Option<&str>, default: ThreadSort) -> Self {
        let base = match sort_by.map(str::trim).filter(|s| !s.is_empty()) {
            None => default,
            Some(raw) => match raw {
                "newest" => ThreadSort { key: SortKey::CreatedAt, order: SortOrder::Desc },
                "oldest" => ThreadSort { key: SortKey::CreatedAt, order: SortOrder::Asc },
                "mostRecent" => ThreadSort { key: SortKey::UpdatedAt, order: SortOrder::Desc },
                "mostReplied" => ThreadSort { key: SortKey::RepliesCount, order: SortOrder::Desc },
                "mostLiked" => ThreadSort { key: SortKey::LikesCount, order: SortOrder::Desc },
                "alphabetical" => ThreadSort { key: SortKey::Title, order: SortOrder::Asc },
                "createdAt" => ThreadSort { key: SortKey::CreatedAt, order: default_order(SortKey::CreatedAt, default) },
                "updatedAt" => ThreadSort { key: SortKey::UpdatedAt, order: default_order(SortKey::UpdatedAt, default) },
                "title" => ThreadSort { key: SortKey::Title, order: SortOrder::Asc },
                "repliesCount" => ThreadSort { key: SortKey::RepliesCount, order: SortOrder::Desc },
                "likesCount" => ThreadSort { key: SortKey::LikesCount, order: SortOrder::Desc },
                // unknown keys ignore sortOrder too
                _ => return ThreadSort::THREADS_DEFAULT,
            },
        };
        match sort_order.and_then(SortOrder::parse) {
            Some(order) => ThreadSort { order, ..base },
            None => base,
        }
    }

    /// Total order used by the in-memory store: sort key, then creation time,
    /// then id, all in the requested direction.
    pub fn compare(&self, a: &ThreadSummary, b: &ThreadSummary) -> Ordering {
        let primary = match self.key {
            SortKey::CreatedAt => a.thread.created_at.cmp(&b.thread.created_at),
            SortKey::UpdatedAt => a.thread.updated_at.cmp(&b.thread.updated_at),
            SortKey::RepliesCount => a.replies_count.cmp(&b.replies_count),
            SortKey::LikesCount => a.likes_count.cmp(&b.likes_count),
            SortKey::Title => title_key(&a.thread).cmp(&title_key(&b.thread)),
        };
        let ord = primary
            .then_with(|| a.thread.created_at.cmp(&b.thread.created_at))
            .then_with(|| a.thread.id.cmp(&b.thread.id));
        match self.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

fn default_order(key: SortKey, default: ThreadSort) -> SortOrder {
    if key == default.key { default.order } else { SortOrder::Desc }
}

fn title_key(t: &Thread) -> String {
    t.title.as_deref().unwrap_or(&t.content).to_lowercase()
}

/// 1-indexed page of fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }

    pub fn paginate(&self, returned: usize, total: i64) -> Pagination {
        let limit = i64::from(self.limit);
        Pagination {
            page: self.page,
            limit: self.limit,
            total,
            total_pages: (total + limit - 1) / limit,
            has_next: self.offset() + (returned as i64) < total,
            has_prev: self.page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn thread(classroom: Option<Id>, unit: Option<Id>) -> Thread {
        let now = Utc::now();
        Thread {
            id: Id::new_v4(),
            title: Some("Q".into()),
            content: "body".into(),
            author_id: Id::new_v4(),
            classroom_id: classroom,
            unit_id: unit,
            parent_id: None,
            status: ThreadStatus::Unanswered,
            accepted_answer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unscoped_listing_defaults_to_global_without_unit() {
        let f = ThreadFilter::from_query(&ThreadListQuery::default()).unwrap();
        assert_eq!(f.classroom, ClassroomScope::Global);
        assert_eq!(f.unit, UnitScope::Unassigned);
        assert!(f.matches(&thread(None, None), 0, 0));
        assert!(!f.matches(&thread(None, Some(Id::new_v4())), 0, 0));
        assert!(!f.matches(&thread(Some(Id::new_v4()), None), 0, 0));
    }

    #[test]
    fn explicit_global_does_not_default_unit() {
        let q = ThreadListQuery { classroom_id: Some("global".into()), ..Default::default() };
        let f = ThreadFilter::from_query(&q).unwrap();
        assert_eq!(f.unit, UnitScope::Any);
        assert!(f.matches(&thread(None, Some(Id::new_v4())), 0, 0));
    }

    #[test]
    fn classroom_scope_excludes_global_threads() {
        let room = Id::new_v4();
        let q = ThreadListQuery { classroom_id: Some(room.to_string()), ..Default::default() };
        let f = ThreadFilter::from_query(&q).unwrap();
        assert_eq!(f.classroom_id(), Some(room));
        assert!(f.matches(&thread(Some(room), None), 0, 0));
        assert!(!f.matches(&thread(None, None), 0, 0));
        assert!(!f.matches(&thread(Some(Id::new_v4()), None), 0, 0));
    }

    #[test]
    fn unit_sentinel_and_explicit_unit() {
        let unit = Id::new_v4();
        let q = ThreadListQuery { unit_id: Some(unit.to_string()), ..Default::default() };
        let f = ThreadFilter::from_query(&q).unwrap();
        assert_eq!(f.unit, UnitScope::Unit(unit));
        assert!(f.matches(&thread(None, Some(unit)), 0, 0));

        let q = ThreadListQuery { classroom_id: Some("global".into()), unit_id: Some("none".into()), ..Default::default() };
        assert_eq!(ThreadFilter::from_query(&q).unwrap().unit, UnitScope::Unassigned);
    }

    #[test]
    fn replies_never_match_listing() {
        let mut reply = thread(None, None);
        reply.parent_id = Some(Id::new_v4());
        assert!(!ThreadFilter::for_unit(Id::new_v4()).matches(&reply, 0, 0));
        let f = ThreadFilter::from_query(&ThreadListQuery::default()).unwrap();
        assert!(!f.matches(&reply, 0, 0));
    }

    #[test]
    fn optional_filters_apply_only_when_present() {
        let t = thread(None, None);
        let q = ThreadListQuery {
            status: Some("resolved".into()),
            ..Default::default()
        };
        assert!(!ThreadFilter::from_query(&q).unwrap().matches(&t, 0, 0));

        let q = ThreadListQuery { has_replies: Some(true), has_likes: Some(false), ..Default::default() };
        let f = ThreadFilter::from_query(&q).unwrap();
        assert!(f.matches(&t, 2, 0));
        assert!(!f.matches(&t, 0, 0));
        assert!(!f.matches(&t, 2, 1));

        let q = ThreadListQuery { author_id: Some(t.author_id.to_string()), ..Default::default() };
        assert!(ThreadFilter::from_query(&q).unwrap().matches(&t, 0, 0));
    }

    #[test]
    fn date_range_is_inclusive_and_date_only_to_covers_the_day() {
        let mut t = thread(None, None);
        t.created_at = Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap();
        let q = ThreadListQuery {
            date_from: Some("2024-03-10".into()),
            date_to: Some("2024-03-10".into()),
            ..Default::default()
        };
        assert!(ThreadFilter::from_query(&q).unwrap().matches(&t, 0, 0));

        let q = ThreadListQuery { date_from: Some((t.created_at + Duration::seconds(1)).to_rfc3339()), ..Default::default() };
        assert!(!ThreadFilter::from_query(&q).unwrap().matches(&t, 0, 0));
        let q = ThreadListQuery { date_to: Some(t.created_at.to_rfc3339()), ..Default::default() };
        assert!(ThreadFilter::from_query(&q).unwrap().matches(&t, 0, 0));
    }

    #[test]
    fn malformed_input_is_rejected() {
        for q in [
            ThreadListQuery { classroom_id: Some("room-1".into()), ..Default::default() },
            ThreadListQuery { unit_id: Some("12".into()), ..Default::default() },
            ThreadListQuery { status: Some("OPEN".into()), ..Default::default() },
            ThreadListQuery { author_id: Some("bob".into()), ..Default::default() },
            ThreadListQuery { date_to: Some("yesterday".into()), ..Default::default() },
        ] {
            assert!(matches!(ThreadFilter::from_query(&q), Err(ApiError::Validation(_))), "{q:?}");
        }
    }

    #[test]
    fn sort_aliases_resolve() {
        let d = ThreadSort::THREADS_DEFAULT;
        assert_eq!(ThreadSort::resolve(None, None, d), d);
        assert_eq!(ThreadSort::resolve(Some("mostReplied"), None, d).key, SortKey::RepliesCount);
        assert_eq!(ThreadSort::resolve(Some("mostLiked"), None, d).key, SortKey::LikesCount);
        assert_eq!(
            ThreadSort::resolve(Some("alphabetical"), None, d),
            ThreadSort { key: SortKey::Title, order: SortOrder::Asc }
        );
        assert_eq!(
            ThreadSort::resolve(Some("mostRecent"), None, d),
            ThreadSort { key: SortKey::UpdatedAt, order: SortOrder::Desc }
        );
        assert_eq!(ThreadSort::resolve(Some("newest"), Some("ASC"), d).order, SortOrder::Asc);
        assert_eq!(ThreadSort::resolve(Some("bogus"), Some("asc"), d), ThreadSort::THREADS_DEFAULT);
        assert_eq!(ThreadSort::resolve(None, Some("sideways"), d), d);
        assert_eq!(
            ThreadSort::resolve(Some("createdAt"), None, ThreadSort::REPLIES_DEFAULT).order,
            SortOrder::Asc
        );
    }

    #[test]
    fn pagination_math() {
        let p = PageRequest::new(None, None);
        assert_eq!((p.page, p.limit, p.offset()), (1, DEFAULT_PAGE_SIZE, 0));
        let p = PageRequest::new(Some(0), Some(1000));
        assert_eq!((p.page, p.limit), (1, MAX_PAGE_SIZE));

        let first = PageRequest::new(Some(1), Some(10)).paginate(10, 15);
        assert!(first.has_next && !first.has_prev);
        assert_eq!(first.total_pages, 2);
        let last = PageRequest::new(Some(2), Some(10)).paginate(5, 15);
        assert!(!last.has_next && last.has_prev);
        let empty = PageRequest::new(None, None).paginate(0, 0);
        assert_eq!((empty.total_pages, empty.has_next), (0, false));
    }
}
