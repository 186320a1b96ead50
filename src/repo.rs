use async_trait::async_trait;

use crate::models::*;
use crate::query::{PageRequest, ThreadFilter, ThreadSort};

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("forbidden")] Forbidden,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(ref db) => match db.code().as_deref() {
                Some("23505") => RepoError::Conflict,
                // foreign key: the referenced subject is gone
                Some("23503") => RepoError::NotFound,
                _ => RepoError::Internal(e.to_string()),
            },
            other => RepoError::Internal(other.to_string()),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Listing result: the requested page plus the total row count observed in
/// the same snapshot.
pub type Page<T> = (Vec<T>, i64);

#[derive(Debug, Clone)]
pub struct ThreadDraft {
    pub author_id: Id,
    pub title: Option<String>,
    pub content: String,
    pub classroom_id: Option<Id>,
    pub unit_id: Option<Id>,
}

#[async_trait]
pub trait ThreadRepo: Send + Sync {
    async fn create_thread(&self, draft: ThreadDraft) -> RepoResult<Thread>;
    /// NotFound unless `parent_id` is an existing top-level thread.
    async fn create_reply(&self, parent_id: Id, content: String, author_id: Id) -> RepoResult<Thread>;
    async fn get_thread(&self, id: Id) -> RepoResult<Thread>;
    /// Ownership is checked against the row locked for the update.
    async fn update_thread(&self, id: Id, requester: Id, upd: UpdateThread) -> RepoResult<Thread>;
    /// Removes the post, its replies and every like on any of them.
    /// Returns the number of thread rows removed.
    async fn delete_thread(&self, id: Id, requester: Id) -> RepoResult<u64>;
    /// Compare-and-set of the accepted answer; Conflict when the stored value
    /// is no longer `expected`.
    async fn set_accepted_answer(&self, thread_id: Id, expected: Option<Id>, accepted: Option<Id>) -> RepoResult<Thread>;
    async fn list_threads(&self, filter: &ThreadFilter, sort: ThreadSort, page: PageRequest, viewer: Option<Id>) -> RepoResult<Page<ThreadSummary>>;
    async fn list_replies(&self, thread_id: Id, sort: ThreadSort, page: PageRequest, viewer: Option<Id>) -> RepoResult<Page<ThreadSummary>>;
    async fn summarize_thread(&self, id: Id, viewer: Option<Id>) -> RepoResult<ThreadSummary>;
}

#[async_trait]
pub trait LikeRepo: Send + Sync {
    /// Creates the row liked, or flips an existing one. Atomic per
    /// (subject, user).
    async fn toggle_like(&self, subject_id: Id, user_id: Id) -> RepoResult<Like>;
    async fn find_like(&self, subject_id: Id, user_id: Id) -> RepoResult<Option<Like>>;
    async fn delete_like(&self, subject_id: Id, user_id: Id) -> RepoResult<bool>;
}

/// Read access to the classroom resources this service does not own.
#[async_trait]
pub trait DirectoryRepo: Send + Sync {
    async fn get_unit(&self, unit_id: Id) -> RepoResult<Unit>;
    async fn get_classroom(&self, classroom_id: Id) -> RepoResult<Classroom>;
    async fn find_enrollment(&self, user_id: Id, classroom_id: Id) -> RepoResult<Option<Enrollment>>;
    async fn find_faculty_profile(&self, user_id: Id) -> RepoResult<Option<FacultyProfile>>;
}

pub trait Repo: ThreadRepo + LikeRepo + DirectoryRepo {}

impl<T> Repo for T where T: ThreadRepo + LikeRepo + DirectoryRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct State {
        threads: HashMap<Id, Thread>,
        likes: HashMap<(Id, Id), Like>,
        units: HashMap<Id, Unit>,
        classrooms: HashMap<Id, Classroom>,
        faculty_by_user: HashMap<Id, FacultyProfile>,
        enrollments: HashSet<(Id, Id)>,
        last_ts: Option<DateTime<Utc>>,
    }

    impl State {
        // strictly increasing, microsecond precision like Postgres
        fn now(&mut self) -> DateTime<Utc> {
            let mut ts = Utc::now();
            if let Some(last) = self.last_ts {
                if ts <= last {
                    ts = last + Duration::microseconds(1);
                }
            }
            self.last_ts = Some(ts);
            ts
        }

        fn replies_count(&self, id: Id) -> i64 {
            self.threads.values().filter(|t| t.parent_id == Some(id)).count() as i64
        }

        fn likes_count(&self, id: Id) -> i64 {
            self.likes.values().filter(|l| l.subject_id == id && l.is_liked).count() as i64
        }

        fn summarize(&self, t: &Thread, viewer: Option<Id>) -> ThreadSummary {
            let is_liked_by_me = viewer
                .and_then(|u| self.likes.get(&(t.id, u)))
                .map_or(false, |l| l.is_liked);
            ThreadSummary {
                thread: t.clone(),
                replies_count: self.replies_count(t.id),
                likes_count: self.likes_count(t.id),
                is_liked_by_me,
            }
        }

        fn owned_mut(&mut self, id: Id, requester: Id) -> RepoResult<&mut Thread> {
            let t = self.threads.get_mut(&id).ok_or(RepoError::NotFound)?;
            if t.author_id != requester {
                return Err(RepoError::Forbidden);
            }
            Ok(t)
        }
    }

    fn page_of(mut rows: Vec<ThreadSummary>, sort: ThreadSort, page: PageRequest) -> Page<ThreadSummary> {
        rows.sort_by(|a, b| sort.compare(a, b));
        let total = rows.len() as i64;
        let rows = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        (rows, total)
    }

    /// Single-lock store; every operation holds the lock for its whole
    /// read-modify-write, which gives the same atomicity as the Postgres
    /// transactions.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
    }

    impl InMemRepo {
        pub fn new() -> Self { Self::default() }

        /// Registers a classroom owned by the faculty member with `faculty_user_id`.
        pub async fn add_classroom(&self, faculty_user_id: Id) -> Classroom {
            let mut s = self.state.write().await;
            let profile = s
                .faculty_by_user
                .entry(faculty_user_id)
                .or_insert_with(|| FacultyProfile { id: Id::new_v4(), user_id: faculty_user_id })
                .clone();
            let classroom = Classroom { id: Id::new_v4(), faculty_id: profile.id };
            s.classrooms.insert(classroom.id, classroom.clone());
            classroom
        }

        pub async fn add_unit(&self, classroom_id: Id) -> Unit {
            let unit = Unit { id: Id::new_v4(), classroom_id };
            self.state.write().await.units.insert(unit.id, unit.clone());
            unit
        }

        pub async fn enroll(&self, user_id: Id, classroom_id: Id) {
            self.state.write().await.enrollments.insert((user_id, classroom_id));
        }
    }

    #[async_trait]
    impl ThreadRepo for InMemRepo {
        async fn create_thread(&self, draft: ThreadDraft) -> RepoResult<Thread> {
            let mut s = self.state.write().await;
            let now = s.now();
            let thread = Thread {
                id: Id::new_v4(),
                title: draft.title,
                content: draft.content,
                author_id: draft.author_id,
                classroom_id: draft.classroom_id,
                unit_id: draft.unit_id,
                parent_id: None,
                status: ThreadStatus::Unanswered,
                accepted_answer_id: None,
                created_at: now,
                updated_at: now,
            };
            s.threads.insert(thread.id, thread.clone());
            Ok(thread)
        }

        async fn create_reply(&self, parent_id: Id, content: String, author_id: Id) -> RepoResult<Thread> {
            let mut s = self.state.write().await;
            let parent = s
                .threads
                .get(&parent_id)
                .filter(|p| !p.is_reply())
                .cloned()
                .ok_or(RepoError::NotFound)?;
            let now = s.now();
            let reply = Thread {
                id: Id::new_v4(),
                title: None,
                content,
                author_id,
                classroom_id: parent.classroom_id,
                unit_id: parent.unit_id,
                parent_id: Some(parent.id),
                status: ThreadStatus::Unanswered,
                accepted_answer_id: None,
                created_at: now,
                updated_at: now,
            };
            s.threads.insert(reply.id, reply.clone());
            Ok(reply)
        }

        async fn get_thread(&self, id: Id) -> RepoResult<Thread> {
            let s = self.state.read().await;
            s.threads.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn update_thread(&self, id: Id, requester: Id, upd: UpdateThread) -> RepoResult<Thread> {
            let mut s = self.state.write().await;
            s.owned_mut(id, requester)?;
            let now = s.now();
            let t = s.owned_mut(id, requester)?;
            if let Some(title) = upd.title { t.title = Some(title); }
            if let Some(content) = upd.content { t.content = content; }
            t.updated_at = now;
            Ok(t.clone())
        }

        async fn delete_thread(&self, id: Id, requester: Id) -> RepoResult<u64> {
            let mut s = self.state.write().await;
            let parent_id = s.owned_mut(id, requester)?.parent_id;
            if let Some(pid) = parent_id {
                let now = s.now();
                if let Some(parent) = s.threads.get_mut(&pid) {
                    if parent.accepted_answer_id == Some(id) {
                        parent.accepted_answer_id = None;
                        parent.status = ThreadStatus::Unanswered;
                        parent.updated_at = now;
                    }
                }
            }
            let doomed: HashSet<Id> = s
                .threads
                .values()
                .filter(|t| t.id == id || t.parent_id == Some(id))
                .map(|t| t.id)
                .collect();
            s.likes.retain(|(subject, _), _| !doomed.contains(subject));
            s.threads.retain(|tid, _| !doomed.contains(tid));
            Ok(doomed.len() as u64)
        }

        async fn set_accepted_answer(&self, thread_id: Id, expected: Option<Id>, accepted: Option<Id>) -> RepoResult<Thread> {
            let mut s = self.state.write().await;
            let now = s.now();
            let t = s
                .threads
                .get_mut(&thread_id)
                .filter(|t| !t.is_reply())
                .ok_or(RepoError::NotFound)?;
            if t.accepted_answer_id != expected {
                return Err(RepoError::Conflict);
            }
            t.accepted_answer_id = accepted;
            t.status = ThreadStatus::for_accepted(accepted);
            t.updated_at = now;
            Ok(t.clone())
        }

        async fn list_threads(&self, filter: &ThreadFilter, sort: ThreadSort, page: PageRequest, viewer: Option<Id>) -> RepoResult<Page<ThreadSummary>> {
            let s = self.state.read().await;
            let rows = s
                .threads
                .values()
                .map(|t| s.summarize(t, viewer))
                .filter(|row| filter.matches(&row.thread, row.replies_count, row.likes_count))
                .collect();
            Ok(page_of(rows, sort, page))
        }

        async fn list_replies(&self, thread_id: Id, sort: ThreadSort, page: PageRequest, viewer: Option<Id>) -> RepoResult<Page<ThreadSummary>> {
            let s = self.state.read().await;
            let rows = s
                .threads
                .values()
                .filter(|t| t.parent_id == Some(thread_id))
                .map(|t| s.summarize(t, viewer))
                .collect();
            Ok(page_of(rows, sort, page))
        }

        async fn summarize_thread(&self, id: Id, viewer: Option<Id>) -> RepoResult<ThreadSummary> {
            let s = self.state.read().await;
            let t = s.threads.get(&id).ok_or(RepoError::NotFound)?;
            Ok(s.summarize(t, viewer))
        }
    }

    #[async_trait]
    impl LikeRepo for InMemRepo {
        async fn toggle_like(&self, subject_id: Id, user_id: Id) -> RepoResult<Like> {
            let mut s = self.state.write().await;
            if !s.threads.contains_key(&subject_id) {
                return Err(RepoError::NotFound);
            }
            let now = s.now();
            let like = s
                .likes
                .entry((subject_id, user_id))
                .and_modify(|l| {
                    l.is_liked = !l.is_liked;
                    l.updated_at = now;
                })
                .or_insert_with(|| Like { subject_id, user_id, is_liked: true, created_at: now, updated_at: now });
            Ok(like.clone())
        }

        async fn find_like(&self, subject_id: Id, user_id: Id) -> RepoResult<Option<Like>> {
            Ok(self.state.read().await.likes.get(&(subject_id, user_id)).cloned())
        }

        async fn delete_like(&self, subject_id: Id, user_id: Id) -> RepoResult<bool> {
            Ok(self.state.write().await.likes.remove(&(subject_id, user_id)).is_some())
        }
    }

    #[async_trait]
    impl DirectoryRepo for InMemRepo {
        async fn get_unit(&self, unit_id: Id) -> RepoResult<Unit> {
            self.state.read().await.units.get(&unit_id).cloned().ok_or(RepoError::NotFound)
        }

        async fn get_classroom(&self, classroom_id: Id) -> RepoResult<Classroom> {
            self.state.read().await.classrooms.get(&classroom_id).cloned().ok_or(RepoError::NotFound)
        }

        async fn find_enrollment(&self, user_id: Id, classroom_id: Id) -> RepoResult<Option<Enrollment>> {
            let s = self.state.read().await;
            Ok(s.enrollments
                .contains(&(user_id, classroom_id))
                .then_some(Enrollment { user_id, classroom_id }))
        }

        async fn find_faculty_profile(&self, user_id: Id) -> RepoResult<Option<FacultyProfile>> {
            Ok(self.state.read().await.faculty_by_user.get(&user_id).cloned())
        }
    }
}

#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use crate::query::{ClassroomScope, SortKey, UnitScope};
    use sqlx::{Pool, Postgres, QueryBuilder};

    const THREAD_COLS: &str = "t.id, t.title, t.content, t.author_id, t.classroom_id, t.unit_id, \
                               t.parent_id, t.status, t.accepted_answer_id, t.created_at, t.updated_at";

    const RETURNING_THREAD: &str = "RETURNING id, title, content, author_id, classroom_id, unit_id, \
                                    parent_id, status, accepted_answer_id, created_at, updated_at";

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }
    }

    /// SELECT list shared by every summary query, with the viewer bound for
    /// the `is_liked_by_me` flag.
    fn summary_select(viewer: Option<Id>) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {THREAD_COLS}, \
             (SELECT COUNT(*) FROM threads r WHERE r.parent_id = t.id) AS replies_count, \
             (SELECT COUNT(*) FROM likes l WHERE l.subject_id = t.id AND l.is_liked) AS likes_count, \
             EXISTS (SELECT 1 FROM likes me WHERE me.subject_id = t.id AND me.is_liked AND me.user_id = "
        ));
        qb.push_bind(viewer);
        qb.push(") AS is_liked_by_me FROM threads t");
        qb
    }

    fn push_filter(qb: &mut QueryBuilder<'static, Postgres>, filter: &ThreadFilter) {
        qb.push(" WHERE t.parent_id IS NULL");
        match filter.classroom {
            ClassroomScope::Any => {}
            ClassroomScope::Global => { qb.push(" AND t.classroom_id IS NULL"); }
            ClassroomScope::Classroom(id) => { qb.push(" AND t.classroom_id = ").push_bind(id); }
        }
        match filter.unit {
            UnitScope::Any => {}
            UnitScope::Unassigned => { qb.push(" AND t.unit_id IS NULL"); }
            UnitScope::Unit(id) => { qb.push(" AND t.unit_id = ").push_bind(id); }
        }
        if let Some(status) = filter.status {
            qb.push(" AND t.status = ").push_bind(status);
        }
        if let Some(author) = filter.author_id {
            qb.push(" AND t.author_id = ").push_bind(author);
        }
        if let Some(from) = filter.date_from {
            qb.push(" AND t.created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.date_to {
            qb.push(" AND t.created_at <= ").push_bind(to);
        }
        if let Some(want) = filter.has_replies {
            qb.push(if want { " AND EXISTS" } else { " AND NOT EXISTS" });
            qb.push(" (SELECT 1 FROM threads r WHERE r.parent_id = t.id)");
        }
        if let Some(want) = filter.has_likes {
            qb.push(if want { " AND EXISTS" } else { " AND NOT EXISTS" });
            qb.push(" (SELECT 1 FROM likes l WHERE l.subject_id = t.id AND l.is_liked)");
        }
    }

    fn push_order_and_page(qb: &mut QueryBuilder<'static, Postgres>, sort: ThreadSort, page: PageRequest) {
        let dir = sort.order.as_sql();
        let key = match sort.key {
            SortKey::CreatedAt => "t.created_at",
            SortKey::UpdatedAt => "t.updated_at",
            SortKey::RepliesCount => "replies_count",
            SortKey::LikesCount => "likes_count",
            SortKey::Title => "LOWER(COALESCE(t.title, t.content))",
        };
        qb.push(format!(" ORDER BY {key} {dir}, t.created_at {dir}, t.id {dir}"));
        qb.push(" LIMIT ").push_bind(i64::from(page.limit));
        qb.push(" OFFSET ").push_bind(page.offset());
    }

    impl PgRepo {
        /// Runs a page query and its count inside one REPEATABLE READ
        /// snapshot so `total` matches the rows returned.
        async fn snapshot_page(
            &self,
            mut rows_q: QueryBuilder<'static, Postgres>,
            mut count_q: QueryBuilder<'static, Postgres>,
        ) -> RepoResult<Page<ThreadSummary>> {
            let mut tx = self.pool.begin().await?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
                .execute(&mut *tx)
                .await?;
            let rows = rows_q.build_query_as::<ThreadSummary>().fetch_all(&mut *tx).await?;
            let total = count_q.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;
            tx.commit().await?;
            Ok((rows, total))
        }
    }

    #[async_trait]
    impl ThreadRepo for PgRepo {
        async fn create_thread(&self, draft: ThreadDraft) -> RepoResult<Thread> {
            let sql = format!(
                "INSERT INTO threads (id, title, content, author_id, classroom_id, unit_id, parent_id, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, NULL, 'UNANSWERED'::thread_status) {RETURNING_THREAD}"
            );
            let rec = sqlx::query_as::<_, Thread>(&sql)
                .bind(Id::new_v4())
                .bind(&draft.title)
                .bind(&draft.content)
                .bind(draft.author_id)
                .bind(draft.classroom_id)
                .bind(draft.unit_id)
                .fetch_one(&self.pool)
                .await?;
            Ok(rec)
        }

        async fn create_reply(&self, parent_id: Id, content: String, author_id: Id) -> RepoResult<Thread> {
            // parent must exist and be top level; no row inserted otherwise
            let sql = format!(
                "INSERT INTO threads (id, title, content, author_id, classroom_id, unit_id, parent_id, status) \
                 SELECT $1, NULL, $2, $3, p.classroom_id, p.unit_id, p.id, 'UNANSWERED'::thread_status \
                 FROM threads p WHERE p.id = $4 AND p.parent_id IS NULL {RETURNING_THREAD}"
            );
            sqlx::query_as::<_, Thread>(&sql)
                .bind(Id::new_v4())
                .bind(&content)
                .bind(author_id)
                .bind(parent_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(RepoError::NotFound)
        }

        async fn get_thread(&self, id: Id) -> RepoResult<Thread> {
            let sql = format!("SELECT {THREAD_COLS} FROM threads t WHERE t.id = $1");
            sqlx::query_as::<_, Thread>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(RepoError::NotFound)
        }

        async fn update_thread(&self, id: Id, requester: Id, upd: UpdateThread) -> RepoResult<Thread> {
            let mut tx = self.pool.begin().await?;
            let author: Option<Id> = sqlx::query_scalar("SELECT author_id FROM threads WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            match author {
                None => return Err(RepoError::NotFound),
                Some(a) if a != requester => return Err(RepoError::Forbidden),
                Some(_) => {}
            }
            let sql = format!(
                "UPDATE threads SET title = COALESCE($2, title), content = COALESCE($3, content), \
                 updated_at = now() WHERE id = $1 {RETURNING_THREAD}"
            );
            let rec = sqlx::query_as::<_, Thread>(&sql)
                .bind(id)
                .bind(&upd.title)
                .bind(&upd.content)
                .fetch_one(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(rec)
        }

        async fn delete_thread(&self, id: Id, requester: Id) -> RepoResult<u64> {
            let mut tx = self.pool.begin().await?;
            let row: Option<(Id, Option<Id>)> =
                sqlx::query_as("SELECT author_id, parent_id FROM threads WHERE id = $1 FOR UPDATE")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let parent_id = match row {
                None => return Err(RepoError::NotFound),
                Some((author, _)) if author != requester => return Err(RepoError::Forbidden),
                Some((_, parent)) => parent,
            };
            if let Some(pid) = parent_id {
                sqlx::query(
                    "UPDATE threads SET accepted_answer_id = NULL, status = 'UNANSWERED'::thread_status, updated_at = now() \
                     WHERE id = $1 AND accepted_answer_id = $2",
                )
                .bind(pid)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            }
            sqlx::query(
                "DELETE FROM likes WHERE subject_id = $1 \
                 OR subject_id IN (SELECT id FROM threads WHERE parent_id = $1)",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
            let replies = sqlx::query("DELETE FROM threads WHERE parent_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            let own = sqlx::query("DELETE FROM threads WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            tx.commit().await?;
            Ok(replies + own)
        }

        async fn set_accepted_answer(&self, thread_id: Id, expected: Option<Id>, accepted: Option<Id>) -> RepoResult<Thread> {
            let sql = format!(
                "UPDATE threads SET accepted_answer_id = $3, status = $4, updated_at = now() \
                 WHERE id = $1 AND parent_id IS NULL AND accepted_answer_id IS NOT DISTINCT FROM $2 \
                 {RETURNING_THREAD}"
            );
            let rec = sqlx::query_as::<_, Thread>(&sql)
                .bind(thread_id)
                .bind(expected)
                .bind(accepted)
                .bind(ThreadStatus::for_accepted(accepted))
                .fetch_optional(&self.pool)
                .await?;
            match rec {
                Some(t) => Ok(t),
                // lost the race, or the thread vanished meanwhile
                None => self.get_thread(thread_id).await.and(Err(RepoError::Conflict)),
            }
        }

        async fn list_threads(&self, filter: &ThreadFilter, sort: ThreadSort, page: PageRequest, viewer: Option<Id>) -> RepoResult<Page<ThreadSummary>> {
            let mut rows_q = summary_select(viewer);
            push_filter(&mut rows_q, filter);
            push_order_and_page(&mut rows_q, sort, page);
            let mut count_q = QueryBuilder::new("SELECT COUNT(*) FROM threads t");
            push_filter(&mut count_q, filter);
            self.snapshot_page(rows_q, count_q).await
        }

        async fn list_replies(&self, thread_id: Id, sort: ThreadSort, page: PageRequest, viewer: Option<Id>) -> RepoResult<Page<ThreadSummary>> {
            let mut rows_q = summary_select(viewer);
            rows_q.push(" WHERE t.parent_id = ").push_bind(thread_id);
            push_order_and_page(&mut rows_q, sort, page);
            let mut count_q = QueryBuilder::new("SELECT COUNT(*) FROM threads t WHERE t.parent_id = ");
            count_q.push_bind(thread_id);
            self.snapshot_page(rows_q, count_q).await
        }

        async fn summarize_thread(&self, id: Id, viewer: Option<Id>) -> RepoResult<ThreadSummary> {
            let mut qb = summary_select(viewer);
            qb.push(" WHERE t.id = ").push_bind(id);
            qb.build_query_as::<ThreadSummary>()
                .fetch_optional(&self.pool)
                .await?
                .ok_or(RepoError::NotFound)
        }
    }

    #[async_trait]
    impl LikeRepo for PgRepo {
        async fn toggle_like(&self, subject_id: Id, user_id: Id) -> RepoResult<Like> {
            // the (subject_id, user_id) primary key serialises concurrent toggles
            let rec = sqlx::query_as::<_, Like>(
                "INSERT INTO likes (subject_id, user_id, is_liked) VALUES ($1, $2, TRUE) \
                 ON CONFLICT (subject_id, user_id) \
                 DO UPDATE SET is_liked = NOT likes.is_liked, updated_at = now() \
                 RETURNING subject_id, user_id, is_liked, created_at, updated_at",
            )
            .bind(subject_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
            Ok(rec)
        }

        async fn find_like(&self, subject_id: Id, user_id: Id) -> RepoResult<Option<Like>> {
            let rec = sqlx::query_as::<_, Like>(
                "SELECT subject_id, user_id, is_liked, created_at, updated_at FROM likes \
                 WHERE subject_id = $1 AND user_id = $2",
            )
            .bind(subject_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(rec)
        }

        async fn delete_like(&self, subject_id: Id, user_id: Id) -> RepoResult<bool> {
            let res = sqlx::query("DELETE FROM likes WHERE subject_id = $1 AND user_id = $2")
                .bind(subject_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok(res.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl DirectoryRepo for PgRepo {
        async fn get_unit(&self, unit_id: Id) -> RepoResult<Unit> {
            sqlx::query_as::<_, Unit>("SELECT id, classroom_id FROM units WHERE id = $1")
                .bind(unit_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(RepoError::NotFound)
        }

        async fn get_classroom(&self, classroom_id: Id) -> RepoResult<Classroom> {
            sqlx::query_as::<_, Classroom>("SELECT id, faculty_id FROM classrooms WHERE id = $1")
                .bind(classroom_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(RepoError::NotFound)
        }

        async fn find_enrollment(&self, user_id: Id, classroom_id: Id) -> RepoResult<Option<Enrollment>> {
            let rec = sqlx::query_as::<_, Enrollment>(
                "SELECT e.user_id, e.classroom_id FROM classroom_enrollments e \
                 JOIN classrooms c ON c.id = e.classroom_id \
                 WHERE e.user_id = $1 AND e.classroom_id = $2",
            )
            .bind(user_id)
            .bind(classroom_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(rec)
        }

        async fn find_faculty_profile(&self, user_id: Id) -> RepoResult<Option<FacultyProfile>> {
            let rec = sqlx::query_as::<_, FacultyProfile>("SELECT id, user_id FROM faculty WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(rec)
        }
    }
}
