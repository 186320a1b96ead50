//! Discussion operations: threads, replies, likes and the accepted-answer
//! workflow, on top of the repository traits.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::access::AccessGuard;
use crate::auth::Identity;
use crate::error::{ApiError, ApiResult};
use crate::models::*;
use crate::query::{PageQuery, PageRequest, ThreadFilter, ThreadListQuery, ThreadSort};
use crate::repo::{Repo, RepoError, RepoResult, ThreadDraft};

#[derive(Clone)]
pub struct ForumService {
    repo: Arc<dyn Repo>,
    guard: AccessGuard,
    store_timeout: Duration,
}

fn required_text(value: Option<String>, field: &str) -> ApiResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::validation(format!("{field} is required"))),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Replace the generic 404 message with the entity that was missing.
fn missing(what: &'static str) -> impl FnOnce(ApiError) -> ApiError {
    move |e| match e {
        ApiError::NotFound(_) => ApiError::not_found(format!("{what} not found")),
        other => other,
    }
}

impl ForumService {
    pub fn new<R: Repo + 'static>(repo: Arc<R>, store_timeout: Duration) -> Self {
        let guard = AccessGuard::new(repo.clone());
        Self { repo, guard, store_timeout }
    }

    /// Bound a store round-trip by the configured timeout and log failures
    /// under the caller's span.
    async fn store<T>(&self, op: &'static str, fut: impl Future<Output = RepoResult<T>>) -> ApiResult<T> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => {
                match &e {
                    RepoError::Internal(msg) => error!(op, error = %msg, "store operation failed"),
                    RepoError::Conflict => warn!(op, "store reported a conflict"),
                    RepoError::NotFound | RepoError::Forbidden => debug!(op, error = %e, "store rejected operation"),
                }
                Err(e.into())
            }
            Err(_) => {
                error!(op, timeout_ms = self.store_timeout.as_millis() as u64, "store operation timed out");
                Err(ApiError::Timeout)
            }
        }
    }

    async fn ensure_member(&self, user_id: Id, classroom_id: Id) -> ApiResult<()> {
        let member = self
            .store("check_classroom_membership", self.guard.check_classroom_membership(user_id, classroom_id))
            .await?;
        if member {
            Ok(())
        } else {
            Err(ApiError::forbidden("not a member of this classroom"))
        }
    }

    #[instrument(skip_all, fields(author_id = %author.id))]
    pub async fn create_thread(&self, author: Identity, new: NewThread) -> ApiResult<Thread> {
        let content = required_text(new.content, "content")?;
        let title = non_blank(new.title);
        // a unit pins the thread to the unit's classroom
        let mut classroom_id = new.classroom_id;
        if let Some(unit_id) = new.unit_id {
            let unit = self.store("get_unit", self.repo.get_unit(unit_id)).await.map_err(missing("unit"))?;
            match classroom_id {
                Some(id) if id != unit.classroom_id => {
                    return Err(ApiError::validation("unit does not belong to this classroom"));
                }
                _ => classroom_id = Some(unit.classroom_id),
            }
        }
        if let Some(classroom_id) = classroom_id {
            self.store("get_classroom", self.repo.get_classroom(classroom_id))
                .await
                .map_err(missing("classroom"))?;
            self.ensure_member(author.id, classroom_id).await?;
        }
        let draft = ThreadDraft {
            author_id: author.id,
            title,
            content,
            classroom_id,
            unit_id: new.unit_id,
        };
        let thread = self.store("create_thread", self.repo.create_thread(draft)).await?;
        info!(thread_id = %thread.id, "thread created");
        Ok(thread)
    }

    #[instrument(skip_all, fields(parent_id = %parent_id, author_id = %author.id))]
    pub async fn create_reply(&self, parent_id: Id, author: Identity, new: NewReply) -> ApiResult<Thread> {
        let content = required_text(new.content, "content")?;
        let parent = self
            .store("get_thread", self.repo.get_thread(parent_id))
            .await
            .map_err(missing("thread"))?;
        if parent.is_reply() {
            return Err(ApiError::not_found("thread not found"));
        }
        if let Some(classroom_id) = parent.classroom_id {
            self.ensure_member(author.id, classroom_id).await?;
        }
        let reply = self
            .store("create_reply", self.repo.create_reply(parent_id, content, author.id))
            .await
            .map_err(missing("thread"))?;
        info!(reply_id = %reply.id, "reply created");
        Ok(reply)
    }

    pub async fn get_thread_by_id(&self, id: Id) -> ApiResult<Option<Thread>> {
        match self.store("get_thread", self.repo.get_thread(id)).await {
            Ok(t) => Ok(Some(t)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Change title and/or content. Only the author may edit; replies never
    /// carry a title.
    #[instrument(skip_all, fields(thread_id = %id, requester = %requester))]
    pub async fn update_thread_or_comment(&self, id: Id, requester: Id, mut upd: UpdateThread) -> ApiResult<Thread> {
        upd.title = non_blank(upd.title);
        if upd.is_empty() {
            return Err(ApiError::validation("title or content is required"));
        }
        if matches!(&upd.content, Some(c) if c.trim().is_empty()) {
            return Err(ApiError::validation("content must not be empty"));
        }
        let current = self.get_thread_by_id(id).await?.ok_or_else(|| ApiError::not_found("thread not found"))?;
        if current.author_id != requester {
            return Err(ApiError::forbidden("only the author may edit this post"));
        }
        if current.is_reply() && upd.title.is_some() {
            return Err(ApiError::validation("replies cannot have a title"));
        }
        // the store re-checks ownership on the locked row
        let updated = self
            .store("update_thread", self.repo.update_thread(id, requester, upd))
            .await
            .map_err(missing("thread"))?;
        info!("thread updated");
        Ok(updated)
    }

    #[instrument(skip_all, fields(thread_id = %id, requester = %requester))]
    pub async fn delete_thread_or_comment(&self, id: Id, requester: Id) -> ApiResult<()> {
        let removed = self
            .store("delete_thread", self.repo.delete_thread(id, requester))
            .await
            .map_err(|e| match e {
                ApiError::Forbidden(_) => ApiError::forbidden("only the author may delete this post"),
                other => missing("thread")(other),
            })?;
        info!(removed, "thread deleted with its replies and likes");
        Ok(())
    }

    /// Accept `reply_id` as the answer to `thread_id`, or unmark it when it is
    /// already the accepted one. `None` means `thread_id` is not a main
    /// thread. The caller is responsible for checking that the requester owns
    /// the thread.
    #[instrument(skip_all, fields(thread_id = %thread_id, reply_id = %reply_id))]
    pub async fn accept_answer(&self, thread_id: Id, reply_id: Id) -> ApiResult<Option<Thread>> {
        let Some(thread) = self.get_thread_by_id(thread_id).await? else {
            return Ok(None);
        };
        if thread.is_reply() {
            return Ok(None);
        }
        let reply = self
            .store("get_thread", self.repo.get_thread(reply_id))
            .await
            .map_err(missing("reply"))?;
        if reply.parent_id != Some(thread.id) {
            return Err(ApiError::validation("reply does not belong to this thread"));
        }
        let next = if thread.accepted_answer_id == Some(reply_id) { None } else { Some(reply_id) };
        let updated = self
            .store("set_accepted_answer", self.repo.set_accepted_answer(thread.id, thread.accepted_answer_id, next))
            .await
            .map_err(|e| match e {
                ApiError::Conflict(_) => ApiError::Conflict("accepted answer changed concurrently".into()),
                other => missing("thread")(other),
            })?;
        info!(status = ?updated.status, "accepted answer {}", if next.is_some() { "set" } else { "cleared" });
        Ok(Some(updated))
    }

    /// Filtered, sorted page of top-level threads.
    #[instrument(skip_all, fields(requester = %requester.id))]
    pub async fn get_threads(&self, requester: Identity, q: &ThreadListQuery) -> ApiResult<ThreadPage> {
        let filter = ThreadFilter::from_query(q)?;
        let sort = ThreadSort::resolve(q.sort_by.as_deref(), q.sort_order.as_deref(), ThreadSort::THREADS_DEFAULT);
        let page = PageRequest::new(q.page, q.limit);
        if let Some(classroom_id) = filter.classroom_id() {
            self.ensure_member(requester.id, classroom_id).await?;
        }
        self.page_threads(&filter, sort, page, requester.id).await
    }

    /// Threads of one unit, for members of the unit's classroom only.
    #[instrument(skip_all, fields(unit_id = %unit_id, requester = %requester.id))]
    pub async fn get_threads_by_unit_with_access(&self, unit_id: Id, requester: Identity, q: &PageQuery) -> ApiResult<ThreadPage> {
        let unit = self.store("get_unit", self.repo.get_unit(unit_id)).await.map_err(missing("unit"))?;
        let classroom = self
            .store("get_classroom", self.repo.get_classroom(unit.classroom_id))
            .await
            .map_err(missing("classroom"))?;
        self.ensure_member(requester.id, classroom.id).await?;
        let sort = ThreadSort::resolve(q.sort_by.as_deref(), q.sort_order.as_deref(), ThreadSort::THREADS_DEFAULT);
        let page = PageRequest::new(q.page, q.limit);
        self.page_threads(&ThreadFilter::for_unit(unit.id), sort, page, requester.id).await
    }

    async fn page_threads(&self, filter: &ThreadFilter, sort: ThreadSort, page: PageRequest, viewer: Id) -> ApiResult<ThreadPage> {
        let (threads, total) = self
            .store("list_threads", self.repo.list_threads(filter, sort, page, Some(viewer)))
            .await?;
        let pagination = page.paginate(threads.len(), total);
        Ok(ThreadPage { threads, pagination })
    }

    /// Thread header plus one page of its replies; `None` when the id is
    /// unknown or names a reply.
    #[instrument(skip_all, fields(thread_id = %thread_id))]
    pub async fn get_thread_with_replies(&self, thread_id: Id, viewer: Option<Id>, q: &PageQuery) -> ApiResult<Option<ThreadDetail>> {
        let header = match self.store("summarize_thread", self.repo.summarize_thread(thread_id, viewer)).await {
            Ok(h) if !h.thread.is_reply() => h,
            Ok(_) | Err(ApiError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let sort = ThreadSort::resolve(q.sort_by.as_deref(), q.sort_order.as_deref(), ThreadSort::REPLIES_DEFAULT);
        let page = PageRequest::new(q.page, q.limit);
        let (rows, total) = self
            .store("list_replies", self.repo.list_replies(thread_id, sort, page, viewer))
            .await?;
        let pagination = page.paginate(rows.len(), total);
        let accepted = header.thread.accepted_answer_id;
        let replies = rows
            .into_iter()
            .map(|reply| ReplyView { is_accepted: Some(reply.thread.id) == accepted, reply })
            .collect();
        Ok(Some(ThreadDetail { thread: header, replies, pagination }))
    }

    #[instrument(skip_all, fields(subject_id = %subject_id, requester = %requester))]
    pub async fn toggle_like(&self, subject_id: Id, requester: Id) -> ApiResult<LikeToggle> {
        let subject = self
            .store("get_thread", self.repo.get_thread(subject_id))
            .await
            .map_err(missing("thread or reply"))?;
        if let Some(classroom_id) = subject.classroom_id {
            self.ensure_member(requester, classroom_id).await?;
        }
        let like = self
            .store("toggle_like", self.repo.toggle_like(subject_id, requester))
            .await
            .map_err(missing("thread or reply"))?;
        debug!(liked = like.is_liked, "like toggled");
        Ok(LikeToggle { subject_id: like.subject_id, user_id: like.user_id, liked: like.is_liked })
    }
}
