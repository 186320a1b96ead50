#![cfg(feature = "inmem-store")]

use classroom_forum::{
    models::{Id, ThreadStatus, UpdateThread},
    query::{PageRequest, ThreadFilter, ThreadListQuery, ThreadSort},
    repo::{inmem::InMemRepo, RepoError, ThreadDraft},
};
// Bring trait method namespaces into scope so calls on InMemRepo resolve.
use classroom_forum::repo::{LikeRepo, ThreadRepo};

fn draft(author_id: Id, title: &str) -> ThreadDraft {
    ThreadDraft {
        author_id,
        title: Some(title.into()),
        content: format!("{title} body"),
        classroom_id: None,
        unit_id: None,
    }
}

#[tokio::test]
async fn reply_inherits_scope_and_rejects_nesting() {
    let r = InMemRepo::new();
    let classroom = r.add_classroom(Id::new_v4()).await;
    let unit = r.add_unit(classroom.id).await;
    let author = Id::new_v4();

    let thread = r
        .create_thread(ThreadDraft {
            classroom_id: Some(classroom.id),
            unit_id: Some(unit.id),
            ..draft(author, "Q")
        })
        .await
        .unwrap();
    assert_eq!(thread.status, ThreadStatus::Unanswered);

    let reply = r.create_reply(thread.id, "answer".into(), Id::new_v4()).await.unwrap();
    assert_eq!(reply.parent_id, Some(thread.id));
    assert_eq!(reply.classroom_id, Some(classroom.id));
    assert_eq!(reply.unit_id, Some(unit.id));
    assert!(reply.title.is_none());

    // replies to replies are not a thing
    let err = r.create_reply(reply.id, "nested".into(), author).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
    let err = r.create_reply(Id::new_v4(), "orphan".into(), author).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
}

#[tokio::test]
async fn like_toggle_flips_persisted_row() {
    let r = InMemRepo::new();
    let user = Id::new_v4();
    let thread = r.create_thread(draft(Id::new_v4(), "Q")).await.unwrap();

    let first = r.toggle_like(thread.id, user).await.unwrap();
    assert!(first.is_liked);
    let second = r.toggle_like(thread.id, user).await.unwrap();
    assert!(!second.is_liked);
    assert_eq!(first.created_at, second.created_at);

    // the row survives unliking
    let row = r.find_like(thread.id, user).await.unwrap().unwrap();
    assert!(!row.is_liked);
    assert!(r.toggle_like(thread.id, user).await.unwrap().is_liked);

    assert!(r.delete_like(thread.id, user).await.unwrap());
    assert!(r.find_like(thread.id, user).await.unwrap().is_none());

    let err = r.toggle_like(Id::new_v4(), user).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
}

#[tokio::test]
async fn delete_cascades_to_replies_and_likes() {
    let r = InMemRepo::new();
    let author = Id::new_v4();
    let fan = Id::new_v4();
    let thread = r.create_thread(draft(author, "Q")).await.unwrap();
    let a1 = r.create_reply(thread.id, "a1".into(), fan).await.unwrap();
    let a2 = r.create_reply(thread.id, "a2".into(), fan).await.unwrap();
    r.toggle_like(thread.id, fan).await.unwrap();
    r.toggle_like(a1.id, author).await.unwrap();

    // only the author may delete
    let err = r.delete_thread(thread.id, fan).await.unwrap_err();
    assert!(matches!(err, RepoError::Forbidden));

    assert_eq!(r.delete_thread(thread.id, author).await.unwrap(), 3);
    for id in [thread.id, a1.id, a2.id] {
        assert!(matches!(r.get_thread(id).await.unwrap_err(), RepoError::NotFound));
    }
    assert!(r.find_like(thread.id, fan).await.unwrap().is_none());
    assert!(r.find_like(a1.id, author).await.unwrap().is_none());
}

#[tokio::test]
async fn accepted_answer_is_compare_and_set() {
    let r = InMemRepo::new();
    let author = Id::new_v4();
    let thread = r.create_thread(draft(author, "Q")).await.unwrap();
    let a1 = r.create_reply(thread.id, "a1".into(), Id::new_v4()).await.unwrap();
    let a2 = r.create_reply(thread.id, "a2".into(), Id::new_v4()).await.unwrap();

    let t = r.set_accepted_answer(thread.id, None, Some(a1.id)).await.unwrap();
    assert_eq!(t.accepted_answer_id, Some(a1.id));
    assert_eq!(t.status, ThreadStatus::Resolved);

    // a writer that still believes nothing is accepted loses
    let err = r.set_accepted_answer(thread.id, None, Some(a2.id)).await.unwrap_err();
    assert!(matches!(err, RepoError::Conflict));

    let t = r.set_accepted_answer(thread.id, Some(a1.id), None).await.unwrap();
    assert_eq!(t.accepted_answer_id, None);
    assert_eq!(t.status, ThreadStatus::Unanswered);

    // replies never carry an accepted answer
    let err = r.set_accepted_answer(a1.id, None, Some(a2.id)).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
}

#[tokio::test]
async fn deleting_accepted_reply_reopens_thread() {
    let r = InMemRepo::new();
    let author = Id::new_v4();
    let helper = Id::new_v4();
    let thread = r.create_thread(draft(author, "Q")).await.unwrap();
    let a1 = r.create_reply(thread.id, "a1".into(), helper).await.unwrap();
    r.set_accepted_answer(thread.id, None, Some(a1.id)).await.unwrap();

    assert_eq!(r.delete_thread(a1.id, helper).await.unwrap(), 1);
    let t = r.get_thread(thread.id).await.unwrap();
    assert_eq!(t.accepted_answer_id, None);
    assert_eq!(t.status, ThreadStatus::Unanswered);
}

#[tokio::test]
async fn update_checks_author() {
    let r = InMemRepo::new();
    let author = Id::new_v4();
    let thread = r.create_thread(draft(author, "Q")).await.unwrap();

    let upd = UpdateThread { title: None, content: Some("edited".into()) };
    let err = r.update_thread(thread.id, Id::new_v4(), upd.clone()).await.unwrap_err();
    assert!(matches!(err, RepoError::Forbidden));

    let t = r.update_thread(thread.id, author, upd).await.unwrap();
    assert_eq!(t.content, "edited");
    assert_eq!(t.title.as_deref(), Some("Q"));
    assert!(t.updated_at > thread.updated_at);
}

#[tokio::test]
async fn listing_counts_and_pages() {
    let r = InMemRepo::new();
    let viewer = Id::new_v4();
    let quiet = r.create_thread(draft(Id::new_v4(), "quiet")).await.unwrap();
    let busy = r.create_thread(draft(Id::new_v4(), "busy")).await.unwrap();
    r.create_reply(busy.id, "one".into(), viewer).await.unwrap();
    r.create_reply(busy.id, "two".into(), viewer).await.unwrap();
    r.toggle_like(busy.id, viewer).await.unwrap();

    let filter = ThreadFilter::from_query(&ThreadListQuery::default()).unwrap();
    let sort = ThreadSort::resolve(Some("mostReplied"), None, ThreadSort::THREADS_DEFAULT);
    let (rows, total) = r
        .list_threads(&filter, sort, PageRequest::new(None, None), Some(viewer))
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(rows[0].thread.id, busy.id);
    assert_eq!(rows[0].replies_count, 2);
    assert_eq!(rows[0].likes_count, 1);
    assert!(rows[0].is_liked_by_me);
    assert_eq!(rows[1].thread.id, quiet.id);
    assert!(!rows[1].is_liked_by_me);

    // unliked rows stop counting
    r.toggle_like(busy.id, viewer).await.unwrap();
    let summary = r.summarize_thread(busy.id, Some(viewer)).await.unwrap();
    assert_eq!(summary.likes_count, 0);
    assert!(!summary.is_liked_by_me);

    let (replies, total) = r
        .list_replies(busy.id, ThreadSort::REPLIES_DEFAULT, PageRequest::new(Some(2), Some(1)), None)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].thread.content, "two");
}
