use crate::models::{
    AcceptAnswerResponse, LikeToggle, NewReply, NewThread, Pagination, ReplyView, Thread, ThreadDetail, ThreadPage,
    ThreadStatus, ThreadSummary, UpdateThread,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_threads,
        crate::routes::create_thread,
        crate::routes::list_unit_threads,
        crate::routes::get_thread,
        crate::routes::update_thread,
        crate::routes::delete_thread,
        crate::routes::create_reply,
        crate::routes::toggle_like,
        crate::routes::accept_answer,
    ),
    components(schemas(
        Thread, ThreadStatus, NewThread, NewReply, UpdateThread,
        ThreadSummary, ReplyView, Pagination, ThreadPage, ThreadDetail,
        LikeToggle, AcceptAnswerResponse, crate::error::ApiErrorBody
    )),
    tags(
        (name = "threads", description = "Discussion threads"),
        (name = "replies", description = "Replies and accepted answers"),
    )
)]
pub struct ApiDoc;
