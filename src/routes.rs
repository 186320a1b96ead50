use actix_web::{web, HttpResponse};

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::*;
use crate::query::{parse_id, PageQuery, ThreadListQuery};
use crate::service::ForumService;

pub fn config(cfg: &mut web::ServiceConfig) {
    // malformed query strings and bodies use the same JSON error shape
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _| ApiError::validation(err.to_string()).into()))
        .app_data(web::JsonConfig::default().error_handler(|err, _| ApiError::validation(err.to_string()).into()));
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/threads")
                    .route(web::get().to(list_threads))
                    .route(web::post().to(create_thread)),
            )
            .service(
                web::resource("/threads/{id}")
                    .route(web::get().to(get_thread))
                    .route(web::put().to(update_thread))
                    .route(web::delete().to(delete_thread)),
            )
            .service(web::resource("/threads/{id}/replies").route(web::post().to(create_reply)))
            .service(web::resource("/threads/{id}/like").route(web::post().to(toggle_like)))
            .service(web::resource("/replies/{id}/like").route(web::post().to(toggle_like)))
            .service(
                web::resource("/threads/{thread_id}/accept/{reply_id}")
                    .route(web::patch().to(accept_answer)),
            )
            .service(web::resource("/units/{unit_id}/threads").route(web::get().to(list_unit_threads))),
    );
    cfg.route("/health", web::get().to(health));
}

#[derive(Clone)]
pub struct AppState { pub service: ForumService }

#[utoipa::path(
    post,
    path = "/api/v1/threads",
    request_body = NewThread,
    responses(
        (status = 201, description = "Thread created", body = Thread),
        (status = 400, description = "Missing content, or unit outside the classroom"),
        (status = 403, description = "Not a member of the classroom"),
        (status = 404, description = "Classroom or unit not found")
    )
)]
pub async fn create_thread(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewThread>,
) -> Result<HttpResponse, ApiError> {
    let thread = data.service.create_thread(auth.0, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(thread))
}

#[utoipa::path(
    get,
    path = "/api/v1/threads",
    params(ThreadListQuery),
    responses(
        (status = 200, description = "Page of top-level threads", body = ThreadPage),
        (status = 400, description = "Malformed filter"),
        (status = 403, description = "Not a member of the classroom")
    )
)]
pub async fn list_threads(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<ThreadListQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = data.service.get_threads(auth.0, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/units/{unit_id}/threads",
    params(("unit_id" = String, Path, description = "Unit id"), PageQuery),
    responses(
        (status = 200, description = "Page of the unit's threads", body = ThreadPage),
        (status = 403, description = "Not a member of the unit's classroom"),
        (status = 404, description = "Unit or classroom not found")
    )
)]
pub async fn list_unit_threads(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let unit_id = parse_id(&path, "unitId")?;
    let page = data.service.get_threads_by_unit_with_access(unit_id, auth.0, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/threads/{id}",
    params(("id" = String, Path, description = "Thread id"), PageQuery),
    responses(
        (status = 200, description = "Thread with a page of replies", body = ThreadDetail),
        (status = 404, description = "Thread not found")
    )
)]
pub async fn get_thread(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path, "id")?;
    let viewer = auth.map(|a| a.0.id);
    let detail = data
        .service
        .get_thread_with_replies(id, viewer, &query)
        .await?
        .ok_or_else(|| ApiError::not_found("thread not found"))?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    put,
    path = "/api/v1/threads/{id}",
    request_body = UpdateThread,
    params(("id" = String, Path, description = "Thread or reply id")),
    responses(
        (status = 200, description = "Updated", body = Thread),
        (status = 400, description = "Nothing to update"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_thread(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateThread>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path, "id")?;
    let thread = data.service.update_thread_or_comment(id, auth.0.id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(thread))
}

#[utoipa::path(
    delete,
    path = "/api/v1/threads/{id}",
    params(("id" = String, Path, description = "Thread or reply id")),
    responses(
        (status = 200, description = "Deleted with replies and likes"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_thread(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path, "id")?;
    data.service.delete_thread_or_comment(id, auth.0.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "ok", "id": id})))
}

#[utoipa::path(
    post,
    path = "/api/v1/threads/{id}/replies",
    request_body = NewReply,
    params(("id" = String, Path, description = "Parent thread id")),
    responses(
        (status = 201, description = "Reply created", body = Thread),
        (status = 400, description = "Missing content"),
        (status = 404, description = "Thread not found")
    )
)]
pub async fn create_reply(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<NewReply>,
) -> Result<HttpResponse, ApiError> {
    let parent_id = parse_id(&path, "id")?;
    let reply = data.service.create_reply(parent_id, auth.0, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(reply))
}

#[utoipa::path(
    post,
    path = "/api/v1/threads/{id}/like",
    params(("id" = String, Path, description = "Thread or reply id")),
    responses(
        (status = 200, description = "Like toggled", body = LikeToggle),
        (status = 403, description = "Not a member of the subject's classroom"),
        (status = 404, description = "Not found")
    )
)]
pub async fn toggle_like(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let subject_id = parse_id(&path, "id")?;
    let toggled = data.service.toggle_like(subject_id, auth.0.id).await?;
    Ok(HttpResponse::Ok().json(toggled))
}

#[utoipa::path(
    patch,
    path = "/api/v1/threads/{thread_id}/accept/{reply_id}",
    params(
        ("thread_id" = String, Path, description = "Top-level thread id"),
        ("reply_id" = String, Path, description = "Reply to accept or unmark")
    ),
    responses(
        (status = 200, description = "Accepted answer set or cleared", body = AcceptAnswerResponse),
        (status = 400, description = "Not a main thread, or reply belongs elsewhere"),
        (status = 403, description = "Not the thread owner"),
        (status = 409, description = "Accepted answer changed concurrently")
    )
)]
pub async fn accept_answer(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (thread_raw, reply_raw) = path.into_inner();
    let thread_id = parse_id(&thread_raw, "threadId")?;
    let reply_id = parse_id(&reply_raw, "replyId")?;
    // only the thread owner may accept
    let thread = data.service.get_thread_by_id(thread_id).await?.ok_or(ApiError::NotMainThread)?;
    if thread.is_reply() {
        return Err(ApiError::NotMainThread);
    }
    if thread.author_id != auth.0.id {
        return Err(ApiError::forbidden("only the thread owner may accept an answer"));
    }
    let updated = data.service.accept_answer(thread_id, reply_id).await?.ok_or(ApiError::NotMainThread)?;
    Ok(HttpResponse::Ok().json(AcceptAnswerResponse {
        thread_id: updated.id,
        accepted_answer_id: updated.accepted_answer_id,
        status: updated.status,
    }))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}
