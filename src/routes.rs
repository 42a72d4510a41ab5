use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::ApiError;
use crate::models::*;
use crate::page::PageRequest;
use crate::repo::Repo;
use crate::service::{BoardService, ReplyService};

pub fn config(cfg: &mut web::ServiceConfig) {
    // malformed input is reported in the same JSON shape as every other error
    cfg.app_data(
        web::JsonConfig::default().error_handler(|e, _req| ApiError::BadRequest(e.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default().error_handler(|e, _req| ApiError::BadRequest(e.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default().error_handler(|e, _req| ApiError::BadRequest(e.to_string()).into()),
    )
    .service(
        web::scope("/api/v1")
            .service(
                web::resource("/boards")
                    .route(web::get().to(list_boards))
                    .route(web::post().to(register_board)),
            )
            // must precede /boards/{bno}
            .service(web::resource("/boards/search").route(web::get().to(search_boards)))
            .service(
                web::resource("/boards/{bno}")
                    .route(web::get().to(read_board))
                    .route(web::put().to(modify_board))
                    .route(web::delete().to(remove_board)),
            )
            .service(web::resource("/replies").route(web::post().to(create_reply)))
            .service(web::resource("/replies/list/{bno}").route(web::get().to(list_replies)))
            .service(
                web::resource("/replies/{rno}")
                    .route(web::get().to(read_reply))
                    .route(web::put().to(modify_reply))
                    .route(web::delete().to(remove_reply)),
            ),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub boards: BoardService,
    pub replies: ReplyService,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self {
            boards: BoardService::new(repo.clone()),
            replies: ReplyService::new(repo),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/boards",
    tag = "boards",
    params(
        ("page" = Option<i64>, Query, description = "1-based page number (default 1)"),
        ("size" = Option<i64>, Query, description = "Page size (default 10)"),
        ("type" = Option<String>, Query, description = "Search type codes: t(itle), c(ontent), w(riter)"),
        ("keyword" = Option<String>, Query, description = "Case-sensitive substring to search for"),
        ("sort" = Option<String>, Query, description = "Sort field (default bno)"),
        ("desc" = Option<bool>, Query, description = "Descending order (default true)")
    ),
    responses(
        (status = 200, description = "Boards with reply counts", body = BoardListPage),
        (status = 400, description = "Invalid page or sort field")
    )
)]
pub async fn list_boards(data: web::Data<AppState>, query: web::Query<PageRequest>) -> Result<HttpResponse, ApiError> {
    let resp = data.boards.search_with_reply_count(&query).await?;
    Ok(HttpResponse::Ok().json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/boards/search",
    tag = "boards",
    params(
        ("page" = Option<i64>, Query, description = "1-based page number (default 1)"),
        ("size" = Option<i64>, Query, description = "Page size (default 10)"),
        ("type" = Option<String>, Query, description = "Search type codes: t(itle), c(ontent), w(riter)"),
        ("keyword" = Option<String>, Query, description = "Case-sensitive substring to search for"),
        ("sort" = Option<String>, Query, description = "Sort field (default bno)"),
        ("desc" = Option<bool>, Query, description = "Descending order (default true)")
    ),
    responses(
        (status = 200, description = "Boards", body = BoardPage),
        (status = 400, description = "Invalid page or sort field")
    )
)]
pub async fn search_boards(data: web::Data<AppState>, query: web::Query<PageRequest>) -> Result<HttpResponse, ApiError> {
    let resp = data.boards.search(&query).await?;
    Ok(HttpResponse::Ok().json(resp))
}

#[utoipa::path(
    post,
    path = "/api/v1/boards",
    tag = "boards",
    request_body = NewBoard,
    responses(
        (status = 201, description = "Board registered"),
        (status = 400, description = "Missing or oversized field")
    )
)]
pub async fn register_board(data: web::Data<AppState>, payload: web::Json<NewBoard>) -> Result<HttpResponse, ApiError> {
    let bno = data.boards.register(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({ "bno": bno })))
}

#[utoipa::path(
    get,
    path = "/api/v1/boards/{bno}",
    tag = "boards",
    params(("bno" = Id, Path, description = "Board number")),
    responses(
        (status = 200, description = "Board", body = Board),
        (status = 404, description = "Board not found")
    )
)]
pub async fn read_board(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let board = data.boards.read(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(board))
}

#[utoipa::path(
    put,
    path = "/api/v1/boards/{bno}",
    tag = "boards",
    request_body = UpdateBoard,
    params(("bno" = Id, Path, description = "Board number")),
    responses(
        (status = 200, description = "Board modified"),
        (status = 400, description = "Empty or oversized field"),
        (status = 404, description = "Board not found")
    )
)]
pub async fn modify_board(
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateBoard>,
) -> Result<HttpResponse, ApiError> {
    let board = data.boards.modify(path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "bno": board.bno })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/boards/{bno}",
    tag = "boards",
    params(("bno" = Id, Path, description = "Board number")),
    responses(
        (status = 200, description = "Board removed"),
        (status = 404, description = "Board not found"),
        (status = 409, description = "Board still has replies")
    )
)]
pub async fn remove_board(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let bno = path.into_inner();
    data.boards.remove(bno).await?;
    Ok(HttpResponse::Ok().json(json!({ "bno": bno })))
}

#[utoipa::path(
    post,
    path = "/api/v1/replies",
    tag = "replies",
    request_body = NewReply,
    responses(
        (status = 201, description = "Reply registered"),
        (status = 400, description = "Missing reply text or replyer"),
        (status = 409, description = "Board does not exist")
    )
)]
pub async fn create_reply(data: web::Data<AppState>, payload: web::Json<NewReply>) -> Result<HttpResponse, ApiError> {
    let rno = data.replies.create_reply(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({ "rno": rno })))
}

#[utoipa::path(
    get,
    path = "/api/v1/replies/list/{bno}",
    tag = "replies",
    params(
        ("bno" = Id, Path, description = "Board number"),
        ("page" = Option<i64>, Query, description = "1-based page number (default 1)"),
        ("size" = Option<i64>, Query, description = "Page size (default 10)")
    ),
    responses(
        (status = 200, description = "Replies of the board, oldest first", body = ReplyPage),
        (status = 400, description = "Invalid page")
    )
)]
pub async fn list_replies(
    data: web::Data<AppState>,
    path: web::Path<Id>,
    query: web::Query<PageRequest>,
) -> Result<HttpResponse, ApiError> {
    let resp = data.replies.list_replies(path.into_inner(), &query).await?;
    Ok(HttpResponse::Ok().json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/replies/{rno}",
    tag = "replies",
    params(("rno" = Id, Path, description = "Reply number")),
    responses(
        (status = 200, description = "Reply", body = Reply),
        (status = 404, description = "Reply not found")
    )
)]
pub async fn read_reply(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let reply = data.replies.read_reply(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reply))
}

#[utoipa::path(
    put,
    path = "/api/v1/replies/{rno}",
    tag = "replies",
    request_body = UpdateReply,
    params(("rno" = Id, Path, description = "Reply number")),
    responses(
        (status = 200, description = "Reply modified"),
        (status = 400, description = "Empty reply text"),
        (status = 404, description = "Reply not found")
    )
)]
pub async fn modify_reply(
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateReply>,
) -> Result<HttpResponse, ApiError> {
    let reply = data.replies.update_reply(path.into_inner(), payload.into_inner().reply_text).await?;
    Ok(HttpResponse::Ok().json(json!({ "rno": reply.rno })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/replies/{rno}",
    tag = "replies",
    params(("rno" = Id, Path, description = "Reply number")),
    responses(
        (status = 200, description = "Reply removed"),
        (status = 404, description = "Reply not found")
    )
)]
pub async fn remove_reply(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let rno = path.into_inner();
    data.replies.delete_reply(rno).await?;
    Ok(HttpResponse::Ok().json(json!({ "rno": rno })))
}
