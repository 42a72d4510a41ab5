use crate::models::{Board, BoardListItem, NewBoard, NewReply, Reply, UpdateBoard, UpdateReply};
use crate::page::{BoardListPage, BoardPage, ReplyPage};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_boards,
        crate::routes::search_boards,
        crate::routes::register_board,
        crate::routes::read_board,
        crate::routes::modify_board,
        crate::routes::remove_board,
        crate::routes::create_reply,
        crate::routes::list_replies,
        crate::routes::read_reply,
        crate::routes::modify_reply,
        crate::routes::remove_reply,
    ),
    components(schemas(
        Board, NewBoard, UpdateBoard, BoardListItem,
        Reply, NewReply, UpdateReply,
        BoardPage, BoardListPage, ReplyPage,
        crate::error::ApiErrorBody
    )),
    tags(
        (name = "boards", description = "Board operations"),
        (name = "replies", description = "Reply operations"),
    )
)]
pub struct ApiDoc;
