//! Thin orchestration between the HTTP layer and the query engines:
//! input validation, default ordering and the paged response envelope.

use std::sync::Arc;

use tracing::{debug, info};

use crate::models::*;
use crate::page::{PageRequest, PageResponse, Pageable, Sort};
use crate::repo::{Repo, RepoError, RepoResult};
use crate::search::board_filter;

/// Reject blank values and values longer than `max` characters.
fn require_text(field: &str, value: &str, max: usize) -> RepoResult<()> {
    if value.trim().is_empty() {
        return Err(RepoError::InvalidArgument(format!("{field} must not be empty")));
    }
    if value.chars().count() > max {
        return Err(RepoError::InvalidArgument(format!("{field} must be at most {max} characters")));
    }
    Ok(())
}

#[derive(Clone)]
pub struct BoardService {
    repo: Arc<dyn Repo>,
}

impl BoardService {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo }
    }

    pub async fn register(&self, new: NewBoard) -> RepoResult<Id> {
        require_text("title", &new.title, TITLE_MAX)?;
        require_text("content", &new.content, CONTENT_MAX)?;
        require_text("writer", &new.writer, WRITER_MAX)?;
        let board = self.repo.create_board(new).await?;
        info!(bno = board.bno, "board registered");
        Ok(board.bno)
    }

    pub async fn read(&self, bno: Id) -> RepoResult<Board> {
        self.repo.get_board(bno).await
    }

    pub async fn modify(&self, bno: Id, upd: UpdateBoard) -> RepoResult<Board> {
        if let Some(title) = &upd.title {
            require_text("title", title, TITLE_MAX)?;
        }
        if let Some(content) = &upd.content {
            require_text("content", content, CONTENT_MAX)?;
        }
        let board = self.repo.update_board(bno, upd).await?;
        info!(bno, "board modified");
        Ok(board)
    }

    pub async fn remove(&self, bno: Id) -> RepoResult<()> {
        self.repo.delete_board(bno).await?;
        info!(bno, "board removed");
        Ok(())
    }

    /// Plain board search, newest first unless the request names a sort.
    pub async fn search(&self, req: &PageRequest) -> RepoResult<PageResponse<Board>> {
        let pageable = req.pageable(Sort::desc("bno"))?;
        let filter = board_filter(&req.search_types(), req.keyword());
        debug!(?filter, offset = pageable.offset, limit = pageable.limit, "search boards");
        let page = self.repo.search_boards(&filter, &pageable).await?;
        Ok(PageResponse::new(req, page))
    }

    pub async fn search_with_reply_count(&self, req: &PageRequest) -> RepoResult<PageResponse<BoardListItem>> {
        let pageable = req.pageable(Sort::desc("bno"))?;
        let filter = board_filter(&req.search_types(), req.keyword());
        debug!(?filter, offset = pageable.offset, limit = pageable.limit, "search boards with reply count");
        let page = self.repo.search_boards_with_reply_count(&filter, &pageable).await?;
        Ok(PageResponse::new(req, page))
    }
}

#[derive(Clone)]
pub struct ReplyService {
    repo: Arc<dyn Repo>,
}

impl ReplyService {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo }
    }

    /// Replies of one board in the order they were written. Any sort named
    /// in the request is ignored.
    pub async fn list_replies(&self, board_id: Id, req: &PageRequest) -> RepoResult<PageResponse<Reply>> {
        let pageable = Pageable::of(req.page, req.size, Sort::asc("rno"))?;
        let page = self.repo.list_replies(board_id, &pageable).await?;
        Ok(PageResponse::new(req, page))
    }

    pub async fn create_reply(&self, new: NewReply) -> RepoResult<Id> {
        require_text("reply_text", &new.reply_text, usize::MAX)?;
        require_text("replyer", &new.replyer, REPLYER_MAX)?;
        let reply = self.repo.create_reply(new).await?;
        info!(rno = reply.rno, board_id = reply.board_id, "reply registered");
        Ok(reply.rno)
    }

    pub async fn read_reply(&self, rno: Id) -> RepoResult<Reply> {
        self.repo.get_reply(rno).await
    }

    pub async fn update_reply(&self, rno: Id, reply_text: String) -> RepoResult<Reply> {
        require_text("reply_text", &reply_text, usize::MAX)?;
        let reply = self.repo.update_reply_text(rno, reply_text).await?;
        info!(rno, "reply modified");
        Ok(reply)
    }

    pub async fn delete_reply(&self, rno: Id) -> RepoResult<()> {
        self.repo.delete_reply(rno).await?;
        info!(rno, "reply removed");
        Ok(())
    }
}
