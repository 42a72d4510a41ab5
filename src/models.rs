use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::search::{Searchable, TextField};

pub type Id = i64;

pub const TITLE_MAX: usize = 500;
pub const CONTENT_MAX: usize = 2000;
pub const WRITER_MAX: usize = 50;
pub const REPLYER_MAX: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Board {
    pub bno: Id,
    pub title: String,
    pub content: String,
    pub writer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewBoard {
    pub title: String,
    pub content: String,
    pub writer: String,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateBoard {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Board row as shown in the list view, with its number of replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct BoardListItem {
    pub bno: Id,
    pub title: String,
    pub writer: String,
    pub created_at: DateTime<Utc>,
    pub reply_count: i64,
}

impl BoardListItem {
    pub fn from_board(board: &Board, reply_count: i64) -> Self {
        Self {
            bno: board.bno,
            title: board.title.clone(),
            writer: board.writer.clone(),
            created_at: board.created_at,
            reply_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Reply {
    pub rno: Id,
    pub board_id: Id, // weak reference to boards.bno
    pub reply_text: String,
    pub replyer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewReply {
    pub board_id: Id,
    pub reply_text: String,
    pub replyer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateReply {
    pub reply_text: String,
}

impl Searchable for Board {
    fn id(&self) -> Id {
        self.bno
    }

    fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Title => &self.title,
            TextField::Content => &self.content,
            TextField::Writer => &self.writer,
        }
    }
}

/// Columns a board listing may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardSortKey {
    Bno,
    Title,
    Content,
    Writer,
    CreatedAt,
    UpdatedAt,
}

impl BoardSortKey {
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            "bno" => Some(Self::Bno),
            "title" => Some(Self::Title),
            "content" => Some(Self::Content),
            "writer" => Some(Self::Writer),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Bno => "bno",
            Self::Title => "title",
            Self::Content => "content",
            Self::Writer => "writer",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    /// Ascending comparison; ties fall back to `bno`.
    pub fn compare(self, a: &Board, b: &Board) -> Ordering {
        let primary = match self {
            Self::Bno => Ordering::Equal,
            Self::Title => a.title.cmp(&b.title),
            Self::Content => a.content.cmp(&b.content),
            Self::Writer => a.writer.cmp(&b.writer),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        primary.then_with(|| a.bno.cmp(&b.bno))
    }
}
