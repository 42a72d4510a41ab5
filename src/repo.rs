use async_trait::async_trait;

use crate::models::*;
use crate::page::{Page, PageError, Pageable};
use crate::search::Predicate;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("invalid argument: {0}")] InvalidArgument(String),
    #[error(transparent)] InvalidPage(#[from] PageError),
    #[error("invalid sort field: {0}")] InvalidSortField(String),
    #[error("constraint fails")] ConstraintViolation,
    #[error("internal error: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Board storage plus the two board query engines.
#[async_trait]
pub trait BoardRepo: Send + Sync {
    async fn create_board(&self, new: NewBoard) -> RepoResult<Board>;
    async fn get_board(&self, bno: Id) -> RepoResult<Board>;
    async fn update_board(&self, bno: Id, upd: UpdateBoard) -> RepoResult<Board>;
    /// Fails with `ConstraintViolation` while replies still reference the board.
    async fn delete_board(&self, bno: Id) -> RepoResult<()>;

    /// Filtered, ordered page of boards; `total` counts every match.
    async fn search_boards(&self, filter: &Predicate, pageable: &Pageable) -> RepoResult<Page<Board>>;

    /// Same filter and paging, each row carrying its reply count.
    /// `total` counts distinct boards, never joined rows.
    async fn search_boards_with_reply_count(
        &self,
        filter: &Predicate,
        pageable: &Pageable,
    ) -> RepoResult<Page<BoardListItem>>;
}

#[async_trait]
pub trait ReplyRepo: Send + Sync {
    /// Replies of `board_id` ordered by `rno` ascending. Only the offset and
    /// limit of `pageable` apply; its sort is ignored.
    async fn list_replies(&self, board_id: Id, pageable: &Pageable) -> RepoResult<Page<Reply>>;
    /// Fails with `ConstraintViolation` when `board_id` names no board.
    async fn create_reply(&self, new: NewReply) -> RepoResult<Reply>;
    async fn get_reply(&self, rno: Id) -> RepoResult<Reply>;
    async fn update_reply_text(&self, rno: Id, reply_text: String) -> RepoResult<Reply>;
    async fn delete_reply(&self, rno: Id) -> RepoResult<()>;
}

pub trait Repo: BoardRepo + ReplyRepo {}

impl<T> Repo for T where T: BoardRepo + ReplyRepo {}

pub fn board_sort_key(pageable: &Pageable) -> RepoResult<BoardSortKey> {
    BoardSortKey::parse(&pageable.sort.field)
        .ok_or_else(|| RepoError::InvalidSortField(pageable.sort.field.clone()))
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use tempfile::NamedTempFile;
    use tracing::{debug, info, warn};

    const SNAPSHOT_FILE: &str = "state.json";

    fn clamp_usize(n: u64) -> usize {
        usize::try_from(n).unwrap_or(usize::MAX)
    }

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        boards: BTreeMap<Id, Board>,
        replies: BTreeMap<Id, Reply>,
        next_bno: Id,
        next_rno: Id,
    }

    /// Process-local store. Optionally mirrors its state to a JSON snapshot
    /// after every write so a restart picks up where it left off.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
        // serializes snapshot writes so an older state never lands last
        persist_lock: Arc<Mutex<()>>,
    }

    impl InMemRepo {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_snapshot_dir(dir: impl AsRef<Path>) -> Self {
            let path = dir.as_ref().join(SNAPSHOT_FILE);
            let state = Self::load_state_from(&path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Some(Arc::new(path)),
                persist_lock: Arc::default(),
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        info!(path = %path.display(), boards = s.boards.len(), replies = s.replies.len(), "loaded snapshot");
                        s
                    }
                    Err(e) => {
                        // keep the unreadable file out of the way of the next write
                        let aside = path.with_extension(format!("json.corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.f")));
                        match std::fs::rename(path, &aside) {
                            Ok(()) => warn!(path = %path.display(), moved_to = %aside.display(), "failed to parse snapshot, starting empty: {e}"),
                            Err(mv) => warn!(path = %path.display(), "failed to parse snapshot and to move it aside ({mv}), starting empty: {e}"),
                        }
                        State::default()
                    }
                },
                Err(e) => {
                    info!(path = %path.display(), "no snapshot, starting empty: {e}");
                    State::default()
                }
            }
        }

        // best effort: a failed write is logged, the in-memory state stays authoritative
        fn persist(&self) {
            let Some(path) = self.snapshot_path.as_deref() else { return };
            let _guard = self.persist_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let bytes = match self.read().map(|s| serde_json::to_vec_pretty(&*s)) {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => { warn!("failed to serialize snapshot: {e}"); return; }
                Err(e) => { warn!("failed to read state for snapshot: {e}"); return; }
            };
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!(dir = %dir.display(), "failed to create snapshot dir: {e}");
                return;
            }
            // write a sibling temp file, then rename it over the snapshot
            let result = NamedTempFile::new_in(dir)
                .and_then(|mut tmp| {
                    tmp.write_all(&bytes)?;
                    tmp.as_file().sync_all()?;
                    Ok(tmp)
                })
                .and_then(|tmp| tmp.persist(path).map_err(|e| e.error));
            if let Err(e) = result {
                warn!(path = %path.display(), "failed to write snapshot: {e}");
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn select_boards<'a>(
            s: &'a State,
            filter: &Predicate,
            key: BoardSortKey,
            pageable: &Pageable,
        ) -> (Vec<&'a Board>, u64) {
            let mut matched: Vec<&Board> = s.boards.values().filter(|b| filter.matches(*b)).collect();
            matched.sort_by(|a, b| {
                let ord = key.compare(a, b);
                if pageable.sort.descending { ord.reverse() } else { ord }
            });
            let total = matched.len() as u64;
            let rows = matched
                .into_iter()
                .skip(clamp_usize(pageable.offset))
                .take(clamp_usize(pageable.limit))
                .collect();
            (rows, total)
        }
    }

    #[async_trait]
    impl BoardRepo for InMemRepo {
        async fn create_board(&self, new: NewBoard) -> RepoResult<Board> {
            let mut s = self.write()?;
            s.next_bno += 1;
            let now = Utc::now();
            let board = Board {
                bno: s.next_bno,
                title: new.title,
                content: new.content,
                writer: new.writer,
                created_at: now,
                updated_at: now,
            };
            s.boards.insert(board.bno, board.clone());
            drop(s); // release lock before persisting
            self.persist();
            Ok(board)
        }

        async fn get_board(&self, bno: Id) -> RepoResult<Board> {
            let s = self.read()?;
            s.boards.get(&bno).cloned().ok_or(RepoError::NotFound)
        }

        async fn update_board(&self, bno: Id, upd: UpdateBoard) -> RepoResult<Board> {
            let mut s = self.write()?;
            let board = s.boards.get_mut(&bno).ok_or(RepoError::NotFound)?;
            if let Some(title) = upd.title { board.title = title; }
            if let Some(content) = upd.content { board.content = content; }
            board.updated_at = Utc::now();
            let updated = board.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_board(&self, bno: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            if !s.boards.contains_key(&bno) {
                return Err(RepoError::NotFound);
            }
            // no cascade: mirrors the reply.board_id foreign key
            if s.replies.values().any(|r| r.board_id == bno) {
                return Err(RepoError::ConstraintViolation);
            }
            s.boards.remove(&bno);
            drop(s);
            self.persist();
            Ok(())
        }

        async fn search_boards(&self, filter: &Predicate, pageable: &Pageable) -> RepoResult<Page<Board>> {
            let key = board_sort_key(pageable)?;
            let s = self.read()?;
            let (rows, total) = Self::select_boards(&s, filter, key, pageable);
            debug!(total, returned = rows.len(), "board search");
            Ok(Page { items: rows.into_iter().cloned().collect(), total })
        }

        async fn search_boards_with_reply_count(
            &self,
            filter: &Predicate,
            pageable: &Pageable,
        ) -> RepoResult<Page<BoardListItem>> {
            let key = board_sort_key(pageable)?;
            let s = self.read()?;
            let (rows, total) = Self::select_boards(&s, filter, key, pageable);

            // count only for the boards on this page
            let wanted: HashSet<Id> = rows.iter().map(|b| b.bno).collect();
            let mut counts: HashMap<Id, i64> = HashMap::new();
            for reply in s.replies.values().filter(|r| wanted.contains(&r.board_id)) {
                *counts.entry(reply.board_id).or_default() += 1;
            }

            let items = rows
                .into_iter()
                .map(|b| BoardListItem::from_board(b, counts.get(&b.bno).copied().unwrap_or(0)))
                .collect::<Vec<_>>();
            debug!(total, returned = items.len(), "board search with reply count");
            Ok(Page { items, total })
        }
    }

    #[async_trait]
    impl ReplyRepo for InMemRepo {
        async fn list_replies(&self, board_id: Id, pageable: &Pageable) -> RepoResult<Page<Reply>> {
            let s = self.read()?;
            // BTreeMap iteration is already rno ascending
            let matched: Vec<&Reply> = s.replies.values().filter(|r| r.board_id == board_id).collect();
            let total = matched.len() as u64;
            let items = matched
                .into_iter()
                .skip(clamp_usize(pageable.offset))
                .take(clamp_usize(pageable.limit))
                .cloned()
                .collect();
            Ok(Page { items, total })
        }

        async fn create_reply(&self, new: NewReply) -> RepoResult<Reply> {
            let mut s = self.write()?;
            if !s.boards.contains_key(&new.board_id) {
                return Err(RepoError::ConstraintViolation);
            }
            s.next_rno += 1;
            let now = Utc::now();
            let reply = Reply {
                rno: s.next_rno,
                board_id: new.board_id,
                reply_text: new.reply_text,
                replyer: new.replyer,
                created_at: now,
                updated_at: now,
            };
            s.replies.insert(reply.rno, reply.clone());
            drop(s);
            self.persist();
            Ok(reply)
        }

        async fn get_reply(&self, rno: Id) -> RepoResult<Reply> {
            let s = self.read()?;
            s.replies.get(&rno).cloned().ok_or(RepoError::NotFound)
        }

        async fn update_reply_text(&self, rno: Id, reply_text: String) -> RepoResult<Reply> {
            let mut s = self.write()?;
            let reply = s.replies.get_mut(&rno).ok_or(RepoError::NotFound)?;
            reply.reply_text = reply_text;
            reply.updated_at = Utc::now();
            let updated = reply.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_reply(&self, rno: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            if s.replies.remove(&rno).is_none() {
                return Err(RepoError::NotFound);
            }
            drop(s);
            self.persist();
            Ok(())
        }
    }
}

// Postgres implementation (feature = "postgres-store"); schema in sql/schema.sql
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::error::ErrorKind;
    use sqlx::{Pool, Postgres, QueryBuilder};
    use tracing::{debug, error, warn};

    const BOARD_COLUMNS: &str = "bno, title, content, writer, created_at, updated_at";
    const REPLY_COLUMNS: &str = "rno, board_id, reply_text, replyer, created_at, updated_at";

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }
    }

    fn map_db_err(e: sqlx::Error) -> RepoError {
        match &e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => {
                    warn!("constraint violation: {}", db.message());
                    RepoError::ConstraintViolation
                }
                _ => {
                    error!("database error: {e}");
                    RepoError::Internal(e.to_string())
                }
            },
            _ => {
                error!("database error: {e}");
                RepoError::Internal(e.to_string())
            }
        }
    }

    fn to_i64(n: u64) -> i64 {
        i64::try_from(n).unwrap_or(i64::MAX)
    }

    /// Render `p` as a boolean SQL expression over the `b` alias.
    fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, p: &Predicate) {
        match p {
            Predicate::Always => { qb.push("TRUE"); }
            // strpos keeps the match literal and case-sensitive (no LIKE wildcards)
            Predicate::Contains(field, needle) => {
                qb.push("strpos(b.").push(field.column()).push(", ").push_bind(needle.clone()).push(") > 0");
            }
            Predicate::IdGreaterThan(min) => { qb.push("b.bno > ").push_bind(*min); }
            Predicate::Or(parts) => push_joined(qb, parts, " OR ", "FALSE"),
            Predicate::And(parts) => push_joined(qb, parts, " AND ", "TRUE"),
        }
    }

    fn push_joined(qb: &mut QueryBuilder<'_, Postgres>, parts: &[Predicate], sep: &str, empty: &str) {
        if parts.is_empty() {
            qb.push(empty);
            return;
        }
        qb.push("(");
        for (i, part) in parts.iter().enumerate() {
            if i > 0 { qb.push(sep); }
            push_predicate(qb, part);
        }
        qb.push(")");
    }

    fn push_board_order_and_page(qb: &mut QueryBuilder<'_, Postgres>, key: BoardSortKey, pageable: &Pageable) {
        let dir = if pageable.sort.descending { " DESC" } else { " ASC" };
        qb.push(" ORDER BY b.").push(key.column()).push(dir);
        if key != BoardSortKey::Bno {
            qb.push(", b.bno").push(dir);
        }
        qb.push(" LIMIT ").push_bind(to_i64(pageable.limit));
        qb.push(" OFFSET ").push_bind(to_i64(pageable.offset));
    }

    fn board_count_query(filter: &Predicate) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM board b WHERE ");
        push_predicate(&mut qb, filter);
        qb
    }

    #[async_trait]
    impl BoardRepo for PgRepo {
        async fn create_board(&self, new: NewBoard) -> RepoResult<Board> {
            let sql = format!("INSERT INTO board (title, content, writer) VALUES ($1,$2,$3) RETURNING {BOARD_COLUMNS}");
            sqlx::query_as::<_, Board>(&sql)
                .bind(&new.title).bind(&new.content).bind(&new.writer)
                .fetch_one(&self.pool).await.map_err(map_db_err)
        }

        async fn get_board(&self, bno: Id) -> RepoResult<Board> {
            let sql = format!("SELECT {BOARD_COLUMNS} FROM board WHERE bno = $1");
            sqlx::query_as::<_, Board>(&sql)
                .bind(bno)
                .fetch_optional(&self.pool).await.map_err(map_db_err)?
                .ok_or(RepoError::NotFound)
        }

        async fn update_board(&self, bno: Id, upd: UpdateBoard) -> RepoResult<Board> {
            let sql = format!(
                "UPDATE board SET title = COALESCE($2, title), content = COALESCE($3, content), updated_at = now() \
                 WHERE bno = $1 RETURNING {BOARD_COLUMNS}"
            );
            sqlx::query_as::<_, Board>(&sql)
                .bind(bno)
                .bind(upd.title.as_ref())
                .bind(upd.content.as_ref())
                .fetch_optional(&self.pool).await.map_err(map_db_err)?
                .ok_or(RepoError::NotFound)
        }

        async fn delete_board(&self, bno: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM board WHERE bno = $1")
                .bind(bno)
                .execute(&self.pool).await.map_err(map_db_err)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn search_boards(&self, filter: &Predicate, pageable: &Pageable) -> RepoResult<Page<Board>> {
            let key = board_sort_key(pageable)?;

            let mut select = QueryBuilder::new("SELECT b.bno, b.title, b.content, b.writer, b.created_at, b.updated_at FROM board b WHERE ");
            push_predicate(&mut select, filter);
            push_board_order_and_page(&mut select, key, pageable);
            let mut count = board_count_query(filter);

            // page and count read the same snapshot
            let mut tx = self.pool.begin().await.map_err(map_db_err)?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
                .execute(&mut *tx).await.map_err(map_db_err)?;
            let items = select.build_query_as::<Board>().fetch_all(&mut *tx).await.map_err(map_db_err)?;
            let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await.map_err(map_db_err)?;
            tx.commit().await.map_err(map_db_err)?;

            debug!(total, returned = items.len(), "board search");
            Ok(Page { items, total: total.max(0) as u64 })
        }

        async fn search_boards_with_reply_count(
            &self,
            filter: &Predicate,
            pageable: &Pageable,
        ) -> RepoResult<Page<BoardListItem>> {
            let key = board_sort_key(pageable)?;

            let mut select = QueryBuilder::new(
                "SELECT b.bno, b.title, b.writer, b.created_at, COUNT(r.rno) AS reply_count \
                 FROM board b LEFT JOIN reply r ON r.board_id = b.bno WHERE ",
            );
            push_predicate(&mut select, filter);
            select.push(" GROUP BY b.bno");
            push_board_order_and_page(&mut select, key, pageable);
            // counted without the join so totals are per board
            let mut count = board_count_query(filter);

            let mut tx = self.pool.begin().await.map_err(map_db_err)?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
                .execute(&mut *tx).await.map_err(map_db_err)?;
            let items = select.build_query_as::<BoardListItem>().fetch_all(&mut *tx).await.map_err(map_db_err)?;
            let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await.map_err(map_db_err)?;
            tx.commit().await.map_err(map_db_err)?;

            debug!(total, returned = items.len(), "board search with reply count");
            Ok(Page { items, total: total.max(0) as u64 })
        }
    }

    #[async_trait]
    impl ReplyRepo for PgRepo {
        async fn list_replies(&self, board_id: Id, pageable: &Pageable) -> RepoResult<Page<Reply>> {
            let sql = format!(
                "SELECT {REPLY_COLUMNS} FROM reply WHERE board_id = $1 ORDER BY rno ASC LIMIT $2 OFFSET $3"
            );

            let mut tx = self.pool.begin().await.map_err(map_db_err)?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
                .execute(&mut *tx).await.map_err(map_db_err)?;
            let items = sqlx::query_as::<_, Reply>(&sql)
                .bind(board_id)
                .bind(to_i64(pageable.limit))
                .bind(to_i64(pageable.offset))
                .fetch_all(&mut *tx).await.map_err(map_db_err)?;
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reply WHERE board_id = $1")
                .bind(board_id)
                .fetch_one(&mut *tx).await.map_err(map_db_err)?;
            tx.commit().await.map_err(map_db_err)?;

            Ok(Page { items, total: total.max(0) as u64 })
        }

        async fn create_reply(&self, new: NewReply) -> RepoResult<Reply> {
            let sql = format!("INSERT INTO reply (board_id, reply_text, replyer) VALUES ($1,$2,$3) RETURNING {REPLY_COLUMNS}");
            sqlx::query_as::<_, Reply>(&sql)
                .bind(new.board_id).bind(&new.reply_text).bind(&new.replyer)
                .fetch_one(&self.pool).await.map_err(map_db_err)
        }

        async fn get_reply(&self, rno: Id) -> RepoResult<Reply> {
            let sql = format!("SELECT {REPLY_COLUMNS} FROM reply WHERE rno = $1");
            sqlx::query_as::<_, Reply>(&sql)
                .bind(rno)
                .fetch_optional(&self.pool).await.map_err(map_db_err)?
                .ok_or(RepoError::NotFound)
        }

        async fn update_reply_text(&self, rno: Id, reply_text: String) -> RepoResult<Reply> {
            let sql = format!("UPDATE reply SET reply_text = $2, updated_at = now() WHERE rno = $1 RETURNING {REPLY_COLUMNS}");
            sqlx::query_as::<_, Reply>(&sql)
                .bind(rno).bind(reply_text)
                .fetch_optional(&self.pool).await.map_err(map_db_err)?
                .ok_or(RepoError::NotFound)
        }

        async fn delete_reply(&self, rno: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM reply WHERE rno = $1")
                .bind(rno)
                .execute(&self.pool).await.map_err(map_db_err)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }
    }
}
