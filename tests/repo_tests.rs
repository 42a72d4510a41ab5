#![cfg(feature = "inmem-store")]

use bulletin::{
    models::{NewBoard, NewReply, UpdateBoard},
    page::{Pageable, Sort},
    repo::{inmem::InMemRepo, RepoError},
    search::{board_filter, SearchType},
};
// Bring trait method namespaces into scope so calls on InMemRepo resolve.
use bulletin::repo::{BoardRepo, ReplyRepo};

fn board(title: &str, content: &str, writer: &str) -> NewBoard {
    NewBoard { title: title.into(), content: content.into(), writer: writer.into() }
}

fn reply(board_id: i64, text: &str) -> NewReply {
    NewReply { board_id, reply_text: text.into(), replyer: "replyer".into() }
}

fn first_page(size: i64) -> Pageable {
    Pageable::of(1, size, Sort::desc("bno")).unwrap()
}

#[tokio::test]
async fn title_search_is_case_sensitive_substring() {
    let r = InMemRepo::new();
    for title in ["apple pie", "banana", "pineapple"] {
        r.create_board(board(title, "c", "w")).await.unwrap();
    }
    r.create_board(board("Apple", "c", "w")).await.unwrap();

    let filter = board_filter(&[SearchType::Title], Some("apple"));
    let page = r.search_boards(&filter, &first_page(10)).await.unwrap();
    assert_eq!(page.total, 2);
    let titles: Vec<_> = page.items.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["pineapple", "apple pie"]);
}

#[tokio::test]
async fn multiple_types_are_or_combined() {
    let r = InMemRepo::new();
    r.create_board(board("rust", "nothing", "alice")).await.unwrap();
    r.create_board(board("go", "about rust", "bob")).await.unwrap();
    r.create_board(board("zig", "nothing", "rusty")).await.unwrap();
    r.create_board(board("c", "nothing", "carol")).await.unwrap();

    let tc = board_filter(&[SearchType::Title, SearchType::Content], Some("rust"));
    assert_eq!(r.search_boards(&tc, &first_page(10)).await.unwrap().total, 2);

    let tcw = board_filter(&[SearchType::Title, SearchType::Content, SearchType::Writer], Some("rust"));
    assert_eq!(r.search_boards(&tcw, &first_page(10)).await.unwrap().total, 3);
}

#[tokio::test]
async fn empty_keyword_or_types_lists_everything() {
    let r = InMemRepo::new();
    for i in 0..5 {
        r.create_board(board(&format!("title {i}"), "c", "w")).await.unwrap();
    }
    let no_keyword = board_filter(&[SearchType::Title], Some(""));
    assert_eq!(r.search_boards(&no_keyword, &first_page(10)).await.unwrap().total, 5);
    let no_types = board_filter(&[], Some("title"));
    assert_eq!(r.search_boards(&no_types, &first_page(10)).await.unwrap().total, 5);
}

#[tokio::test]
async fn paging_respects_size_and_total() {
    let r = InMemRepo::new();
    for i in 1..=23 {
        r.create_board(board(&format!("t{i}"), "c", "w")).await.unwrap();
    }
    let all = board_filter(&[], None);

    let p1 = r.search_boards(&all, &first_page(10)).await.unwrap();
    assert_eq!(p1.total, 23);
    assert_eq!(p1.items.len(), 10);
    assert_eq!(p1.items[0].bno, 23);

    let p3 = r.search_boards(&all, &Pageable::of(3, 10, Sort::desc("bno")).unwrap()).await.unwrap();
    assert_eq!(p3.items.len(), 3);
    assert_eq!(p3.items.last().unwrap().bno, 1);

    let past_end = r.search_boards(&all, &Pageable::of(9, 10, Sort::desc("bno")).unwrap()).await.unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.total, 23);

    let by_title = r.search_boards(&all, &Pageable::of(1, 3, Sort::asc("title")).unwrap()).await.unwrap();
    let titles: Vec<_> = by_title.items.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["t1", "t10", "t11"]);
}

#[tokio::test]
async fn unknown_sort_field_is_rejected() {
    let r = InMemRepo::new();
    let pageable = Pageable::of(1, 10, Sort::asc("nope")).unwrap();
    let err = r.search_boards(&board_filter(&[], None), &pageable).await.unwrap_err();
    assert!(matches!(err, RepoError::InvalidSortField(f) if f == "nope"));
}

#[tokio::test]
async fn reply_counts_per_board() {
    let r = InMemRepo::new();
    let quiet = r.create_board(board("quiet", "c", "w")).await.unwrap();
    let busy = r.create_board(board("busy", "c", "w")).await.unwrap();
    for i in 0..3 {
        r.create_reply(reply(busy.bno, &format!("r{i}"))).await.unwrap();
    }

    let page = r
        .search_boards_with_reply_count(&board_filter(&[], None), &first_page(10))
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    let count_of = |bno| page.items.iter().find(|i| i.bno == bno).unwrap().reply_count;
    assert_eq!(count_of(quiet.bno), 0);
    assert_eq!(count_of(busy.bno), 3);
}

#[tokio::test]
async fn reply_count_total_counts_boards_not_replies() {
    let r = InMemRepo::new();
    let b = r.create_board(board("only", "c", "w")).await.unwrap();
    for i in 0..15 {
        r.create_reply(reply(b.bno, &format!("r{i}"))).await.unwrap();
    }
    let page = r
        .search_boards_with_reply_count(&board_filter(&[], None), &first_page(10))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].reply_count, 15);
}

#[tokio::test]
async fn modify_only_title_keeps_content() {
    let r = InMemRepo::new();
    let b = r.create_board(board("old", "body", "w")).await.unwrap();
    let updated = r
        .update_board(b.bno, UpdateBoard { title: Some("new".into()), content: None })
        .await
        .unwrap();
    assert_eq!(updated.title, "new");
    assert_eq!(updated.content, "body");
    assert_eq!(updated.writer, "w");
    assert!(updated.updated_at >= b.updated_at);

    let err = r.update_board(999, UpdateBoard::default()).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
}

#[tokio::test]
async fn reply_for_missing_board_violates_constraint() {
    let r = InMemRepo::new();
    let err = r.create_reply(reply(42, "orphan")).await.unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation));
}

#[tokio::test]
async fn board_with_replies_cannot_be_removed() {
    let r = InMemRepo::new();
    let b = r.create_board(board("t", "c", "w")).await.unwrap();
    let rep = r.create_reply(reply(b.bno, "hi")).await.unwrap();

    let err = r.delete_board(b.bno).await.unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation));

    r.delete_reply(rep.rno).await.unwrap();
    r.delete_board(b.bno).await.unwrap();
    assert!(matches!(r.get_board(b.bno).await.unwrap_err(), RepoError::NotFound));
}

#[tokio::test]
async fn removing_reply_twice_is_not_found() {
    let r = InMemRepo::new();
    let b = r.create_board(board("t", "c", "w")).await.unwrap();
    let rep = r.create_reply(reply(b.bno, "hi")).await.unwrap();
    r.delete_reply(rep.rno).await.unwrap();
    let err = r.delete_reply(rep.rno).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
}

#[tokio::test]
async fn replies_listed_oldest_first() {
    let r = InMemRepo::new();
    let b = r.create_board(board("t", "c", "w")).await.unwrap();
    let other = r.create_board(board("o", "c", "w")).await.unwrap();
    for i in 0..12 {
        r.create_reply(reply(b.bno, &format!("r{i}"))).await.unwrap();
    }
    r.create_reply(reply(other.bno, "elsewhere")).await.unwrap();

    let p1 = r.list_replies(b.bno, &Pageable::of(1, 10, Sort::asc("rno")).unwrap()).await.unwrap();
    assert_eq!(p1.total, 12);
    assert_eq!(p1.items.len(), 10);
    assert!(p1.items.windows(2).all(|w| w[0].rno < w[1].rno));
    assert_eq!(p1.items[0].reply_text, "r0");

    let p2 = r.list_replies(b.bno, &Pageable::of(2, 10, Sort::asc("rno")).unwrap()).await.unwrap();
    let texts: Vec<_> = p2.items.iter().map(|r| r.reply_text.as_str()).collect();
    assert_eq!(texts, vec!["r10", "r11"]);

    let none = r.list_replies(999, &Pageable::of(1, 10, Sort::asc("rno")).unwrap()).await.unwrap();
    assert_eq!(none.total, 0);
}

#[tokio::test]
async fn reply_text_update() {
    let r = InMemRepo::new();
    let b = r.create_board(board("t", "c", "w")).await.unwrap();
    let rep = r.create_reply(reply(b.bno, "first")).await.unwrap();
    let updated = r.update_reply_text(rep.rno, "second".into()).await.unwrap();
    assert_eq!(updated.reply_text, "second");
    assert_eq!(updated.replyer, "replyer");
    assert_eq!(r.get_reply(rep.rno).await.unwrap().reply_text, "second");
    assert!(matches!(r.update_reply_text(999, "x".into()).await.unwrap_err(), RepoError::NotFound));
}

#[tokio::test]
async fn snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (bno, rno) = {
        let r = InMemRepo::with_snapshot_dir(dir.path());
        let b = r.create_board(board("kept", "c", "w")).await.unwrap();
        let rep = r.create_reply(reply(b.bno, "kept reply")).await.unwrap();
        (b.bno, rep.rno)
    };

    let reopened = InMemRepo::with_snapshot_dir(dir.path());
    assert_eq!(reopened.get_board(bno).await.unwrap().title, "kept");
    assert_eq!(reopened.get_reply(rno).await.unwrap().reply_text, "kept reply");

    // numbering continues after the restored rows
    let next = reopened.create_board(board("next", "c", "w")).await.unwrap();
    assert_eq!(next.bno, bno + 1);
}

#[tokio::test]
async fn reply_order_ignores_requested_sort() {
    let r = InMemRepo::new();
    let b = r.create_board(board("t", "c", "w")).await.unwrap();
    for i in 0..3 {
        r.create_reply(reply(b.bno, &format!("r{i}"))).await.unwrap();
    }
    for sort in [Sort::desc("rno"), Sort::desc("created_at"), Sort::asc("nonsense")] {
        let page = r.list_replies(b.bno, &Pageable::of(1, 10, sort).unwrap()).await.unwrap();
        let rnos: Vec<_> = page.items.iter().map(|r| r.rno).collect();
        assert_eq!(rnos, vec![1, 2, 3]);
    }
}

#[tokio::test]
async fn created_boards_all_come_back_on_one_page() {
    let r = InMemRepo::new();
    let mut created = Vec::new();
    for i in 0..7 {
        created.push(r.create_board(board(&format!("t{i}"), "c", "w")).await.unwrap().bno);
    }
    let page = r
        .search_boards(&board_filter(&[], None), &Pageable::of(1, 7, Sort::asc("bno")).unwrap())
        .await
        .unwrap();
    assert_eq!(page.total, 7);
    let listed: Vec<_> = page.items.iter().map(|b| b.bno).collect();
    assert_eq!(listed, created);
}

#[tokio::test]
async fn reply_counts_on_later_page_sorted_by_title() {
    let r = InMemRepo::new();
    // insertion order differs from title order
    let mut bnos = std::collections::HashMap::new();
    for (title, replies) in [("d", 4), ("a", 1), ("f", 0), ("c", 2), ("b", 0), ("e", 3)] {
        let b = r.create_board(board(title, "c", "w")).await.unwrap();
        for i in 0..replies {
            r.create_reply(reply(b.bno, &format!("{title}{i}"))).await.unwrap();
        }
        bnos.insert(title, b.bno);
    }

    let page = r
        .search_boards_with_reply_count(&board_filter(&[], None), &Pageable::of(2, 2, Sort::asc("title")).unwrap())
        .await
        .unwrap();
    assert_eq!(page.total, 6);
    let rows: Vec<_> = page.items.iter().map(|i| (i.title.as_str(), i.bno, i.reply_count)).collect();
    assert_eq!(rows, vec![("c", bnos["c"], 2), ("d", bnos["d"], 4)]);

    let last = r
        .search_boards_with_reply_count(&board_filter(&[], None), &Pageable::of(3, 2, Sort::asc("title")).unwrap())
        .await
        .unwrap();
    let rows: Vec<_> = last.items.iter().map(|i| (i.title.as_str(), i.reply_count)).collect();
    assert_eq!(rows, vec![("e", 3), ("f", 0)]);
}

#[tokio::test]
async fn corrupt_snapshot_is_moved_aside() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("state.json");
    std::fs::write(&snapshot, b"{ not json").unwrap();

    let r = InMemRepo::with_snapshot_dir(dir.path());
    assert!(matches!(r.get_board(1).await.unwrap_err(), RepoError::NotFound));
    r.create_board(board("fresh", "c", "w")).await.unwrap();

    let aside: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .filter(|name| name.starts_with("state.json.corrupt-"))
        .collect();
    assert_eq!(aside.len(), 1);
    assert_eq!(std::fs::read(dir.path().join(&aside[0])).unwrap(), b"{ not json");

    // the new snapshot is complete and loadable
    let reopened = InMemRepo::with_snapshot_dir(dir.path());
    assert_eq!(reopened.get_board(1).await.unwrap().title, "fresh");
    let leftovers = std::fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| {
            let name = e.as_ref().unwrap().file_name().into_string().unwrap();
            name != "state.json" && !name.starts_with("state.json.corrupt-")
        })
        .count();
    assert_eq!(leftovers, 0);
}
