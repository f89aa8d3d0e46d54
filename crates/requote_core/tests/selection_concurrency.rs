use requote_core::db::open_db;
use requote_core::{
    QuoteDraft, QuoteService, QuoteServiceError, SqliteUserRepository, UserRepository,
    SELECTION_CAP,
};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn concurrent_selects_cannot_exceed_the_cap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");

    let (owner, candidates) = {
        let conn = open_db(&path).unwrap();
        let owner = SqliteUserRepository::try_new(&conn)
            .unwrap()
            .create_user("racer@example.com")
            .unwrap()
            .id;
        let service = QuoteService::new(&conn, "");
        for index in 0..(SELECTION_CAP - 1) {
            let draft = QuoteDraft::new(format!("filled {index}"), "A", None).unwrap();
            let id = service.add_quote(owner, &draft).unwrap().id;
            service.set_selected(owner, id, true).unwrap();
        }
        let candidates: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|content| {
                let draft = QuoteDraft::new(content, "A", None).unwrap();
                service.add_quote(owner, &draft).unwrap().id
            })
            .collect();
        (owner, candidates)
    };

    let barrier = Arc::new(Barrier::new(candidates.len()));
    let handles: Vec<_> = candidates
        .iter()
        .copied()
        .map(|quote_id| {
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = QuoteService::new(&conn, "");
                barrier.wait();
                service.set_selected(owner, quote_id, true).map(|_| ())
            })
        })
        .collect();
    let results: Vec<Result<(), QuoteServiceError>> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let succeeded = results.iter().filter(|result| result.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|result| matches!(result, Err(QuoteServiceError::SelectionLimitExceeded(_))))
        .count();
    assert_eq!(succeeded, 1, "results: {results:?}");
    assert_eq!(rejected, 1, "results: {results:?}");

    let conn = open_db(&path).unwrap();
    let service = QuoteService::new(&conn, "");
    let board = service.board(owner).unwrap();
    assert_eq!(board.selected.len(), SELECTION_CAP);
    assert_eq!(board.unselected.len(), 1);
    let schedule = service.schedule(owner).unwrap().unwrap();
    assert_eq!(schedule.len(), SELECTION_CAP);
}
