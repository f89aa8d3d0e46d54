use requote_core::db::open_db_in_memory;
use requote_core::{
    Quote, QuoteRepository, RepoError, ScheduleEntry, ScheduleRepository, SqliteQuoteRepository,
    SqliteScheduleRepository, SqliteUserRepository, UserRepository,
};
use uuid::Uuid;

#[test]
fn quote_fields_survive_storage() {
    let conn = open_db_in_memory().unwrap();
    let owner = SqliteUserRepository::try_new(&conn)
        .unwrap()
        .create_user("reader@example.com")
        .unwrap()
        .id;
    let repo = SqliteQuoteRepository::try_new(&conn).unwrap();

    let mut quote = Quote::new(owner, "Know thyself.", "Socrates");
    quote.source = Some("Apology".to_string());
    quote.source_link = Some("https://www.amazon.com/s?k=Socrates%20Apology".to_string());
    quote.selected = true;
    quote.position = 0;
    quote.unselected_slot = Some(3);
    repo.create_quote(&quote).unwrap();

    assert_eq!(repo.get_quote(quote.id).unwrap(), Some(quote.clone()));
    assert_eq!(repo.count_selected(owner).unwrap(), 1);

    quote.selected = false;
    quote.unselected_slot = None;
    repo.save_quote(&quote).unwrap();
    assert_eq!(repo.list_quotes(owner).unwrap(), vec![quote.clone()]);
    assert_eq!(repo.count_selected(owner).unwrap(), 0);

    repo.delete_quote(owner, quote.id).unwrap();
    assert!(repo.get_quote(quote.id).unwrap().is_none());
    assert!(matches!(
        repo.delete_quote(owner, quote.id),
        Err(RepoError::QuoteNotFound(_))
    ));
}

#[test]
fn list_quotes_orders_selected_first_then_by_position() {
    let conn = open_db_in_memory().unwrap();
    let owner = SqliteUserRepository::try_new(&conn)
        .unwrap()
        .create_user("reader@example.com")
        .unwrap()
        .id;
    let repo = SqliteQuoteRepository::try_new(&conn).unwrap();

    for (content, selected, position) in [("u1", false, 1), ("s0", true, 0), ("u0", false, 0)] {
        let mut quote = Quote::new(owner, content, "A");
        quote.selected = selected;
        quote.position = position;
        repo.create_quote(&quote).unwrap();
    }

    let contents: Vec<String> = repo
        .list_quotes(owner)
        .unwrap()
        .into_iter()
        .map(|quote| quote.content)
        .collect();
    assert_eq!(contents, vec!["s0", "u0", "u1"]);
}

#[test]
fn invalid_quote_is_not_written() {
    let conn = open_db_in_memory().unwrap();
    let owner = SqliteUserRepository::try_new(&conn)
        .unwrap()
        .create_user("reader@example.com")
        .unwrap()
        .id;
    let repo = SqliteQuoteRepository::try_new(&conn).unwrap();

    let mut quote = Quote::new(owner, "text", "author");
    quote.position = -2;
    assert!(matches!(
        repo.create_quote(&quote),
        Err(RepoError::Validation(_))
    ));
    assert!(repo.list_quotes(owner).unwrap().is_empty());
}

#[test]
fn schedule_roundtrip_and_atomic_advance() {
    let conn = open_db_in_memory().unwrap();
    let owner = SqliteUserRepository::try_new(&conn)
        .unwrap()
        .create_user("reader@example.com")
        .unwrap()
        .id;
    let repo = SqliteScheduleRepository::try_new(&conn).unwrap();
    let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

    assert!(repo.find_schedule(owner).unwrap().is_none());
    let entry = ScheduleEntry::from_parts(owner, ids.clone(), 2).unwrap();
    repo.upsert_schedule(&entry).unwrap();
    assert_eq!(repo.find_schedule(owner).unwrap(), Some(entry));

    assert!(!repo.advance_past(owner, ids[0]).unwrap());
    assert!(repo.advance_past(owner, ids[2]).unwrap());
    let advanced = repo.find_schedule(owner).unwrap().unwrap();
    assert_eq!(advanced.next_index(), 0);
    assert_eq!(advanced.selected_quote_ids(), ids.as_slice());

    let mut shorter = advanced.clone();
    shorter.sync(false, ids[1]);
    repo.upsert_schedule(&shorter).unwrap();
    assert_eq!(repo.find_schedule(owner).unwrap(), Some(shorter));
    assert_eq!(repo.list_schedule_owners().unwrap(), vec![owner]);
}

#[test]
fn users_are_unique_by_normalized_email() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();

    let user = repo.create_user("  Reader@Example.COM ").unwrap();
    assert_eq!(user.email, "reader@example.com");
    assert!(matches!(
        repo.create_user("reader@example.com"),
        Err(RepoError::DuplicateEmail(_))
    ));
    assert!(matches!(
        repo.create_user("not-an-address"),
        Err(RepoError::InvalidUser(_))
    ));

    assert_eq!(
        repo.find_user_by_email("READER@example.com").unwrap(),
        Some(user.clone())
    );
    assert_eq!(repo.get_user(user.id).unwrap(), Some(user));
    assert!(repo.get_user(Uuid::new_v4()).unwrap().is_none());
}
