use chrono::NaiveDate;
use lexinbox_core::db::migrations::latest_version;
use lexinbox_core::db::{open_db, open_db_in_memory, DbError};
use lexinbox_core::{
    EnrichedCard, Ledger, NormalizedItem, NoteSink, PersistOutcome, PersistRequest, RuleApplied,
    SqliteLedger,
};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "ledger");
    assert_table_exists(&conn, "cards");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("ledger.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    SqliteLedger::new(&conn_first)
        .record("calm", NaiveDate::from_ymd_opt(2025, 10, 16).unwrap())
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert!(SqliteLedger::new(&conn_second).contains("calm").unwrap());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn persist_writes_ledger_row_and_card_once() {
    let conn = open_db_in_memory().unwrap();
    let ledger = SqliteLedger::new(&conn);
    let item = NormalizedItem::new(
        "print",
        "I have to print this page.",
        RuleApplied::ToVerb,
    )
    .unwrap();
    let card = card("print");
    let request = PersistRequest {
        item: &item,
        card: &card,
        source_tag: Some("phone"),
        date: NaiveDate::from_ymd_opt(2025, 10, 16).unwrap(),
    };

    assert_eq!(ledger.persist(&request).unwrap(), PersistOutcome::Recorded);
    assert_eq!(
        ledger.persist(&request).unwrap(),
        PersistOutcome::AlreadyRecorded
    );

    assert!(ledger.contains("print").unwrap());
    assert_eq!(ledger.card_count("print").unwrap(), 1);
    let (rule, source): (String, Option<String>) = conn
        .query_row(
            "SELECT rule_applied, source_tag FROM cards WHERE lemma_key = 'print';",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(rule, "to-VERB");
    assert_eq!(source.as_deref(), Some("phone"));
}

#[test]
fn recent_lists_newest_rows_first() {
    let conn = open_db_in_memory().unwrap();
    let ledger = SqliteLedger::new(&conn);
    let day = NaiveDate::from_ymd_opt(2025, 10, 16).unwrap();
    for lemma in ["calm", "door", "fax"] {
        ledger.record(lemma, day).unwrap();
    }

    let recent: Vec<String> = ledger
        .recent(2)
        .unwrap()
        .into_iter()
        .map(|record| record.lemma)
        .collect();
    assert_eq!(recent, vec!["fax".to_string(), "door".to_string()]);

    let snapshot = ledger.snapshot().unwrap();
    assert_eq!(snapshot.len(), 3);
    assert!(snapshot.contains("door"));
}

#[test]
fn empty_lemma_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let ledger = SqliteLedger::new(&conn);
    assert!(ledger
        .record("   ", NaiveDate::from_ymd_opt(2025, 10, 16).unwrap())
        .is_err());
}

fn card(lemma: &str) -> EnrichedCard {
    EnrichedCard {
        front: lemma.to_string(),
        back: format!("meaning of {lemma}"),
        example: format!("Please {lemma} it."),
        gloss: "verb".to_string(),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
