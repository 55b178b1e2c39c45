//! Processed-lemma ledger contracts and SQLite implementation.
//!
//! # Responsibility
//! - Answer "does lemma X already have a record" for dedup decisions.
//! - Persist enriched cards together with their ledger row.
//! - List ledger rows for operator inspection.
//!
//! # Invariants
//! - At most one ledger row per `lemma_key`.
//! - Existing rows are never updated or replaced.

use crate::db::DbError;
use crate::handoff::sink::{NoteSink, PersistOutcome, PersistRequest, SinkError};
use crate::model::item::lemma_key;
use chrono::NaiveDate;
use log::debug;
use rusqlite::{params, Connection, Row};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug)]
pub enum LedgerError {
    Db(DbError),
    InvalidData(String),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid ledger data: {message}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for LedgerError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Read capability the dedup filter needs from the downstream store.
pub trait Ledger {
    /// `lemma_key` must already be folded with [`lemma_key`].
    fn contains(&self, lemma_key: &str) -> LedgerResult<bool>;
}

/// In-memory snapshot of ledger keys.
impl Ledger for HashSet<String> {
    fn contains(&self, key: &str) -> LedgerResult<bool> {
        Ok(HashSet::contains(self, key))
    }
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub lemma_key: String,
    pub lemma: String,
    pub date_processed: NaiveDate,
}

/// SQLite-backed ledger.
pub struct SqliteLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLedger<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Inserts a ledger row unless the lemma is already recorded.
    ///
    /// Returns `true` when a new row was written.
    pub fn record(&self, lemma: &str, date_processed: NaiveDate) -> LedgerResult<bool> {
        insert_ledger_row(self.conn, lemma, date_processed)
    }

    /// Rows processed on `day`, in insertion order.
    pub fn records_on(&self, day: NaiveDate) -> LedgerResult<Vec<LedgerRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT lemma_key, lemma, date_processed
             FROM ledger
             WHERE date_processed = ?1
             ORDER BY created_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([day.format(DATE_FORMAT).to_string()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_ledger_row(row)?);
        }
        Ok(records)
    }

    /// Most recently inserted rows, newest first.
    pub fn recent(&self, limit: u32) -> LedgerResult<Vec<LedgerRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT lemma_key, lemma, date_processed
             FROM ledger
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1;",
        )?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_ledger_row(row)?);
        }
        Ok(records)
    }

    /// Loads every key into an in-memory snapshot.
    pub fn snapshot(&self) -> LedgerResult<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT lemma_key FROM ledger;")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(keys)
    }

    /// Number of cards stored for one lemma key.
    pub fn card_count(&self, key: &str) -> LedgerResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM cards WHERE lemma_key = ?1;",
            [key],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }
}

impl Ledger for SqliteLedger<'_> {
    fn contains(&self, key: &str) -> LedgerResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM ledger WHERE lemma_key = ?1);",
            [key],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

impl NoteSink for SqliteLedger<'_> {
    fn persist(&self, request: &PersistRequest<'_>) -> Result<PersistOutcome, SinkError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(LedgerError::from)?;
        let inserted = insert_ledger_row(&tx, &request.item.lemma, request.date)?;
        if !inserted {
            debug!(
                "event=card_persist module=ledger status=skip reason=already_recorded rule={}",
                request.item.rule_applied
            );
            return Ok(PersistOutcome::AlreadyRecorded);
        }

        tx.execute(
            "INSERT INTO cards (
                lemma_key,
                display_text,
                front,
                back,
                example,
                gloss,
                rule_applied,
                source_tag,
                date_added
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                request.item.key(),
                request.item.display_text.as_str(),
                request.card.front.as_str(),
                request.card.back.as_str(),
                request.card.example.as_str(),
                request.card.gloss.as_str(),
                request.item.rule_applied.as_str(),
                request.source_tag,
                request.date.format(DATE_FORMAT).to_string(),
            ],
        )
        .map_err(LedgerError::from)?;
        tx.commit().map_err(LedgerError::from)?;
        Ok(PersistOutcome::Recorded)
    }
}

fn insert_ledger_row(conn: &Connection, lemma: &str, date: NaiveDate) -> LedgerResult<bool> {
    let key = lemma_key(lemma);
    if key.is_empty() {
        return Err(LedgerError::InvalidData(
            "cannot record an empty lemma".to_string(),
        ));
    }
    let changed = conn.execute(
        "INSERT OR IGNORE INTO ledger (lemma_key, lemma, date_processed)
         VALUES (?1, ?2, ?3);",
        params![key, lemma.trim(), date.format(DATE_FORMAT).to_string()],
    )?;
    Ok(changed == 1)
}

fn parse_ledger_row(row: &Row<'_>) -> LedgerResult<LedgerRecord> {
    let date_text: String = row.get("date_processed")?;
    let date_processed = NaiveDate::parse_from_str(&date_text, DATE_FORMAT).map_err(|_| {
        LedgerError::InvalidData(format!(
            "invalid date `{date_text}` in ledger.date_processed"
        ))
    })?;
    Ok(LedgerRecord {
        lemma_key: row.get("lemma_key")?,
        lemma: row.get("lemma")?,
        date_processed,
    })
}
