use chrono::NaiveDate;
use lexinbox_core::db::open_db_in_memory;
use lexinbox_core::{
    filter_batch, DedupDecision, DuplicateFilter, DuplicateSource, LemmaNormalizer,
    NormalizedItem, RuleApplied, SqliteLedger,
};
use std::collections::HashSet;

fn item(lemma: &str) -> NormalizedItem {
    NormalizedItem::new(lemma, lemma, RuleApplied::ShortPhrase).unwrap()
}

fn lemmas(items: &[NormalizedItem]) -> Vec<&str> {
    items.iter().map(|item| item.lemma.as_str()).collect()
}

#[test]
fn batch_duplicates_compare_case_and_whitespace_insensitively() {
    let ledger: HashSet<String> = HashSet::new();
    let mut filter = DuplicateFilter::new(&ledger);

    assert_eq!(filter.check(&item("Romantic date")).unwrap(), DedupDecision::Accept);
    assert_eq!(
        filter.check(&item("romantic   DATE")).unwrap(),
        DedupDecision::Duplicate(DuplicateSource::Batch)
    );
    assert_eq!(filter.accepted_len(), 1);
}

#[test]
fn ledger_rows_reject_items_from_earlier_runs() {
    let conn = open_db_in_memory().unwrap();
    let ledger = SqliteLedger::new(&conn);
    let day = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
    assert!(ledger.record("Calm", day).unwrap());

    let mut filter = DuplicateFilter::new(&ledger);
    assert_eq!(
        filter.check(&item("calm")).unwrap(),
        DedupDecision::Duplicate(DuplicateSource::Ledger)
    );
    assert_eq!(filter.check(&item("door")).unwrap(), DedupDecision::Accept);
}

#[test]
fn filtering_is_idempotent_for_the_same_batch_and_ledger() {
    let ledger: HashSet<String> = ["fax".to_string()].into_iter().collect();
    let normalizer = LemmaNormalizer::default();
    let batch: Vec<NormalizedItem> = [
        "calm",
        "we will be at the airport",
        "Calm",
        "fax",
        "I have to print this page.",
        "Flight to Airport.",
    ]
    .iter()
    .filter_map(|text| normalizer.normalize(text).item().cloned())
    .collect();

    let first = filter_batch(&ledger, &batch).unwrap();
    let second = filter_batch(&ledger, &batch).unwrap();

    assert_eq!(first, second);
    assert_eq!(lemmas(&first), vec!["calm", "airport", "print", "Flight to Airport."]);
}

#[test]
fn recording_the_same_lemma_twice_keeps_one_row() {
    let conn = open_db_in_memory().unwrap();
    let ledger = SqliteLedger::new(&conn);
    let first_day = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
    let second_day = NaiveDate::from_ymd_opt(2025, 10, 16).unwrap();

    assert!(ledger.record("Romantic date", first_day).unwrap());
    assert!(!ledger.record(" romantic  date ", second_day).unwrap());

    let rows = ledger.records_on(first_day).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].lemma, "Romantic date");
    assert_eq!(rows[0].lemma_key, "romantic date");
    assert!(ledger.records_on(second_day).unwrap().is_empty());
}
