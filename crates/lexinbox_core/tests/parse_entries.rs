use lexinbox_core::pipeline::parse::{split_terms, ParseLineError};
use lexinbox_core::{parse_line, parse_lines, read_entries, FileQueueStore, QueueEntry, RetryPolicy};

fn texts(entries: &[QueueEntry]) -> Vec<&str> {
    entries.iter().map(|entry| entry.raw_text.as_str()).collect()
}

#[test]
fn mixed_payload_shapes_flatten_in_order() {
    let parsed = parse_lines([
        r#"{"ts":"2025-10-16T08:00:00","entries":["door, fax","calm"]}"#,
        r#"{"word":"  airport ","src":"phone"}"#,
        r#"{"entries":"rent; bill\nreceipt"}"#,
        r#"{"text":"I have to print this page."}"#,
    ]);

    assert!(parsed.skipped_lines.is_empty());
    assert_eq!(
        texts(&parsed.entries),
        vec![
            "door",
            "fax",
            "calm",
            "airport",
            "rent",
            "bill",
            "receipt",
            "I have to print this page.",
        ]
    );
    assert_eq!(
        parsed.entries[0].timestamp.as_deref(),
        Some("2025-10-16T08:00:00")
    );
    assert_eq!(parsed.entries[3].source_tag.as_deref(), Some("phone"));
    assert_eq!(parsed.entries[4].timestamp, None);
}

#[test]
fn entries_key_takes_precedence_over_word() {
    let entries = parse_line(r#"{"entries":["one"],"word":"two","text":"three"}"#).unwrap();
    assert_eq!(texts(&entries), vec!["one"]);

    let entries = parse_line(r#"{"word":"two","text":"three"}"#).unwrap();
    assert_eq!(texts(&entries), vec!["two"]);
}

#[test]
fn numeric_timestamp_is_kept_as_text() {
    let entries = parse_line(r#"{"word":"calm","ts":1760601600}"#).unwrap();
    assert_eq!(entries[0].timestamp.as_deref(), Some("1760601600"));
}

#[test]
fn bad_lines_are_skipped_without_failing_the_batch() {
    let parsed = parse_lines([
        r#"{"word":"calm"}"#,
        "not json",
        "",
        r#"["calm"]"#,
        r#"{"word":"   "}"#,
        r#"{"entries":[1,2]}"#,
        r#"{"word":"door"}"#,
    ]);

    assert_eq!(texts(&parsed.entries), vec!["calm", "door"]);
    assert_eq!(parsed.skipped_lines, vec![2, 4, 5, 6]);
}

#[test]
fn line_errors_are_specific() {
    assert!(matches!(
        parse_line("{oops"),
        Err(ParseLineError::InvalidJson(_))
    ));
    assert_eq!(parse_line("42"), Err(ParseLineError::NotAnObject));
    assert_eq!(parse_line(r#"{"other":"x"}"#), Err(ParseLineError::NoPayload));
}

#[test]
fn split_terms_drops_empty_pieces() {
    assert_eq!(split_terms(" a ,, b;\n\nc ;"), vec!["a", "b", "c"]);
}

#[test]
fn read_entries_of_missing_queue_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileQueueStore::new(
        dir.path().join("quick.jsonl"),
        dir.path().join("archive"),
        RetryPolicy::none(),
    );

    let parsed = read_entries(&store).unwrap();
    assert!(parsed.entries.is_empty());
    assert!(parsed.skipped_lines.is_empty());
}

#[test]
fn read_entries_reads_queue_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quick.jsonl");
    std::fs::write(&path, "{\"word\":\"calm\"}\n\n{\"entries\":\"door, fax\"}\n").unwrap();
    let store = FileQueueStore::new(&path, dir.path().join("archive"), RetryPolicy::none());

    let parsed = read_entries(&store).unwrap();
    assert_eq!(texts(&parsed.entries), vec!["calm", "door", "fax"]);
}
