//! Record store persistence, legacy-shape decoding, and roster file tests.

use assert_fs::prelude::*;
use freshen_core::{
    roster::{self, FileRoster},
    store, Category, ClientId, Fingerprint, GenerationId, JsonFileStore, Payload, Record,
    RecordSink, RecordStore, RosterError, RosterSource, StoreError,
};
use predicates::prelude::predicate;
use rstest::rstest;
use serde_json::json;

fn love() -> Category {
    Category::from("love")
}

fn c1() -> ClientId {
    ClientId::from("c1")
}

fn record(fp: &str, id: u64, ts: i64) -> Record {
    let mut payload = Payload::new();
    payload.insert("msg1".to_string(), json!("abcdefghijklmn"));
    Record {
        client: c1(),
        category: love(),
        fingerprint: Fingerprint::from(fp),
        generation: GenerationId(id),
        timestamp: Some(ts),
        payload,
    }
}

// ---------------------------------------------------------------------------
// 1. Persistence
// ---------------------------------------------------------------------------

#[test]
fn upsert_persists_across_reopen() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = store::default_store_path_at(home.path());

    let mut opened = JsonFileStore::open_at(&path).expect("open");
    opened.upsert(record("h1", 2, 1_700_000_000_000)).expect("upsert h1");
    opened.upsert(record("h2", 2, 1_700_000_000_000)).expect("upsert h2");
    drop(opened);

    home.child(".freshen/store.json")
        .assert(predicate::path::exists());

    let reopened = JsonFileStore::open_at(&path).expect("reopen");
    let group = reopened.query_group(&c1(), &love()).expect("query");
    assert_eq!(group.len(), 2);
    assert!(group.iter().all(|r| r.generation == GenerationId(2)));
    assert_eq!(group[0].payload.get("msg1"), Some(&json!("abcdefghijklmn")));
}

#[test]
fn upsert_same_key_overwrites() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = home.path().join("store.json");

    let mut opened = JsonFileStore::open_at(&path).expect("open");
    opened.upsert(record("h1", 2, 100)).expect("first");
    opened.upsert(record("h1", 3, 200)).expect("second");

    let reopened = JsonFileStore::open_at(&path).expect("reopen");
    assert_eq!(reopened.len(), 1);
    let only = reopened.records().next().expect("record");
    assert_eq!(only.generation, GenerationId(3));
    assert_eq!(only.timestamp, Some(200));
}

// ---------------------------------------------------------------------------
// 2. Load shapes and errors
// ---------------------------------------------------------------------------

#[test]
fn loads_bare_array_export() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let file = home.child("export.json");
    file.write_str(
        r#"[
            {"client_id": "c1", "info_type": "love", "hashstr": "h1", "id": "4", "timestamp": 1700000000},
            {"client_id": "c1", "info_type": "letter", "hashstr": "h1", "id": 1}
        ]"#,
    )
    .expect("write");

    let opened = JsonFileStore::open_at(file.path()).expect("open");
    let love_group = opened.query_group(&c1(), &love()).expect("query");
    assert_eq!(love_group.len(), 1);
    assert_eq!(love_group[0].generation, GenerationId(4));

    let letter_group = opened
        .query_group(&c1(), &Category::from("letter"))
        .expect("query");
    assert_eq!(letter_group[0].timestamp, None);
}

#[test]
fn corrupt_store_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let file = home.child("store.json");
    file.write_str("{ not json").expect("write");

    let err = JsonFileStore::open_at(file.path()).unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("store.json"), "got: {err}");
}

#[rstest]
#[case::numeric_id(json!(5), json!(1700000000000_i64), 5, Some(1_700_000_000_000))]
#[case::string_id(json!("5"), json!("1700000000"), 5, Some(1_700_000_000))]
#[case::float_timestamp(json!(5), json!(1700000000.0), 5, Some(1_700_000_000))]
#[case::garbage_timestamp(json!(5), json!("yesterday"), 5, None)]
#[case::null_timestamp(json!(5), json!(null), 5, None)]
#[case::bool_timestamp(json!(5), json!(true), 5, None)]
#[case::object_timestamp(json!(5), json!({"$date": 1}), 5, None)]
fn lenient_attribute_decoding(
    #[case] id: serde_json::Value,
    #[case] timestamp: serde_json::Value,
    #[case] expected_id: u64,
    #[case] expected_ts: Option<i64>,
) {
    let record: Record = serde_json::from_value(json!({
        "client_id": "c1",
        "info_type": "love",
        "hashstr": "h1",
        "id": id,
        "timestamp": timestamp,
    }))
    .expect("deserialize");
    assert_eq!(record.generation, GenerationId(expected_id));
    assert_eq!(record.timestamp, expected_ts);
}

#[test]
fn odd_timestamp_does_not_poison_the_store() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let file = home.child("store.json");
    file.write_str(
        &json!([
            {"client_id": "c1", "info_type": "love", "hashstr": "h1", "id": 1, "timestamp": true},
            {"client_id": "c2", "info_type": "love", "hashstr": "h1", "id": 2, "timestamp": 1700000000}
        ])
        .to_string(),
    )
    .expect("write");

    let store = JsonFileStore::open_at(file.path()).expect("open");
    assert_eq!(store.len(), 2);
    let c2 = store
        .query_group(&ClientId::from("c2"), &Category::from("love"))
        .expect("query");
    assert_eq!(c2[0].timestamp, Some(1_700_000_000));
    let c1 = store.query_group(&c1(), &Category::from("love")).expect("query");
    assert_eq!(c1[0].timestamp, None);
}

// ---------------------------------------------------------------------------
// 3. Roster files
// ---------------------------------------------------------------------------

#[rstest]
#[case::wrapped(r#"{"client_ids": ["A", "B", "C"]}"#)]
#[case::bare(r#"["A", "B", "C"]"#)]
fn file_roster_accepts_both_shapes(#[case] body: &str) {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("roster.json");
    file.write_str(body).expect("write");

    let clients = FileRoster::new(file.path()).load().expect("load");
    assert_eq!(
        clients,
        vec![ClientId::from("A"), ClientId::from("B"), ClientId::from("C")]
    );
}

#[test]
fn missing_roster_file_is_io_error() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = roster::source_for(&dir.path().join("absent.json").display().to_string())
        .load()
        .unwrap_err();
    assert!(matches!(err, RosterError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("absent.json"));
}
