use std::fs;
use std::sync::Once;

use outreach_core::{ContactRecord, MergeOutcome};
use outreach_engine::ContactStore;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(outreach_logging::initialize_for_tests);
}

fn record(name: &str, company: &str) -> ContactRecord {
    ContactRecord {
        full_name: name.to_string(),
        company_name: company.to_string(),
        user_id: format!("uid-{}", name.to_lowercase().replace(' ', "-")),
        ..ContactRecord::default()
    }
}

#[test]
fn insert_then_reopen_round_trips() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contacts.csv");

    let mut store = ContactStore::open(&path).unwrap();
    let mut jane = record("Jane Doe", "Acme, Casino \"Ltd\"");
    jane.introduction = "Reach me at jane@acme.example".to_string();
    assert_eq!(store.merge(jane.clone()).unwrap(), MergeOutcome::Inserted);
    assert_eq!(
        store.merge(record("John Roe", "Beta Bets")).unwrap(),
        MergeOutcome::Inserted
    );

    let reopened = ContactStore::open(&path).unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.records()[0], jane);
    assert_eq!(reopened.records()[1].full_name, "John Roe");
}

#[test]
fn merge_same_identity_is_duplicate() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contacts.csv");

    let mut store = ContactStore::open(&path).unwrap();
    store.merge(record("Jane Doe", "Acme Casino")).unwrap();

    // Same person, different rendering of the identity fields.
    let mut respelled = record("Jane Doe", "Acme Casino");
    respelled.full_name = "jane  doe".to_string();
    respelled.company_name = "ACME CASINO".to_string();
    let outcome = store.merge(respelled).unwrap();
    assert_eq!(outcome, MergeOutcome::Duplicate);
    assert_eq!(store.len(), 1);
    // The first-seen spelling stays.
    assert_eq!(store.records()[0].full_name, "Jane Doe");
}

#[test]
fn merge_with_new_fields_updates_and_persists() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contacts.csv");

    let mut store = ContactStore::open(&path).unwrap();
    store.merge(record("Jane Doe", "Acme Casino")).unwrap();

    let mut richer = record("Jane Doe", "Acme Casino");
    richer.position = "CEO".to_string();
    richer.country = "Malta".to_string();
    assert_eq!(store.merge(richer).unwrap(), MergeOutcome::Updated);

    let reopened = ContactStore::open(&path).unwrap();
    assert_eq!(reopened.records()[0].position, "CEO");
    assert_eq!(reopened.records()[0].country, "Malta");
}

#[test]
fn update_never_blanks_stored_fields() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contacts.csv");

    let mut store = ContactStore::open(&path).unwrap();
    let mut full = record("Jane Doe", "Acme Casino");
    full.email = "jane@acme.example".to_string();
    store.merge(full).unwrap();

    // A sparser sighting of the same person must not erase the email.
    let sparse = record("Jane Doe", "Acme Casino");
    assert_eq!(store.merge(sparse).unwrap(), MergeOutcome::Duplicate);

    let reopened = ContactStore::open(&path).unwrap();
    assert_eq!(reopened.records()[0].email, "jane@acme.example");
}

#[test]
fn known_identities_preload() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contacts.csv");

    let mut store = ContactStore::open(&path).unwrap();
    store.merge(record("Jane Doe", "Acme Casino")).unwrap();
    store.merge(record("John Roe", "Beta Bets")).unwrap();

    let reopened = ContactStore::open(&path).unwrap();
    let known = reopened.known_identities();
    assert_eq!(known.len(), 2);
    assert!(known.contains(&record("Jane Doe", "Acme Casino").identity_key()));
}

#[test]
fn missing_file_is_an_empty_store() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let store = ContactStore::open(dir.path().join("absent.csv")).unwrap();

    assert!(store.is_empty());
}

#[test]
fn malformed_row_is_rejected_with_line_number() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contacts.csv");

    let mut store = ContactStore::open(&path).unwrap();
    store.merge(record("Jane Doe", "Acme Casino")).unwrap();
    let mut content = fs::read_to_string(&path).unwrap();
    content.push_str("only,three,fields\n");
    fs::write(&path, content).unwrap();

    let err = ContactStore::open(&path).unwrap_err();
    assert!(err.to_string().contains("row 3"));
}

#[test]
fn legacy_duplicate_rows_collapse_on_load() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contacts.csv");

    // Two rows for the same identity, as an older tool might have left.
    let mut store = ContactStore::open(&path).unwrap();
    store.merge(record("Jane Doe", "Acme Casino")).unwrap();
    let mut content = fs::read_to_string(&path).unwrap();
    let mut row = vec![String::new(); 18];
    row[0] = "Jane Doe".to_string();
    row[1] = "Acme Casino".to_string();
    row[2] = "CEO".to_string();
    content.push_str(&row.join(","));
    content.push('\n');
    fs::write(&path, content).unwrap();

    let reopened = ContactStore::open(&path).unwrap();
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.records()[0].position, "CEO");
}
