use popauth::models::SessionRecord;
use popauth::session::store::{
    current_user, is_logged_in, keys, logout, persist_user, FileStore, SessionStore, StoreError,
};
use serde_json::json;
use std::sync::Arc;
use std::thread;

#[test]
fn test_file_store_round_trips_the_backend_record_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let record = SessionRecord::new(json!({"id": 1, "email": "a@x.com", "roles": ["user"]}));

    persist_user(&store, &record).unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("user.json")).unwrap(),
        r#"{"id":1,"email":"a@x.com","roles":["user"]}"#
    );
    assert_eq!(current_user(&store).unwrap(), Some(record));
    assert!(is_logged_in(&store).unwrap());
}

#[test]
fn test_file_store_survives_a_new_instance() {
    let dir = tempfile::tempdir().unwrap();
    persist_user(
        &FileStore::new(dir.path()),
        &SessionRecord::new(json!({"id": 1})),
    )
    .unwrap();

    let reopened = FileStore::new(dir.path());
    assert_eq!(
        reopened.read(keys::USER).unwrap().as_deref(),
        Some(r#"{"id":1}"#)
    );
}

#[test]
fn test_missing_directory_reads_as_logged_out() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("not-created-yet"));

    assert!(!is_logged_in(&store).unwrap());
    assert_eq!(current_user(&store).unwrap(), None);
    logout(&store).unwrap();
}

#[test]
fn test_logout_removes_only_the_user_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    store.write("preferences", r#"{"theme":"dark"}"#).unwrap();
    persist_user(&store, &SessionRecord::new(json!({"id": 1}))).unwrap();

    logout(&store).unwrap();

    assert!(!dir.path().join("user.json").exists());
    assert!(store.read("preferences").unwrap().is_some());
}

#[test]
fn test_invalid_keys_never_touch_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("store"));

    assert!(matches!(
        store.write("../escape", "x"),
        Err(StoreError::InvalidKey(_))
    ));
    assert!(!dir.path().join("escape.json").exists());
    assert!(!dir.path().join("store").exists());
}

#[test]
fn test_concurrent_writers_leave_one_complete_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));

    let writers: Vec<_> = (0..8)
        .map(|id| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let record =
                    SessionRecord::new(json!({"id": id, "email": format!("user{id}@x.com")}));
                for _ in 0..20 {
                    persist_user(store.as_ref(), &record).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let record = current_user(store.as_ref()).unwrap().unwrap();
    let id = record.as_value()["id"].as_i64().unwrap();
    assert_eq!(record.email(), Some(format!("user{id}@x.com").as_str()));

    // Only the record itself is left behind, no temporary files
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("user.json")]);
}
