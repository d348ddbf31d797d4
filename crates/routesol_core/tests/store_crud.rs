use routesol_core::{
    Channel, ConnectionManager, DeleteManyOutcome, DeleteScope, LogContext, RepoError,
    Restrictions, StoreId, StoreInput, StoreRecord, StoreService, StoreValidationError, Weekday,
    DEFAULT_STORES_NAMESPACE,
};
use rusqlite::Connection;
use serde_json::json;
use std::cell::Cell;
use tempfile::TempDir;

fn service() -> (TempDir, StoreService) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stores.sqlite3");
    let logs = LogContext::detached();
    let manager =
        ConnectionManager::new(path.to_str().unwrap(), logs.channel(Channel::Connection)).unwrap();
    (dir, StoreService::new(manager, DEFAULT_STORES_NAMESPACE, &logs))
}

fn row(id: serde_json::Value, name: &str, tail_lift: serde_json::Value) -> StoreInput {
    StoreInput {
        id,
        name: json!(name),
        address: json!(format!("{name} High Street")),
        postcode: json!("ZZ9 9ZZ"),
        distance_km: json!(10.5),
        requires_tail_lift: tail_lift,
    }
}

/// Deterministic distances spread over `[-500, 1500)` with full mantissas.
fn generated_distances(count: usize) -> Vec<f64> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
            unit * 2000.0 - 500.0
        })
        .collect()
}

fn acme() -> StoreInput {
    StoreInput {
        id: json!(1),
        name: json!("Acme"),
        address: json!("1 Main St"),
        postcode: json!("AB1 2CD"),
        distance_km: json!(4.2),
        requires_tail_lift: json!(true),
    }
}

#[test]
fn insert_then_find_returns_equal_record() {
    let (_dir, stores) = service();

    let id = stores.insert_one(&acme()).unwrap();
    assert_eq!(id, StoreId::Int(1));

    let found = stores.find_by_id(&StoreId::Int(1)).unwrap().unwrap();
    assert_eq!(found, acme().to_record().unwrap());
    assert_eq!(StoreInput::from(&found), acme());
}

#[test]
fn distances_read_back_bit_exact_after_insert_and_update() {
    let (_dir, stores) = service();
    let distances = generated_distances(400);

    for (index, distance) in distances.iter().enumerate() {
        let record = StoreRecord::new(
            StoreId::Int(index as i64),
            format!("Store {index}"),
            "1 Depot Road",
            "AB1 2CD",
            *distance,
            index % 2 == 0,
        );
        stores.insert_record(&record).unwrap();
    }

    let mut restrictions = Restrictions::new();
    restrictions.insert(Weekday::Tuesday, "07:00-09:00".to_string());

    for (index, distance) in distances.iter().enumerate() {
        let id = StoreId::Int(index as i64);
        let inserted = stores.find_by_id(&id).unwrap().unwrap();
        assert_eq!(
            inserted.distance_km.to_bits(),
            distance.to_bits(),
            "after insert: stored {distance} read back {}",
            inserted.distance_km
        );

        stores.update_restrictions(&id, &restrictions).unwrap();
        let updated = stores.find_by_id(&id).unwrap().unwrap();
        assert_eq!(
            updated.distance_km.to_bits(),
            distance.to_bits(),
            "after update: stored {distance} read back {}",
            updated.distance_km
        );
        assert_eq!(
            StoreRecord {
                restrictions: None,
                ..updated
            },
            inserted
        );
    }
}

#[test]
fn undecodable_store_document_is_unexpected_error() {
    let (dir, stores) = service();
    stores.insert_one(&acme()).unwrap();

    let conn = Connection::open(dir.path().join("stores.sqlite3")).unwrap();
    conn.execute(
        "INSERT INTO documents (namespace, collection, doc_id, body)
         VALUES (?1, 'Stores', 2, '{\"name\": 5, \"requires_tail_lift\": \"maybe\"}');",
        [DEFAULT_STORES_NAMESPACE],
    )
    .unwrap();
    drop(conn);

    let err = stores.find_by_id(&StoreId::Int(2)).unwrap_err();
    assert!(matches!(err, RepoError::Unexpected(_)), "unexpected error: {err}");
    let err = stores.find_all().unwrap_err();
    assert!(matches!(err, RepoError::Unexpected(_)), "unexpected error: {err}");

    assert!(stores.find_by_id(&StoreId::Int(1)).unwrap().is_some());
}

#[test]
fn acme_lifecycle_insert_find_delete() {
    let (_dir, stores) = service();

    stores.insert_one(&acme()).unwrap();
    assert!(stores.find_by_id(&StoreId::parse("1").unwrap()).unwrap().is_some());

    assert_eq!(stores.delete_one(&StoreId::Int(1)).unwrap(), 1);
    assert!(stores.find_by_id(&StoreId::Int(1)).unwrap().is_none());
}

#[test]
fn missing_ids_are_values_not_errors() {
    let (_dir, stores) = service();

    assert!(stores.find_by_id(&StoreId::Int(404)).unwrap().is_none());
    assert_eq!(stores.delete_one(&StoreId::Int(404)).unwrap(), 0);
    assert_eq!(
        stores
            .delete_one(&StoreId::Native("missing".to_string()))
            .unwrap(),
        0
    );
    assert!(stores.find_all().unwrap().is_empty());
}

#[test]
fn integer_and_native_ids_do_not_collide() {
    let (_dir, stores) = service();

    stores.insert_one(&acme()).unwrap();
    stores
        .insert_record(&StoreRecord::new(
            StoreId::parse("abc").unwrap(),
            "Native",
            "2 Side St",
            "CD3 4EF",
            1.5,
            false,
        ))
        .unwrap();

    assert_eq!(
        stores
            .find_by_id(&StoreId::Native("1".to_string()))
            .unwrap(),
        None
    );
    assert_eq!(
        stores
            .find_by_id(&StoreId::Native("abc".to_string()))
            .unwrap()
            .unwrap()
            .name,
        "Native"
    );
}

#[test]
fn duplicate_id_is_conflict() {
    let (_dir, stores) = service();

    stores.insert_one(&acme()).unwrap();
    let err = stores.insert_one(&acme()).unwrap_err();
    assert!(matches!(err, RepoError::Conflict(StoreId::Int(1))));
    assert_eq!(stores.find_all().unwrap().len(), 1);
}

#[test]
fn non_boolean_tail_lift_is_validation_error() {
    let (_dir, stores) = service();

    let err = stores
        .insert_one(&row(json!(9), "Bad", json!("true")))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(StoreValidationError::WrongType {
            field: "requires_tail_lift",
            ..
        })
    ));
    assert!(stores.find_all().unwrap().is_empty());
}

#[test]
fn insert_many_skips_bad_rows_and_keeps_going() {
    let (_dir, stores) = service();

    let report = stores
        .insert_many(vec![
            row(json!(1), "First", json!(true)),
            row(json!(2), "Second", json!("no")),
            row(json!(3), "Third", json!(false)),
        ])
        .unwrap();

    assert_eq!(report.inserted, vec![StoreId::Int(1), StoreId::Int(3)]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].row, 2);
    assert!(matches!(report.failures[0].error, RepoError::Validation(_)));
    assert_eq!(report.attempted(), 3);

    let names: Vec<String> = stores
        .find_all()
        .unwrap()
        .into_iter()
        .map(|record| record.name)
        .collect();
    assert_eq!(names, vec!["First", "Third"]);
}

#[test]
fn insert_many_reports_conflicts_per_row() {
    let (_dir, stores) = service();
    stores.insert_one(&acme()).unwrap();

    let report = stores
        .insert_many(vec![
            row(json!(1), "Clash", json!(true)),
            row(json!(null), "Generated", json!(true)),
        ])
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, RepoError::Conflict(_)));
    assert!(matches!(report.inserted[0], StoreId::Native(_)));
    assert_eq!(stores.find_all().unwrap().len(), 2);
}

#[test]
fn delete_many_requires_confirmation() {
    let (_dir, stores) = service();
    stores
        .insert_many(vec![
            row(json!(1), "One", json!(true)),
            row(json!(2), "Two", json!(true)),
        ])
        .unwrap();

    let seen = Cell::new(0);
    let outcome = stores
        .delete_many(&DeleteScope::All, |count| {
            seen.set(count);
            false
        })
        .unwrap();
    assert_eq!(seen.get(), 2);
    assert_eq!(outcome, DeleteManyOutcome::Cancelled { remaining: 2 });
    assert_eq!(stores.find_all().unwrap().len(), 2);

    let outcome = stores.delete_many(&DeleteScope::All, |_| true).unwrap();
    assert_eq!(outcome, DeleteManyOutcome::Deleted(2));
    assert!(stores.find_all().unwrap().is_empty());
}

#[test]
fn delete_many_rejects_partial_criteria() {
    let (_dir, stores) = service();
    stores.insert_one(&acme()).unwrap();

    let outcome = stores
        .delete_many(&DeleteScope::parse("name=Acme"), |_| {
            panic!("confirmation must not be requested for unsupported criteria")
        })
        .unwrap();
    assert_eq!(
        outcome,
        DeleteManyOutcome::Unsupported {
            criteria: "name=Acme".to_string(),
            remaining: 1,
        }
    );
    assert_eq!(stores.find_all().unwrap().len(), 1);
}

#[test]
fn delete_many_on_empty_collection_deletes_zero() {
    let (_dir, stores) = service();

    let outcome = stores.delete_many(&DeleteScope::All, |_| true).unwrap();
    assert_eq!(outcome, DeleteManyOutcome::Deleted(0));
}

#[test]
fn update_restrictions_changes_only_restrictions() {
    let (_dir, stores) = service();
    stores.insert_one(&acme()).unwrap();
    let before = stores.find_by_id(&StoreId::Int(1)).unwrap().unwrap();

    let mut restrictions = Restrictions::new();
    restrictions.insert(Weekday::Monday, "06:00-10:00".to_string());
    restrictions.insert(Weekday::Saturday, "no deliveries".to_string());
    stores
        .update_restrictions(&StoreId::Int(1), &restrictions)
        .unwrap();

    let after = stores.find_by_id(&StoreId::Int(1)).unwrap().unwrap();
    assert_eq!(after.restrictions.as_ref(), Some(&restrictions));
    assert_eq!(
        StoreRecord {
            restrictions: None,
            ..after
        },
        before
    );
}

#[test]
fn update_restrictions_on_missing_record_is_not_found() {
    let (_dir, stores) = service();

    let mut restrictions = Restrictions::new();
    restrictions.insert(Weekday::Friday, "after 14:00".to_string());
    let err = stores
        .update_restrictions(&StoreId::Int(77), &restrictions)
        .unwrap_err();

    assert!(matches!(err, RepoError::NotFound(StoreId::Int(77))));
    assert!(stores.find_all().unwrap().is_empty());
}

#[test]
fn unreachable_store_surfaces_connectivity_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent").join("stores.sqlite3");
    let logs = LogContext::detached();
    let manager =
        ConnectionManager::new(path.to_str().unwrap(), logs.channel(Channel::Connection)).unwrap();
    let stores = StoreService::new(manager, DEFAULT_STORES_NAMESPACE, &logs);

    let err = stores.find_all().unwrap_err();
    assert!(err.is_connectivity(), "unexpected error: {err}");

    let validation = stores
        .insert_one(&row(json!(1), "Bad", json!(1)))
        .unwrap_err();
    assert!(matches!(validation, RepoError::Validation(_)));
}
