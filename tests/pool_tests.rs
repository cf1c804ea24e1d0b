//! Entity pool semantics

use std::cell::Cell;
use traffic_control_sim::error::SimError;
use traffic_control_sim::simulation::{Pool, PoolEntity};

#[derive(Debug, Clone, PartialEq)]
struct Marker {
    id: u32,
    label: String,
}

impl PoolEntity for Marker {
    type Id = u32;

    fn id(&self) -> u32 {
        self.id
    }
}

fn marker(id: u32, label: &str) -> Marker {
    Marker {
        id,
        label: label.to_string(),
    }
}

#[test]
fn test_put_and_get() {
    let mut pool = Pool::new();
    assert!(pool.is_empty());

    pool.put(marker(3, "c")).unwrap();
    pool.put(marker(1, "a")).unwrap();
    pool.put(marker(2, "b")).unwrap();

    assert_eq!(pool.len(), 3);
    assert_eq!(pool.get(&1).map(|m| m.label.as_str()), Some("a"));
    assert!(pool.contains(&3));
    assert!(pool.get(&9).is_none());
    assert_eq!(pool.all().len(), 3);
}

#[test]
fn test_duplicate_id_is_rejected() {
    let mut pool = Pool::new();
    pool.put(marker(7, "first")).unwrap();

    let err = pool.put(marker(7, "second")).unwrap_err();
    assert_eq!(err, SimError::DuplicateId("7".to_string()));
    assert_eq!(pool.get(&7).map(|m| m.label.as_str()), Some("first"));
}

#[test]
fn test_iteration_is_sorted_by_id() {
    let mut pool = Pool::new();
    for id in [42, 5, 17, 0, 99] {
        pool.put(marker(id, "x")).unwrap();
    }

    assert_eq!(pool.ids(), vec![0, 5, 17, 42, 99]);
    let ids: Vec<u32> = pool.iter_sorted().map(|m| m.id).collect();
    assert_eq!(ids, vec![0, 5, 17, 42, 99]);
}

#[test]
fn test_pop_with_runs_release_once() {
    let mut pool = Pool::new();
    pool.put(marker(1, "a")).unwrap();
    let calls = Cell::new(0);

    let removed = pool
        .pop_with(&1, |_| {
            calls.set(calls.get() + 1);
            Ok::<(), SimError>(())
        })
        .unwrap();
    assert_eq!(removed, Some(marker(1, "a")));
    assert_eq!(calls.get(), 1);

    // Already gone: the hook must not run again
    let removed = pool
        .pop_with(&1, |_| {
            calls.set(calls.get() + 1);
            Ok::<(), SimError>(())
        })
        .unwrap();
    assert_eq!(removed, None);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_failed_release_still_removes() {
    let mut pool = Pool::new();
    pool.put(marker(4, "d")).unwrap();

    let result = pool.pop_with(&4, |_| Err("lane out of sync"));
    assert_eq!(result, Err("lane out of sync"));
    assert!(!pool.contains(&4));
}

#[test]
fn test_pop_and_clear() {
    let mut pool = Pool::new();
    pool.put(marker(1, "a")).unwrap();
    pool.put(marker(2, "b")).unwrap();

    assert_eq!(pool.pop(&1), Some(marker(1, "a")));
    assert_eq!(pool.pop(&1), None);
    assert_eq!(pool.len(), 1);

    pool.clear();
    assert!(pool.is_empty());
}

#[test]
fn test_hydrate_copies_through_factory() {
    let snapshot = vec![marker(1, "a"), marker(2, "b")];
    let mut pool = Pool::hydrate(&snapshot, |saved| {
        Ok(Marker {
            id: saved.id,
            label: saved.label.to_uppercase(),
        })
    })
    .unwrap();

    pool.get_mut(&1).unwrap().label.push('!');
    assert_eq!(pool.get(&1).map(|m| m.label.as_str()), Some("A!"));
    assert_eq!(snapshot[0].label, "a");
}

#[test]
fn test_hydrate_rejects_duplicates() {
    let snapshot = vec![marker(1, "a"), marker(1, "b")];
    let result = Pool::<Marker>::hydrate(snapshot, Ok);
    assert!(result.is_err());
}
