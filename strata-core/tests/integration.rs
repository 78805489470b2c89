//! Integration Tests for the Store
//!
//! These tests drive atoms, signals, updates and subscribers together
//! through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use strata_core::{
    Atom, AtomContext, ReentrancyPolicy, SharedUpdate, Signal, Store, StoreConfig, StoreError,
    Update,
};

#[derive(Debug, Clone, PartialEq)]
struct Counter {
    value: i32,
}

fn counter_atom() -> Atom<Counter> {
    Atom::new("counter", Counter { value: 0 })
}

fn add(signal: &Signal<i32>, counter: &Atom<Counter>) -> Update<Atom<Counter>, i32> {
    Update::new(signal, counter.clone(), |counter, by| counter.value += by)
}

/// Count how often a callback runs.
fn counting() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    (calls, move || {
        calls_clone.fetch_add(1, Ordering::SeqCst);
    })
}

/// Overlapping retainers share one context; releasing both discards it.
#[test]
fn reference_stability_under_overlapping_retainers() {
    let counter = counter_atom();
    let store = Store::new();

    let first = store.retain(&counter);
    let second = store.retain(&counter);
    let context = store.resolve_atom(&counter);
    assert!(AtomContext::ptr_eq(&context, &store.resolve_atom(&counter)));

    first.release();
    assert!(AtomContext::ptr_eq(&context, &store.resolve_atom(&counter)));

    second.release();
    let fresh = store.resolve_atom(&counter);
    assert!(!AtomContext::ptr_eq(&context, &fresh));
    assert!(Arc::ptr_eq(&fresh.snapshot(), counter.initial_state()));
}

/// A committed update persists in the retained atom.
#[test]
fn commit_applies_and_persists() {
    let counter = counter_atom();
    let increment = Signal::<i32>::new("counter.increment");
    let store = Store::new();

    let _retainer = store.retain(&counter);
    let _update = store.register_update(add(&increment, &counter)).unwrap();

    store.commit(increment.create(5)).unwrap();
    assert_eq!(*store.resolve_atom(&counter).snapshot(), Counter { value: 5 });

    store.commit(increment.create(2)).unwrap();
    assert_eq!(store.resolve_atom(&counter).snapshot().value, 7);
}

/// Registrations sharing an id run once and live until the last release.
#[test]
fn deduplication_by_id() {
    let counter = counter_atom();
    let increment = Signal::<i32>::new("counter.increment");
    let store = Store::new();
    let _retainer = store.retain(&counter);

    let update = add(&increment, &counter);
    let first = store.register_update(update.clone()).unwrap();
    let second = store.register_update(update).unwrap();
    assert_eq!(store.handler_count(&increment), 1);

    store.commit(increment.create(1)).unwrap();
    assert_eq!(store.resolve_atom(&counter).snapshot().value, 1);

    first.release();
    store.commit(increment.create(1)).unwrap();
    assert_eq!(store.resolve_atom(&counter).snapshot().value, 2);

    second.release();
    store.commit(increment.create(1)).unwrap();
    assert_eq!(store.resolve_atom(&counter).snapshot().value, 2);
    assert_eq!(store.handler_count(&increment), 0);
}

/// Updates bound from one shared update deduplicate across attachment points.
#[test]
fn shared_update_runs_once() {
    let counter = counter_atom();
    let increment = SharedUpdate::new(Signal::<i32>::new("counter.increment"));
    let store = Store::new();
    let _retainer = store.retain(&counter);

    let runs = Arc::new(AtomicUsize::new(0));
    let attach = |runs: Arc<AtomicUsize>| {
        increment.bind(counter.clone(), move |counter, by| {
            runs.fetch_add(1, Ordering::SeqCst);
            counter.value += by;
        })
    };

    let first = store.register_update(attach(runs.clone())).unwrap();
    let second = store.register_update(attach(runs.clone())).unwrap();

    store.commit(increment.signal().create(5)).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(store.resolve_atom(&counter).snapshot().value, 5);

    drop(first);
    drop(second);
    store.commit(increment.signal().create(5)).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// The newest registration under an id replaces the stored handler.
#[test]
fn reregistration_uses_newest_handler() {
    let counter = counter_atom();
    let increment = Signal::<i32>::new("counter.increment");
    let store = Store::new();
    let _retainer = store.retain(&counter);

    let id = strata_core::UpdateId::new();
    let _old = store
        .register_update(Update::with_id(id, &increment, counter.clone(), |c, by| {
            c.value += by
        }))
        .unwrap();
    let _new = store
        .register_update(Update::with_id(id, &increment, counter.clone(), |c, by| {
            c.value += by * 10
        }))
        .unwrap();

    store.commit(increment.create(1)).unwrap();
    assert_eq!(store.resolve_atom(&counter).snapshot().value, 10);
}

/// Committing a signal nobody handles is silent.
#[test]
fn commit_without_handlers_is_noop() {
    let counter = counter_atom();
    let increment = Signal::<i32>::new("counter.increment");
    let unrelated = Signal::<()>::new("unrelated");
    let store = Store::new();

    let _retainer = store.retain(&counter);
    let before = store.resolve_atom(&counter).snapshot();
    let (calls, callback) = counting();
    let _watch = store.watch(&counter, callback);

    store.commit(unrelated.create(())).unwrap();
    store.commit(increment.create(3)).unwrap();

    assert!(Arc::ptr_eq(&before, &store.resolve_atom(&counter).snapshot()));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// A handler that leaves the value unchanged does not notify.
#[test]
fn notification_is_change_gated() {
    let counter = counter_atom();
    let increment = Signal::<i32>::new("counter.increment");
    let store = Store::new();

    let _retainer = store.retain(&counter);
    let _update = store.register_update(add(&increment, &counter)).unwrap();
    let (calls, callback) = counting();
    let _watch = store.watch(&counter, callback);

    let before = store.resolve_atom(&counter).snapshot();
    store.commit(increment.create(0)).unwrap();
    assert!(Arc::ptr_eq(&before, &store.resolve_atom(&counter).snapshot()));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    store.commit(increment.create(1)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// A conflicting registration fails and leaves the first handler in charge.
#[test]
fn conflict_rejection() {
    let counter = counter_atom();
    let increment = Signal::<i32>::new("counter.increment");
    let store = Store::with_config(StoreConfig::default().with_conflict_checks(true));
    let _retainer = store.retain(&counter);

    let _a = store.register_update(add(&increment, &counter)).unwrap();
    let b = Update::new(&increment, counter.clone(), |counter, by| counter.value *= by);

    let error = store.register_update(b).unwrap_err();
    assert!(matches!(error, StoreError::ConfigurationConflict { .. }));
    let message = error.to_string();
    assert!(message.contains("counter.increment"));
    assert!(message.contains("`counter`"));

    store.commit(increment.create(3)).unwrap();
    assert_eq!(store.resolve_atom(&counter).snapshot().value, 3);
}

/// Disjoint sources on one signal, and shared sources on different signals,
/// do not conflict.
#[test]
fn non_overlapping_updates_coexist() {
    let left = Atom::new("left", 0);
    let right = Atom::new("right", 0);
    let bump = Signal::<i32>::new("bump");
    let reset = Signal::<()>::new("reset");
    let store = Store::with_config(StoreConfig::default().with_conflict_checks(true));
    let _retainer = store.retain_all(&(left.clone(), right.clone()));

    let _l = store
        .register_update(Update::new(&bump, left.clone(), |n, by| **n += by))
        .unwrap();
    let _r = store
        .register_update(Update::new(&bump, right.clone(), |n, by| **n += by * 2))
        .unwrap();
    let _reset = store
        .register_update(Update::new(&reset, vec![left.clone(), right.clone()], |all, _| {
            for n in all.iter_mut() {
                n.set(0);
            }
        }))
        .unwrap();

    store.commit(bump.create(2)).unwrap();
    assert_eq!(*store.resolve_atom(&left).snapshot(), 2);
    assert_eq!(*store.resolve_atom(&right).snapshot(), 4);

    store.commit(reset.create(())).unwrap();
    assert_eq!(*store.resolve_atom(&left).snapshot(), 0);
    assert_eq!(*store.resolve_atom(&right).snapshot(), 0);
}

/// Released subscribers are not called.
#[test]
fn released_watch_is_not_called() {
    let counter = counter_atom();
    let increment = Signal::<i32>::new("counter.increment");
    let store = Store::new();

    let _retainer = store.retain(&counter);
    let _update = store.register_update(add(&increment, &counter)).unwrap();
    let (calls, callback) = counting();
    let watch = store.watch(&counter, callback);

    store.commit(increment.create(1)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    watch.release();
    store.commit(increment.create(1)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Each (atom, subscriber) pair is notified once per commit, after every
/// update has applied.
#[test]
fn notification_runs_once_after_all_updates() {
    let counter = counter_atom();
    let log = Atom::new("log", Vec::<String>::new());
    let increment = Signal::<i32>::new("counter.increment");

    // Checks off so two ids may write the same atom.
    let store = Store::with_config(StoreConfig::default().with_conflict_checks(false));
    let _retainer = store.retain_all(&(counter.clone(), log.clone()));

    let _first = store.register_update(add(&increment, &counter)).unwrap();
    let _second = store.register_update(add(&increment, &counter)).unwrap();
    let _logger = store
        .register_update(Update::new(&increment, log.clone(), |log, by| {
            log.push(format!("+{by}"))
        }))
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let _watch = {
        let store_clone = store.clone();
        let counter = counter.clone();
        let log = log.clone();
        let seen = seen.clone();
        store.watch(&counter.clone(), move || {
            let value = store_clone.resolve_atom(&counter).snapshot().value;
            let entries = store_clone.resolve_atom(&log).snapshot().len();
            seen.lock().push((value, entries));
        })
    };

    store.commit(increment.create(2)).unwrap();
    assert_eq!(*seen.lock(), vec![(4, 1)]);
}

/// Updates see the state left by the updates that ran before them.
#[test]
fn updates_apply_in_registration_order() {
    let a = Atom::new("a", 1);
    let b = Atom::new("b", 0);
    let tick = Signal::<()>::new("tick");
    let store = Store::new();
    let _retainer = store.retain_all(&vec![a.clone(), b.clone()]);

    let order = Arc::new(Mutex::new(Vec::new()));
    let first_order = order.clone();
    let second_order = order.clone();

    let _first = store
        .register_update(Update::new(&tick, b.clone(), move |_, _| {
            first_order.lock().push("b")
        }))
        .unwrap();
    let _second = store
        .register_update(Update::new(&tick, a.clone(), move |_, _| {
            second_order.lock().push("a")
        }))
        .unwrap();

    store.commit(tick.create(())).unwrap();
    assert_eq!(*order.lock(), vec!["b", "a"]);
}

/// Multi-source handlers receive drafts positionally.
#[test]
fn tuple_sources_transfer_between_atoms() {
    let from = Atom::new("from", 10_u32);
    let to = Atom::new("to", String::from("balance: 0"));
    let transfer = Signal::<u32>::new("transfer");
    let store = Store::new();
    let _retainer = store.retain_all(&(from.clone(), to.clone()));

    let _update = store
        .register_update(Update::new(
            &transfer,
            (from.clone(), to.clone()),
            |(from, to), amount| {
                **from -= amount;
                to.set(format!("balance: {amount}"));
            },
        ))
        .unwrap();

    let (calls, callback) = counting();
    let _watch = store.watch(&to, callback);

    store.commit(transfer.create(4)).unwrap();
    assert_eq!(*store.resolve_atom(&from).snapshot(), 6);
    assert_eq!(*store.resolve_atom(&to).snapshot(), "balance: 4");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Retainers taken through clones of one atom count toward one context.
#[test]
fn independent_retainers_do_not_interfere() {
    let counter = counter_atom();
    let alias = counter.clone();
    let store = Store::new();

    let a = store.retain(&counter);
    let b = store.retain(&alias);
    drop(a);
    assert!(store.is_tracked(&counter));
    drop(b);
    assert!(!store.is_tracked(&counter));
}

/// Re-entrant commits are rejected by default.
#[test]
fn reentrant_commit_is_rejected() {
    let counter = counter_atom();
    let increment = Signal::<i32>::new("counter.increment");
    let store = Store::new();
    let _retainer = store.retain(&counter);
    let _update = store.register_update(add(&increment, &counter)).unwrap();

    let outcome = Arc::new(Mutex::new(None));
    let _watch = {
        let store_clone = store.clone();
        let increment = increment.clone();
        let outcome = outcome.clone();
        store.watch(&counter, move || {
            let result = store_clone.commit(increment.create(100));
            *outcome.lock() = Some(result.map_err(|error| error.to_string()));
        })
    };

    store.commit(increment.create(1)).unwrap();

    let outcome = outcome.lock().clone().unwrap();
    assert!(outcome.unwrap_err().contains("re-entrant"));
    assert_eq!(store.resolve_atom(&counter).snapshot().value, 1);
    assert!(!store.is_committing());
}

/// With the queue policy, re-entrant commits apply after the current one.
#[test]
fn reentrant_commit_is_queued() {
    let counter = counter_atom();
    let increment = Signal::<i32>::new("counter.increment");
    let store = Store::with_config(StoreConfig::default().with_reentrancy(ReentrancyPolicy::Queue));
    let _retainer = store.retain(&counter);
    let _update = store.register_update(add(&increment, &counter)).unwrap();

    let values = Arc::new(Mutex::new(Vec::new()));
    let _watch = {
        let store_clone = store.clone();
        let counter = counter.clone();
        let increment = increment.clone();
        let values = values.clone();
        store.watch(&counter.clone(), move || {
            let value = store_clone.resolve_atom(&counter).snapshot().value;
            values.lock().push(value);
            if value < 3 {
                store_clone.commit(increment.create(1)).unwrap();
            }
        })
    };

    store.commit(increment.create(1)).unwrap();
    assert_eq!(*values.lock(), vec![1, 2, 3]);
    assert_eq!(store.resolve_atom(&counter).snapshot().value, 3);
}

/// Separate stores keep separate state and may commit into each other.
#[test]
fn stores_are_independent() {
    let counter = counter_atom();
    let increment = Signal::<i32>::new("counter.increment");
    let first = Store::new();
    let second = Store::new();

    let _r1 = first.retain(&counter);
    let _r2 = second.retain(&counter);
    let _u1 = first.register_update(add(&increment, &counter)).unwrap();
    let _u2 = second.register_update(add(&increment, &counter)).unwrap();

    let _forward = {
        let second = second.clone();
        let increment = increment.clone();
        first.watch(&counter, move || {
            second.commit(increment.create(10)).unwrap();
        })
    };

    first.commit(increment.create(1)).unwrap();
    assert_eq!(first.resolve_atom(&counter).snapshot().value, 1);
    assert_eq!(second.resolve_atom(&counter).snapshot().value, 10);
}

/// Configuration loads from JSON.
#[test]
fn config_from_json() {
    let config = StoreConfig::from_json(r#"{ "check_conflicts": true, "reentrancy": "queue" }"#)
        .unwrap();
    let store = Store::with_config(config.clone());

    assert_eq!(store.config(), &config);
    assert!(StoreConfig::from_json("not json").is_err());
}

/// Commits from several threads apply every update exactly once.
#[test]
fn concurrent_commits_are_serialized() {
    const THREADS: i32 = 4;
    const COMMITS: i32 = 2_000;

    let counter = counter_atom();
    let increment = Signal::<i32>::new("counter.increment");
    let store = Store::new();

    let _retainer = store.retain(&counter);
    let _update = store.register_update(add(&increment, &counter)).unwrap();
    let (calls, callback) = counting();
    let _watch = store.watch(&counter, callback);

    std::thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..COMMITS {
                    store.commit(increment.create(1)).unwrap();
                }
            });
        }
    });

    assert_eq!(store.resolve_atom(&counter).snapshot().value, THREADS * COMMITS);
    assert_eq!(calls.load(Ordering::SeqCst), (THREADS * COMMITS) as usize);
}

/// An update whose source nobody retains runs without error, but only the
/// retained atoms of the commit keep its result or notify.
#[test]
fn untracked_source_in_shared_commit() {
    let tracked = counter_atom();
    let untracked = Atom::new("scratch", Counter { value: 0 });
    let increment = Signal::<i32>::new("counter.increment");
    let store = Store::new();

    let _retainer = store.retain(&tracked);
    let _a = store.register_update(add(&increment, &tracked)).unwrap();
    let _b = store.register_update(add(&increment, &untracked)).unwrap();

    let (tracked_calls, on_tracked) = counting();
    let (untracked_calls, on_untracked) = counting();
    let _w1 = store.watch(&tracked, on_tracked);
    let _w2 = store.watch(&untracked, on_untracked);

    store.commit(increment.create(3)).unwrap();
    store.commit(increment.create(3)).unwrap();

    assert_eq!(store.resolve_atom(&tracked).snapshot().value, 6);
    assert_eq!(store.resolve_atom(&untracked).snapshot().value, 0);
    assert!(!store.is_tracked(&untracked));
    assert_eq!(tracked_calls.load(Ordering::SeqCst), 2);
    assert_eq!(untracked_calls.load(Ordering::SeqCst), 0);
}

/// An update may not list one atom twice; its drafts would overwrite each
/// other on write-back.
#[test]
fn repeated_source_is_rejected() {
    let counter = counter_atom();
    let increment = Signal::<i32>::new("counter.increment");
    let store = Store::new();
    let _retainer = store.retain(&counter);

    let update = Update::new(
        &increment,
        vec![counter.clone(), counter.clone()],
        |drafts, by| drafts[0].value += by,
    );
    let error = store.register_update(update).unwrap_err();
    assert!(matches!(error, StoreError::DuplicateSource { ref atom, .. } if atom == "counter"));

    store.commit(increment.create(5)).unwrap();
    assert_eq!(store.resolve_atom(&counter).snapshot().value, 0);
    assert_eq!(store.handler_count(&increment), 0);
}

/// A retain taken on a resolved context keeps the atom tracked, and its
/// release evicts the atom like any other last release.
#[test]
fn context_retainer_counts_toward_tracking() {
    let counter = counter_atom();
    let store = Store::new();

    let retainer = store.retain(&counter);
    let context = store.resolve_atom(&counter);
    let direct = context.retain();

    retainer.release();
    assert!(store.is_tracked(&counter));
    assert!(AtomContext::ptr_eq(&context, &store.resolve_atom(&counter)));

    direct.release();
    assert!(!store.is_tracked(&counter));
    assert_eq!(store.tracked_atom_count(), 0);
}
