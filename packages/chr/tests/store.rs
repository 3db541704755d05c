mod common;

use std::rc::Rc;

use chr::prelude::*;
use common::Watcher;

fn ids<C: Constraint + ?Sized>(iter: impl Iterator<Item = Rc<C>>) -> Vec<u64> {
    iter.map(|c| c.id().as_u64()).collect()
}

#[test]
fn test_merge_keeps_running_iterator_on_old_chain() {
    let w: Vec<_> = (0..5).map(|_| Watcher::new()).collect();
    let mut odd = DoublyLinkedConstraintList::new();
    let mut even = DoublyLinkedConstraintList::new();
    for (i, watcher) in w.iter().enumerate() {
        if i % 2 == 0 {
            odd.add_first(watcher.clone());
        } else {
            even.add_first(watcher.clone());
        }
    }

    let mut running = odd.universal_iter();
    let first = running.next().unwrap();
    odd.merge_with(even);

    let rest = ids(running);
    assert_eq!(first.id(), w[4].id());
    assert_eq!(rest, vec![w[2].id().as_u64(), w[0].id().as_u64()]);

    let all: Vec<u64> = w.iter().rev().map(|c| c.id().as_u64()).collect();
    assert_eq!(ids(odd.universal_iter()), all);
    assert_eq!(odd.len(), 5);
}

/// Merge `{4, 2, 0}` with `{3, 1}` while an unstarted iterator is held.
fn merge_under_unstarted_iterator<L: ConstraintList<Watcher>>(
    mut odd: L,
    mut even: L,
    w: &[Rc<Watcher>],
) -> (Vec<u64>, Vec<u64>) {
    for i in [0, 2, 4] {
        odd.add_first(w[i].clone());
    }
    for i in [1, 3] {
        even.add_first(w[i].clone());
    }
    let pending = odd.universal_iter();
    odd.merge_with(even);
    (ids(pending), ids(odd.universal_iter()))
}

#[test]
fn test_merge_before_first_step_keeps_old_chain() {
    let w: Vec<_> = (0..5).map(|_| Watcher::new()).collect();
    let older: Vec<u64> = [4, 2, 0].iter().map(|&i| w[i].id().as_u64()).collect();
    let all: Vec<u64> = w.iter().rev().map(|c| c.id().as_u64()).collect();

    let singly = merge_under_unstarted_iterator(
        SinglyLinkedConstraintList::new(),
        SinglyLinkedConstraintList::new(),
        &w,
    );
    assert_eq!(singly, (older.clone(), all.clone()));

    let doubly = merge_under_unstarted_iterator(
        DoublyLinkedConstraintList::new(),
        DoublyLinkedConstraintList::new(),
        &w,
    );
    assert_eq!(doubly, (older, all));
}

#[test]
fn test_killing_partners_mid_scan() {
    let cx = ExecutionContext::default();
    let mut store = SinglyLinkedConstraintList::new();
    let w: Vec<_> = (0..6).map(|_| Watcher::new()).collect();
    for watcher in &w {
        cx.store(&mut store, watcher.clone());
    }

    // Kill every partner after the one being visited, like a simpagation body
    let mut visited = Vec::new();
    for c in store.universal_iter() {
        visited.push(c.id());
        for partner in store.universal_iter().filter(|p| p.id() < c.id()) {
            cx.kill(&*partner);
        }
    }
    assert_eq!(visited, vec![w[5].id()]);
    assert_eq!(ids(store.universal_iter()), vec![w[5].id().as_u64()]);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_tombstones_skipped_by_every_iterator() {
    let mut store = DoublyLinkedConstraintList::new();
    let w: Vec<_> = (0..4).map(|_| Watcher::new()).collect();
    for watcher in &w {
        store.add_first(watcher.clone());
    }
    let existential = store.existential_iter();
    w[2].terminate();
    w[1].terminate();

    let expected = vec![w[3].id().as_u64(), w[0].id().as_u64()];
    for safety in [
        IterationSafety::Universal,
        IterationSafety::SemiUniversal,
        IterationSafety::Existential,
    ] {
        assert_eq!(ids(store.iter_with(safety)), expected);
    }
    assert_eq!(ids(existential), expected);
    assert_eq!(store.get_first().unwrap().id(), w[3].id());
}

#[test]
fn test_observer_completeness_across_unions() {
    let mut cx = ExecutionContext::default();
    let vars: Variables<u8> = Variables::new();
    let xs: Vec<_> = (0..4).map(|_| vars.fresh()).collect();
    let watchers: Vec<_> = xs
        .iter()
        .map(|&x| {
            let w = Watcher::new();
            vars.add_variable_observer(x, w.clone());
            w
        })
        .collect();

    vars.union(&mut cx, xs[0], xs[1]).unwrap();
    vars.union(&mut cx, xs[2], xs[3]).unwrap();
    vars.union(&mut cx, xs[1], xs[3]).unwrap();
    let before: Vec<usize> = watchers.iter().map(|w| w.wakeups.get()).collect();

    vars.bind_value(&mut cx, xs[2], 1).unwrap();
    for (w, b) in watchers.iter().zip(before) {
        assert_eq!(w.wakeups.get(), b + 1);
    }
}
