mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chr::prelude::*;
use common::Watcher;

#[test]
fn test_queued_tells_wait_for_host_code_to_return() {
    let mut cx = ExecutionContext::default();
    cx.set_queuing(true);
    let vars: Variables<i32> = Variables::new();
    let x = vars.fresh();
    let watcher = Watcher::new();
    vars.add_variable_observer(x, watcher.clone());

    let unbound_inside = Rc::new(Cell::new(false));
    let code = {
        let vars = vars.clone();
        let unbound_inside = unbound_inside.clone();
        let watcher = watcher.clone();
        QueuedHostLanguageCode::new(move |cx| {
            vars.bind_value(cx, x, 1)?;
            unbound_inside.set(vars.is_var(x) && watcher.wakeups.get() == 0);
            Ok(())
        })
    };
    cx.run(Rc::new(code)).unwrap();

    assert!(unbound_inside.get());
    assert_eq!(vars.value(x).unwrap(), 1);
    assert_eq!(watcher.wakeups.get(), 1);
    assert!(cx.queue().is_empty());
}

#[test]
fn test_unqueued_tell_propagates_inside_host_code() {
    let mut cx = ExecutionContext::default();
    let vars: Variables<i32> = Variables::new();
    let x = vars.fresh();
    let watcher = Watcher::new();
    vars.add_variable_observer(x, watcher.clone());

    let woken_inside = Rc::new(Cell::new(false));
    let code = {
        let vars = vars.clone();
        let woken_inside = woken_inside.clone();
        let watcher = watcher.clone();
        QueuedHostLanguageCode::new(move |cx| {
            vars.bind_value(cx, x, 1)?;
            woken_inside.set(watcher.wakeups.get() == 1);
            Ok(())
        })
    };
    cx.run(Rc::new(code)).unwrap();
    assert!(woken_inside.get());
    assert_eq!(watcher.wakeups.get(), 1);
}

#[test]
fn test_queue_drains_in_tell_order() {
    let mut cx = ExecutionContext::default();
    cx.set_queuing(true);
    let log = Rc::new(RefCell::new(Vec::new()));
    for i in 0..5 {
        let log = log.clone();
        cx.tell(move |_| {
            log.borrow_mut().push(i);
            Ok(())
        })
        .unwrap();
    }
    assert!(log.borrow().is_empty());
    assert_eq!(cx.queue().len(), 5);

    cx.set_queuing(false);
    cx.run_queued().unwrap();
    assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_queued_conflict_fails_the_run() {
    let mut cx = ExecutionContext::default();
    cx.set_queuing(true);
    let vars: Variables<i32> = Variables::new();
    let x = vars.fresh();
    let code = {
        let vars = vars.clone();
        QueuedHostLanguageCode::new(move |cx| {
            vars.bind_value(cx, x, 1)?;
            vars.bind_value(cx, x, 2)?;
            Ok(())
        })
    };
    let err = cx.run(Rc::new(code)).unwrap_err();
    assert!(err.is_failure());
    // No rollback: the first binding stands
    assert_eq!(vars.value(x).unwrap(), 1);
    assert!(cx.stack().is_empty());
}

#[test]
fn test_host_error_surfaces() {
    let mut cx = ExecutionContext::default();
    let code = QueuedHostLanguageCode::new(|_| {
        Err(RuntimeError::host(std::io::Error::other("printer on fire")))
    });
    let err = cx.run(Rc::new(code)).unwrap_err();
    assert!(matches!(err, RuntimeError::Host(_)));
    assert!(err.to_string().contains("printer on fire"));
    assert!(cx.is_host_language_mode());
}

#[test]
fn test_start_queuing_from_config() {
    let config = RuntimeConfig::from_json_str(r#"{"start_queuing": true}"#).unwrap();
    let mut cx = ExecutionContext::with_config(config);
    let vars: Variables<i32> = Variables::new();
    let x = vars.fresh();
    vars.bind_value(&mut cx, x, 3).unwrap();
    assert!(vars.is_var(x));
    cx.run_queued().unwrap();
    assert_eq!(vars.value(x).unwrap(), 3);
}
