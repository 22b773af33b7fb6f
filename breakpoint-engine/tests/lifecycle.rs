// Arming, resolution and session-level switches against the mock runtime

mod common;

use breakpoint_engine::category::Category;
use breakpoint_engine::eventrequest::RequestKind;
use breakpoint_engine::events::{Event, EventKind, EventSet};
use breakpoint_engine::field::FieldBreakpoint;
use breakpoint_engine::method::MethodBreakpoint;
use breakpoint_engine::mock::{MockEvaluator, MockRuntime, MockSourceIndex, RuntimeCall};
use breakpoint_engine::source::ResolvedPosition;
use breakpoint_engine::types::ACC_FINAL;
use breakpoint_engine::{
    BreakpointKind, EngineError, Notification, Runtime, SourcePosition, SuspendPolicy,
    SuspendScope, VerifiedState,
};
use common::*;

#[test]
fn test_deferred_line_breakpoint_resolves_when_class_loads() {
    let mut engine = attached(MockRuntime::new(), MockEvaluator::new());
    let id = engine.add_breakpoint(line(10), Default::default()).unwrap();
    assert_eq!(engine.breakpoint(id).unwrap().verified(), &VerifiedState::Pending);
    assert!(engine.requests().has_waits(id));
    assert!(engine.runtime().requests.is_empty());

    let ty = engine.runtime_mut().load_class("pkg.Foo");
    engine.runtime_mut().add_line(&ty, 10, 2);
    let prepare = EventSet::single(
        SuspendPolicy::All,
        Event::unsolicited(EventKind::ClassPrepare {
            thread: THREAD,
            ref_type: ty.clone(),
        }),
    );
    assert_eq!(engine.handle_event_set(prepare).unwrap(), SuspendScope::None);
    assert_eq!(engine.requests().find_requests(id).len(), 2);
    assert_eq!(engine.breakpoint(id).unwrap().verified(), &VerifiedState::Verified);

    // nested classes compiled from the same file keep resolving
    let inner = engine.runtime_mut().load_class("pkg.Foo$Inner");
    engine.runtime_mut().add_line(&inner, 10, 1);
    engine.on_class_prepared(&inner);
    assert_eq!(engine.requests().find_requests(id).len(), 3);

    let other = engine.runtime_mut().load_class("pkg.Other");
    engine.runtime_mut().add_line(&other, 10, 1);
    engine.on_class_prepared(&other);
    assert_eq!(engine.requests().find_requests(id).len(), 3);
}

#[test]
fn test_arming_twice_creates_no_duplicates() {
    let mut engine = engine();
    let id = engine.add_breakpoint(line(10), Default::default()).unwrap();
    assert_eq!(engine.runtime().requests.len(), 1);

    engine.arm(id).unwrap();
    engine.arm(id).unwrap();
    let ty = engine.runtime().classes_by_name("pkg.Foo")[0].clone();
    engine.on_class_prepared(&ty);
    assert_eq!(engine.runtime().requests.len(), 1);
    assert_eq!(engine.requests().find_requests(id).len(), 1);
}

#[test]
fn test_method_exit_dropped_when_unsupported() {
    let mut runtime = runtime();
    runtime.capabilities.can_request_method_exit = false;
    let ty = runtime.classes_by_name("pkg.Foo")[0].clone();
    runtime.add_method(&ty, "run", "()V", 0);
    let mut engine = attached(runtime, MockEvaluator::new());

    let mut method = MethodBreakpoint::new("pkg.Foo", "run");
    method.watch_exit = true;
    let id = engine
        .add_breakpoint(BreakpointKind::Method(method), Default::default())
        .unwrap();

    assert_eq!(engine.breakpoint(id).unwrap().verified(), &VerifiedState::Verified);
    let kinds: Vec<&RequestKind> = engine
        .runtime()
        .requests
        .values()
        .map(|r| &r.spec.kind)
        .collect();
    assert_eq!(kinds.len(), 1);
    assert!(matches!(kinds[0], RequestKind::MethodEntry { .. }));
}

#[test]
fn test_missing_field_marks_breakpoint_invalid() {
    let mut engine = engine();
    let id = engine
        .add_breakpoint(
            BreakpointKind::Field(FieldBreakpoint::new("pkg.Foo", "count")),
            Default::default(),
        )
        .unwrap();
    assert_eq!(
        engine.breakpoint(id).unwrap().verified(),
        &VerifiedState::Invalid("No field 'count' in pkg.Foo".to_string())
    );
    assert!(engine.runtime().requests.is_empty());

    // invalid breakpoints are not re-armed
    engine.arm(id).unwrap();
    assert!(engine.runtime().requests.is_empty());
}

#[test]
fn test_method_breakpoint_follows_overrides() {
    let mut runtime = MockRuntime::new();
    let base = runtime.load_class("pkg.Base");
    runtime.add_method(&base, "run", "()V", 0);
    let sub = runtime.load_subclass("pkg.Sub", &["pkg.Base", "java.lang.Object"]);
    runtime.add_method(&sub, "run", "()V", 0);
    let plain = runtime.load_subclass("pkg.Plain", &["pkg.Base", "java.lang.Object"]);
    let mut engine = attached(runtime, MockEvaluator::new());

    engine
        .add_breakpoint(
            BreakpointKind::Method(MethodBreakpoint::new("pkg.Base", "run")),
            Default::default(),
        )
        .unwrap();
    assert_eq!(engine.runtime().requests_for_class(base.type_id).len(), 1);
    assert_eq!(engine.runtime().requests_for_class(sub.type_id).len(), 1);
    assert!(engine.runtime().requests_for_class(plain.type_id).is_empty());

    let late = engine
        .runtime_mut()
        .load_subclass("pkg.Late", &["pkg.Base", "java.lang.Object"]);
    engine.runtime_mut().add_method(&late, "run", "()V", 0);
    engine.on_class_prepared(&late);
    assert_eq!(engine.runtime().requests_for_class(late.type_id).len(), 1);
}

#[test]
fn test_final_method_is_not_followed() {
    let mut runtime = MockRuntime::new();
    let base = runtime.load_class("pkg.Base");
    runtime.add_method(&base, "run", "()V", ACC_FINAL);
    let sub = runtime.load_subclass("pkg.Sub", &["pkg.Base", "java.lang.Object"]);
    runtime.add_method(&sub, "run", "()V", 0);
    let mut engine = attached(runtime, MockEvaluator::new());

    engine
        .add_breakpoint(
            BreakpointKind::Method(MethodBreakpoint::new("pkg.Base", "run")),
            Default::default(),
        )
        .unwrap();
    assert_eq!(engine.runtime().requests_for_class(base.type_id).len(), 1);
    assert!(engine.runtime().requests_for_class(sub.type_id).is_empty());
}

#[test]
fn test_detach_and_reattach() {
    let mut engine = engine();
    let id = engine.add_breakpoint(line(10), Default::default()).unwrap();
    let epoch = engine.epoch();

    engine.runtime_mut().detach();
    let gone = EventSet::single(SuspendPolicy::None, Event::unsolicited(EventKind::VMDisconnected));
    assert_eq!(engine.handle_event_set(gone).unwrap(), SuspendScope::None);
    assert!(!engine.is_attached());
    assert_eq!(engine.requests().request_count(), 0);
    assert_eq!(engine.breakpoint(id).unwrap().verified(), &VerifiedState::Unverified);

    assert!(matches!(engine.attach(), Err(EngineError::Runtime(_))));

    engine.runtime_mut().reattach();
    engine.attach().unwrap();
    assert_eq!(engine.epoch(), epoch + 2);
    assert_eq!(engine.requests().find_requests(id).len(), 1);
    assert_eq!(engine.breakpoint(id).unwrap().verified(), &VerifiedState::Verified);
}

#[test]
fn test_mute_keeps_enabled_flags() {
    let mut engine = engine();
    let a = engine.add_breakpoint(line(10), Default::default()).unwrap();
    let b = engine.add_breakpoint(line(20), Default::default()).unwrap();

    engine.set_muted(true).unwrap();
    assert!(engine.runtime().requests.is_empty());
    assert!(engine.breakpoint(a).unwrap().is_enabled());

    // added while muted: registered but not armed
    let c = engine.add_breakpoint(line(20), Default::default()).unwrap();
    assert!(engine.requests().find_requests(c).is_empty());

    engine.set_muted(false).unwrap();
    for id in [a, b, c] {
        assert_eq!(engine.requests().find_requests(id).len(), 1);
    }
}

#[test]
fn test_run_to_cursor_ignoring_breakpoints() {
    let mut engine = engine();
    let user = engine.add_breakpoint(line(10), Default::default()).unwrap();

    let position = SourcePosition {
        file: "Foo.java".to_string(),
        line: 20,
    };
    let cursor = engine.run_to_cursor(position, "pkg.Foo", true).unwrap();
    assert!(engine.is_muted());
    assert!(engine.requests().find_requests(user).is_empty());
    assert_eq!(engine.requests().find_requests(cursor).len(), 1);

    let scope = engine
        .handle_event_set(hit(&engine, cursor, SuspendPolicy::All))
        .unwrap();
    assert_eq!(scope, SuspendScope::All);
    assert!(!engine.is_muted());
    assert_eq!(engine.run_to_cursor_id(), None);
    assert_eq!(engine.requests().find_requests(user).len(), 1);
    // gone from the target already, dropped from the registry on resume
    assert!(engine.requests().find_requests(cursor).is_empty());
    assert!(engine.breakpoint(cursor).is_some());

    engine.resume().unwrap();
    assert!(engine.breakpoint(cursor).is_none());
    assert!(engine
        .drain_notifications()
        .contains(&Notification::Removed(cursor)));
}

#[test]
fn test_run_to_cursor_keeps_existing_mute() {
    let mut engine = engine();
    engine.set_muted(true).unwrap();
    let position = SourcePosition {
        file: "Foo.java".to_string(),
        line: 20,
    };
    let cursor = engine.run_to_cursor(position, "pkg.Foo", true).unwrap();
    engine.cancel_run_to_cursor().unwrap();
    assert!(engine.breakpoint(cursor).is_none());
    assert!(engine.is_muted());
}

#[test]
fn test_thread_filter_disables_before_changing() {
    let mut engine = engine();
    let a = engine.add_breakpoint(line(10), Default::default()).unwrap();
    let b = engine.add_breakpoint(line(20), Default::default()).unwrap();
    let ra = engine.requests().find_requests(a)[0];
    let rb = engine.requests().find_requests(b)[0];
    engine.runtime_mut().clear_calls();

    engine.set_thread_filter(Some(7)).unwrap();
    assert_eq!(
        engine.runtime().calls,
        vec![
            RuntimeCall::Enable(ra, false),
            RuntimeCall::SetThread(ra, Some(7)),
            RuntimeCall::Enable(ra, true),
            RuntimeCall::Enable(rb, false),
            RuntimeCall::SetThread(rb, Some(7)),
            RuntimeCall::Enable(rb, true),
        ]
    );

    // new requests pick the filter up
    let c = engine.add_breakpoint(line(20), Default::default()).unwrap();
    let rc = engine.requests().find_requests(c)[0];
    assert_eq!(engine.runtime().requests[&rc].spec.thread, Some(7));

    // resume clears it
    engine.resume().unwrap();
    assert_eq!(engine.thread_filter(), None);
    assert_eq!(engine.runtime().requests[&rc].spec.thread, None);
}

#[test]
fn test_inactive_category_is_not_armed() {
    let mut engine = engine();
    let id = engine.add_breakpoint(line(10), Default::default()).unwrap();

    engine.set_category_active(Category::Line, false).unwrap();
    assert!(engine.requests().find_requests(id).is_empty());
    assert!(engine.breakpoint(id).unwrap().is_enabled());

    engine.set_category_active(Category::Line, true).unwrap();
    assert_eq!(engine.requests().find_requests(id).len(), 1);
}

#[test]
fn test_reload_follows_moved_source() {
    let mut engine = engine();
    let bar = engine.runtime_mut().load_class("pkg.Bar");
    engine.runtime_mut().add_line(&bar, 10, 1);
    let id = engine.add_breakpoint(line(10), Default::default()).unwrap();

    let mut index = MockSourceIndex::default();
    index.insert(
        SourcePosition {
            file: "Foo.java".to_string(),
            line: 10,
        },
        ResolvedPosition::new("pkg.Bar"),
    );
    engine.reload(id, &index).unwrap();
    let request = engine.requests().find_requests(id)[0];
    assert_eq!(engine.runtime().requests_for_class(bar.type_id), vec![request]);

    // the position no longer maps anywhere
    engine.reload(id, &MockSourceIndex::default()).unwrap();
    assert!(engine.breakpoint(id).unwrap().verified().is_invalid());
    assert!(engine.requests().find_requests(id).is_empty());
}

#[test]
fn test_persisted_breakpoint_keeps_its_id() {
    let mut engine = engine();
    let id = engine.add_breakpoint(line(10), Default::default()).unwrap();
    let json = engine.export_breakpoint(id).unwrap();

    engine.remove_breakpoint(id).unwrap();
    assert_eq!(engine.restore_breakpoint(&json).unwrap(), id);
    assert_eq!(engine.requests().find_requests(id).len(), 1);
    assert!(engine.restore_breakpoint(&json).is_err());

    let unknown = json.replace("\"line\"", "\"javascript\"");
    assert!(matches!(
        engine.restore_breakpoint(&unknown),
        Err(EngineError::UnknownCategory(_))
    ));
}
