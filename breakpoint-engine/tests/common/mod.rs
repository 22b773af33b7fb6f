// Shared fixtures for engine scenarios

#![allow(dead_code)]

use breakpoint_engine::events::{Event, EventKind, EventSet};
use breakpoint_engine::line::LineBreakpoint;
use breakpoint_engine::mock::{frame, MockEvaluator, MockRuntime};
use breakpoint_engine::types::Location;
use breakpoint_engine::{BreakpointEngine, BreakpointId, BreakpointKind, EngineSettings, SuspendPolicy};

pub const THREAD: u64 = 1;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Runtime with `pkg.Foo` loaded, one location on lines 10 and 20 and a
/// two-frame stack on `THREAD`
pub fn runtime() -> MockRuntime {
    let mut runtime = MockRuntime::new();
    let ty = runtime.load_class("pkg.Foo");
    runtime.add_line(&ty, 10, 1);
    runtime.add_line(&ty, 20, 1);
    runtime.set_frames(
        THREAD,
        vec![frame("pkg.Foo", "run", 10), frame("pkg.Main", "main", 3)],
    );
    runtime
}

pub fn attached(runtime: MockRuntime, evaluator: MockEvaluator) -> BreakpointEngine<MockRuntime> {
    init_tracing();
    let mut engine = BreakpointEngine::new(runtime, evaluator, EngineSettings::default());
    engine.attach().expect("attach");
    engine
}

pub fn engine() -> BreakpointEngine<MockRuntime> {
    attached(runtime(), MockEvaluator::new())
}

pub fn line(line: u32) -> BreakpointKind {
    BreakpointKind::Line(LineBreakpoint::new("Foo.java", line, Some("pkg.Foo")))
}

pub fn location(line: u32) -> Location {
    frame("pkg.Foo", "run", line).location
}

/// One breakpoint event per request the breakpoint owns
pub fn hit_all(
    engine: &BreakpointEngine<MockRuntime>,
    id: BreakpointId,
    policy: SuspendPolicy,
) -> EventSet {
    let events = engine
        .requests()
        .find_requests(id)
        .iter()
        .map(|request| {
            Event::new(
                *request,
                EventKind::Breakpoint {
                    thread: THREAD,
                    location: location(10),
                },
            )
        })
        .collect();
    EventSet::new(policy, events)
}

/// A breakpoint event for the first request of `id`
pub fn hit(engine: &BreakpointEngine<MockRuntime>, id: BreakpointId, policy: SuspendPolicy) -> EventSet {
    let request = engine.requests().find_requests(id)[0];
    EventSet::single(
        policy,
        Event::new(
            request,
            EventKind::Breakpoint {
                thread: THREAD,
                location: location(10),
            },
        ),
    )
}
