// Breakpoint engine for JVM debugging sessions
//
// Owns the lifecycle of user breakpoints against a running target:
// - Turning breakpoints into runtime event requests, now or when classes load
// - Filtering hits (caller, instance, class, condition, count)
// - Deciding how much of the target to suspend
// - Dependency rules, muting, thread filters and run to cursor
//
// The target, the expression evaluator and the source index are collaborators
// behind traits; `mock` provides in-memory versions of all three.

pub mod types;
pub mod error;
pub mod category;
pub mod filter;
pub mod eventrequest;
pub mod events;
pub mod runtime;
pub mod evaluator;
pub mod source;
pub mod breakpoint;
pub mod line;
pub mod method;
pub mod field;
pub mod exception;
pub mod wildcard;
pub mod registry;
pub mod requests;
pub mod filter_chain;
pub mod dependency;
pub mod suspend;
pub mod config;
pub mod engine;
pub mod session;
pub mod mock;

pub use breakpoint::{Breakpoint, BreakpointKind, BreakpointProperties, Condition, CountFilter, LogOptions, VerifiedState};
pub use category::Category;
pub use config::EngineSettings;
pub use engine::{BreakpointEngine, Notification};
pub use error::{EngineError, EngineResult, EvaluationError, RuntimeError, RuntimeResult};
pub use eventrequest::SuspendPolicy;
pub use runtime::{Capabilities, Runtime};
pub use session::{spawn_session, SessionHandle, SessionManager};
pub use suspend::SuspendScope;
pub use types::{BreakpointId, RequestId, SourcePosition, ThreadId};
