// Debug session task
//
// Each session owns its engine inside one tokio task. Commands arrive on a
// bounded channel with oneshot replies, runtime events on a second channel and
// detach on a watch channel that is polled first.

use crate::breakpoint::{Breakpoint, BreakpointKind, BreakpointProperties};
use crate::config::EngineSettings;
use crate::dependency::DependencyRule;
use crate::engine::{BreakpointEngine, Notification};
use crate::error::{EngineError, EngineResult};
use crate::events::EventSet;
use crate::runtime::Runtime;
use crate::source::SourceIndex;
use crate::suspend::SuspendScope;
use crate::types::{BreakpointId, SourcePosition, ThreadId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tracing::{debug, error, info, warn};

/// Work executed on the session task
type Command<R> = Box<dyn FnOnce(&mut BreakpointEngine<R>) + Send>;

/// Handle to a running session
pub struct SessionHandle<R: Runtime + 'static> {
    command_tx: mpsc::Sender<Command<R>>,
    detach_tx: Arc<watch::Sender<bool>>,
    notify_tx: broadcast::Sender<Notification>,
    index: Arc<dyn SourceIndex>,
}

impl<R: Runtime + 'static> Clone for SessionHandle<R> {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            detach_tx: Arc::clone(&self.detach_tx),
            notify_tx: self.notify_tx.clone(),
            index: Arc::clone(&self.index),
        }
    }
}

impl<R: Runtime + 'static> SessionHandle<R> {
    /// Run `f` on the session task and wait for its result
    pub async fn call<T, F>(&self, f: F) -> EngineResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut BreakpointEngine<R>) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command: Command<R> = Box::new(move |engine| {
            reply_tx.send(f(engine)).ok();
        });

        self.command_tx
            .send(command)
            .await
            .map_err(|_| EngineError::SessionClosed)?;

        reply_rx.await.map_err(|_| EngineError::SessionClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Detach immediately, ahead of any queued command
    pub fn detach(&self) {
        self.detach_tx.send_replace(true);
    }

    pub async fn attach(&self) -> EngineResult<()> {
        self.detach_tx.send_replace(false);
        self.call(|engine| engine.attach()).await?
    }

    pub async fn add_breakpoint(
        &self,
        kind: BreakpointKind,
        properties: BreakpointProperties,
    ) -> EngineResult<BreakpointId> {
        self.call(move |engine| engine.add_breakpoint(kind, properties))
            .await?
    }

    pub async fn restore_breakpoint(&self, json: String) -> EngineResult<BreakpointId> {
        self.call(move |engine| engine.restore_breakpoint(&json)).await?
    }

    pub async fn remove_breakpoint(&self, id: BreakpointId) -> EngineResult<()> {
        self.call(move |engine| engine.remove_breakpoint(id)).await?
    }

    pub async fn set_enabled(&self, id: BreakpointId, enabled: bool) -> EngineResult<()> {
        self.call(move |engine| engine.set_enabled(id, enabled))
            .await?
    }

    pub async fn update_properties(
        &self,
        id: BreakpointId,
        properties: BreakpointProperties,
    ) -> EngineResult<()> {
        self.call(move |engine| engine.update_properties(id, properties))
            .await?
    }

    pub async fn reload(&self, id: BreakpointId) -> EngineResult<()> {
        let index = Arc::clone(&self.index);
        self.call(move |engine| engine.reload(id, index.as_ref()))
            .await?
    }

    pub async fn install_rule(
        &self,
        master: BreakpointId,
        slave: BreakpointId,
        leave_enabled: bool,
    ) -> EngineResult<()> {
        self.call(move |engine| engine.install_rule(master, slave, leave_enabled))
            .await?
    }

    pub async fn remove_rule(&self, slave: BreakpointId) -> EngineResult<Option<DependencyRule>> {
        self.call(move |engine| engine.remove_rule(slave)).await?
    }

    pub async fn set_thread_filter(&self, thread: Option<ThreadId>) -> EngineResult<()> {
        self.call(move |engine| engine.set_thread_filter(thread))
            .await?
    }

    pub async fn set_muted(&self, muted: bool) -> EngineResult<()> {
        self.call(move |engine| engine.set_muted(muted)).await?
    }

    pub async fn run_to_cursor(
        &self,
        position: SourcePosition,
        class_name: String,
        ignore_breakpoints: bool,
    ) -> EngineResult<BreakpointId> {
        self.call(move |engine| engine.run_to_cursor(position, &class_name, ignore_breakpoints))
            .await?
    }

    pub async fn resume(&self) -> EngineResult<()> {
        self.call(|engine| engine.resume()).await?
    }

    pub async fn breakpoint(&self, id: BreakpointId) -> EngineResult<Option<Breakpoint>> {
        self.call(move |engine| engine.breakpoint(id).cloned()).await
    }

    pub async fn breakpoints(&self) -> EngineResult<Vec<Breakpoint>> {
        self.call(|engine| engine.breakpoints().cloned().collect())
            .await
    }
}

/// Start the session task
pub fn spawn_session<R: Runtime + 'static>(
    engine: BreakpointEngine<R>,
    events: mpsc::Receiver<EventSet>,
    index: Arc<dyn SourceIndex>,
) -> SessionHandle<R> {
    let EngineSettings {
        command_channel_capacity,
        notification_channel_capacity,
        ..
    } = engine.settings().clone();
    let (command_tx, command_rx) = mpsc::channel(command_channel_capacity.max(1));
    let (notify_tx, _) = broadcast::channel(notification_channel_capacity.max(1));
    let (detach_tx, detach_rx) = watch::channel(false);

    tokio::spawn(session_task(
        engine,
        command_rx,
        events,
        detach_rx,
        notify_tx.clone(),
    ));

    SessionHandle {
        command_tx,
        detach_tx: Arc::new(detach_tx),
        notify_tx,
        index,
    }
}

fn publish<R: Runtime>(engine: &mut BreakpointEngine<R>, notify_tx: &broadcast::Sender<Notification>) {
    for notification in engine.drain_notifications() {
        // no subscribers is fine
        notify_tx.send(notification).ok();
    }
}

async fn session_task<R: Runtime + 'static>(
    mut engine: BreakpointEngine<R>,
    mut command_rx: mpsc::Receiver<Command<R>>,
    mut event_rx: mpsc::Receiver<EventSet>,
    mut detach_rx: watch::Receiver<bool>,
    notify_tx: broadcast::Sender<Notification>,
) {
    info!("Session task started");
    let mut events_open = true;

    loop {
        tokio::select! {
            biased;

            changed = detach_rx.changed() => {
                if changed.is_err() {
                    debug!("All session handles dropped");
                    break;
                }
                if *detach_rx.borrow_and_update() {
                    info!("Detach requested");
                    engine.detach();
                    publish(&mut engine, &notify_tx);
                }
            }

            command = command_rx.recv() => {
                let Some(command) = command else {
                    break;
                };
                command(&mut engine);
                publish(&mut engine, &notify_tx);
            }

            set = event_rx.recv(), if events_open => {
                match set {
                    Some(set) => {
                        debug!("Handling event set with {} event(s)", set.events.len());
                        match engine.handle_event_set(set) {
                            Ok(SuspendScope::None) => {}
                            Ok(scope) => debug!("Target suspended at {:?}", scope),
                            Err(e) => error!("Failed to handle event set: {}", e),
                        }
                    }
                    None => {
                        warn!("Event source closed, detaching");
                        events_open = false;
                        engine.detach();
                    }
                }
                publish(&mut engine, &notify_tx);
            }
        }
    }

    info!("Session task shutting down");
}

pub type SessionId = String;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    format!("session_{}", SESSION_COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Independent sessions, one of which is current
pub struct SessionManager<R: Runtime + 'static> {
    sessions: Arc<Mutex<HashMap<SessionId, SessionHandle<R>>>>,
    current_session: Arc<Mutex<Option<SessionId>>>,
}

impl<R: Runtime + 'static> Default for SessionManager<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Runtime + 'static> SessionManager<R> {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            current_session: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn a session and make it current
    pub async fn create_session(
        &self,
        engine: BreakpointEngine<R>,
        events: mpsc::Receiver<EventSet>,
        index: Arc<dyn SourceIndex>,
    ) -> (SessionId, SessionHandle<R>) {
        let session_id = next_session_id();
        let handle = spawn_session(engine, events, index);

        let mut sessions = self.sessions.lock().await;
        sessions.insert(session_id.clone(), handle.clone());

        let mut current = self.current_session.lock().await;
        *current = Some(session_id.clone());

        info!("Created {}", session_id);
        (session_id, handle)
    }

    pub async fn get_session(&self, session_id: &str) -> Option<SessionHandle<R>> {
        let sessions = self.sessions.lock().await;
        sessions.get(session_id).cloned()
    }

    pub async fn get_current_session(&self) -> Option<SessionHandle<R>> {
        let current = self.current_session.lock().await;
        let session_id = current.as_ref()?;
        let sessions = self.sessions.lock().await;
        sessions.get(session_id).cloned()
    }

    pub async fn get_current_session_id(&self) -> Option<SessionId> {
        let current = self.current_session.lock().await;
        current.clone()
    }

    pub async fn set_current_session(&self, session_id: &str) -> bool {
        let sessions = self.sessions.lock().await;
        if !sessions.contains_key(session_id) {
            return false;
        }
        let mut current = self.current_session.lock().await;
        *current = Some(session_id.to_string());
        true
    }

    pub async fn session_ids(&self) -> Vec<SessionId> {
        let sessions = self.sessions.lock().await;
        let mut ids: Vec<SessionId> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Detach and forget a session
    pub async fn remove_session(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().await;
        if let Some(handle) = sessions.remove(session_id) {
            handle.detach();
        }

        let mut current = self.current_session.lock().await;
        if current.as_deref() == Some(session_id) {
            *current = None;
        }
    }
}
