//! Async driver for a `SessionManager`.
//!
//! All mutation happens on one task that drains an mpsc channel of
//! `SessionCommand`s, so fixes are applied strictly in order and never
//! interleave. Recalculations run on their own task and post their result
//! back into the same channel.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::coordinator::RoutePlanner;
use crate::error::{RouteError, SessionError};
use crate::models::{NavigationRoute, PositionFix};
use crate::rules::NavigationRules;
use crate::session::{NavigationSession, RecalculationRequest, SessionEvent, SessionManager};

const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 256;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

pub enum SessionCommand {
    Start {
        route: NavigationRoute,
        reply: Reply<NavigationSession>,
    },
    Position {
        fix: PositionFix,
        reply: Reply<()>,
    },
    RecalculationFinished {
        session_id: String,
        result: Result<NavigationRoute, RouteError>,
    },
    StreamFailed {
        reason: String,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Cancel {
        reply: Reply<()>,
    },
}

/// Cloneable front end to the session task.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<Option<NavigationSession>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| SessionError::ActorStopped)?;
        response.await.map_err(|_| SessionError::ActorStopped)?
    }

    pub async fn start(&self, route: NavigationRoute) -> Result<NavigationSession, SessionError> {
        self.request(|reply| SessionCommand::Start { route, reply }).await
    }

    pub async fn update_position(&self, fix: PositionFix) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Position { fix, reply }).await
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Resume { reply }).await
    }

    pub async fn cancel(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Cancel { reply }).await
    }

    pub async fn report_stream_failure(&self, reason: impl Into<String>) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::StreamFailed {
                reason: reason.into(),
            })
            .await
            .map_err(|_| SessionError::ActorStopped)
    }

    /// Feed fixes from a position source until it closes or reports a fault.
    /// A fault marks the session failed; the source is not retried.
    pub async fn follow<E: std::fmt::Display>(
        &self,
        mut source: mpsc::Receiver<Result<PositionFix, E>>,
    ) -> Result<(), SessionError> {
        while let Some(item) = source.recv().await {
            match item {
                Ok(fix) => match self.update_position(fix).await {
                    Ok(()) | Err(SessionError::InvalidState(..)) => {}
                    Err(err) => return Err(err),
                },
                Err(err) => {
                    self.report_stream_failure(err.to_string()).await?;
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn current(&self) -> Option<NavigationSession> {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<NavigationSession>> {
        self.snapshots.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

/// Spawn the session task. It stops once every handle is dropped.
pub fn spawn_session_actor(
    planner: Arc<dyn RoutePlanner>,
    rules: NavigationRules,
) -> (SessionHandle, JoinHandle<()>) {
    let (commands, inbox) = mpsc::channel(COMMAND_BUFFER);
    let (snapshot_tx, snapshots) = watch::channel(None);
    let (events, _) = broadcast::channel(EVENT_BUFFER);

    let actor = SessionActor {
        manager: SessionManager::new(rules),
        planner,
        loopback: commands.downgrade(),
        snapshots: snapshot_tx,
        events: events.clone(),
    };
    let task = tokio::spawn(actor.run(inbox));

    (
        SessionHandle {
            commands,
            snapshots,
            events,
        },
        task,
    )
}

struct SessionActor {
    manager: SessionManager,
    planner: Arc<dyn RoutePlanner>,
    loopback: mpsc::WeakSender<SessionCommand>,
    snapshots: watch::Sender<Option<NavigationSession>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionActor {
    async fn run(mut self, mut inbox: mpsc::Receiver<SessionCommand>) {
        tracing::info!("Session actor started");
        while let Some(command) = inbox.recv().await {
            self.handle(command);
        }
        tracing::info!("Session actor stopped");
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start { route, reply } => {
                let result = match self.manager.start(route, Utc::now()) {
                    Ok(events) => {
                        self.commit(events);
                        self.manager.snapshot().ok_or(SessionError::NoSession)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Position { fix, reply } => {
                let result = match self.manager.handle_position(fix) {
                    Ok(update) => {
                        self.commit(update.events);
                        if let Some(request) = update.recalculation {
                            self.spawn_recalculation(request);
                        }
                        Ok(())
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            SessionCommand::RecalculationFinished { session_id, result } => {
                let events = self.manager.finish_recalculation(&session_id, result);
                self.commit(events);
            }
            SessionCommand::StreamFailed { reason } => {
                let events = self.manager.stream_failed(&reason);
                self.commit(events);
            }
            SessionCommand::Pause { reply } => {
                let result = self.manager.pause().map(|events| self.commit(events));
                let _ = reply.send(result);
            }
            SessionCommand::Resume { reply } => {
                let result = self.manager.resume().map(|events| self.commit(events));
                let _ = reply.send(result);
            }
            SessionCommand::Cancel { reply } => {
                let result = self.manager.cancel().map(|events| self.commit(events));
                let _ = reply.send(result);
            }
        }
    }

    /// Publish the new snapshot, then the events that produced it, so an
    /// event observer always finds the snapshot already updated.
    fn commit(&self, events: Vec<SessionEvent>) {
        self.snapshots.send_replace(self.manager.snapshot());
        for event in events {
            // no subscribers is fine
            let _ = self.events.send(event);
        }
    }

    fn spawn_recalculation(&self, request: RecalculationRequest) {
        let planner = Arc::clone(&self.planner);
        let loopback = self.loopback.clone();
        tracing::info!(
            "Recalculating session {} (attempt {})",
            request.session_id,
            request.attempt
        );
        tokio::spawn(async move {
            let result = planner.plan(request.from, request.to).await;
            if let Some(commands) = loopback.upgrade() {
                let _ = commands
                    .send(SessionCommand::RecalculationFinished {
                        session_id: request.session_id,
                        result,
                    })
                    .await;
            }
        });
    }
}
