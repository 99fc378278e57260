//! Async driver for the chat engine
//!
//! Runs the engine on a single task. Backend calls are blocking, so each
//! request is moved to the blocking pool and its response comes back over
//! a channel; the engine itself is only ever touched from the driver task.
//! A slow request therefore never delays the other loop's timer.
//!
//! Callers talk to the driver with [`Command`]s and observe it through a
//! `watch` channel of [`Snapshot`]s. Cancelling the driver's token (or
//! sending [`Command::Shutdown`]) stops both loops and returns the engine.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;
use tokio_util::sync::CancellationToken;

use super::{Request, Response};
use crate::actions::{ChatEngine, Snapshot};
use crate::api::Backend;
use crate::error::ApiError;
use crate::models::ContactId;

/// Command channel depth
const COMMAND_BUFFER: usize = 32;

/// Input to a running driver
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    OpenConversation(ContactId),
    NewChat(ContactId),
    CloseThread,
    SetDraft(String),
    Send,
    Refresh,
    Shutdown,
}

/// Handle to a spawned driver task
pub struct DriverHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
    cancel: CancellationToken,
    task: JoinHandle<ChatEngine>,
}

impl DriverHandle {
    /// Queue a command for the driver
    pub async fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("Chat driver has stopped"))
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that is notified on every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Wait until a snapshot satisfies `predicate` and return it
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<Snapshot>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .context("Chat driver stopped before the expected state")?;
        Ok(snapshot.clone())
    }

    /// Token that stops the driver when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the driver and take the engine back
    pub async fn shutdown(self) -> Result<ChatEngine> {
        self.cancel.cancel();
        self.task.await.context("Chat driver task failed")
    }
}

/// Spawn the driver on the current runtime
pub fn spawn(engine: ChatEngine, backend: Arc<dyn Backend>) -> DriverHandle {
    spawn_with_token(engine, backend, CancellationToken::new())
}

/// Spawn the driver, stopping when `cancel` is cancelled
pub fn spawn_with_token(
    engine: ChatEngine,
    backend: Arc<dyn Backend>,
    cancel: CancellationToken,
) -> DriverHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());
    let task = tokio::spawn(run(
        engine,
        backend,
        command_rx,
        snapshot_tx,
        cancel.clone(),
    ));

    DriverHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
        cancel,
        task,
    }
}

/// Drive `engine` until cancelled, the command channel closes, or
/// [`Command::Shutdown`] arrives. Returns the stopped engine.
pub async fn run(
    mut engine: ChatEngine,
    backend: Arc<dyn Backend>,
    mut commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<Snapshot>,
    cancel: CancellationToken,
) -> ChatEngine {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Response>();

    engine.start(now());
    info!("Chat driver started");

    loop {
        let tick = now();
        for request in engine.due_requests(tick) {
            dispatch(request, &backend, &done_tx);
        }
        publish(&engine, &snapshots);

        let deadline = engine.next_deadline(tick);

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Chat driver cancelled");
                break;
            }
            Some(response) = done_rx.recv() => {
                engine.apply(response, now());
            }
            command = commands.recv() => match command {
                None | Some(Command::Shutdown) => break,
                Some(command) => handle_command(&mut engine, command, &backend, &done_tx),
            },
            _ = sleep_until(deadline) => {}
        }
    }

    engine.stop();
    publish(&engine, &snapshots);
    info!("Chat driver stopped");
    engine
}

fn handle_command(
    engine: &mut ChatEngine,
    command: Command,
    backend: &Arc<dyn Backend>,
    done_tx: &mpsc::UnboundedSender<Response>,
) {
    debug!("Driver command: {:?}", command);
    match command {
        Command::OpenConversation(id) => engine.open_conversation(id, now()),
        Command::NewChat(id) => engine.start_new_chat(id, now()),
        Command::CloseThread => engine.close_thread(),
        Command::SetDraft(text) => engine.set_draft(text),
        Command::Send => match engine.send() {
            Ok(Some(request)) => dispatch(request, backend, done_tx),
            Ok(None) => {}
            Err(e) => debug!("Send not started: {}", e),
        },
        Command::Refresh => engine.refresh(),
        Command::Shutdown => {}
    }
}

/// Run `request` on the blocking pool and route its response back.
///
/// A request that panics is answered with a transport error so its loop
/// or the compose box is never left waiting.
fn dispatch(
    request: Request,
    backend: &Arc<dyn Backend>,
    done_tx: &mpsc::UnboundedSender<Response>,
) {
    let backend = Arc::clone(backend);
    let done_tx = done_tx.clone();
    let failed = request.fail(ApiError::Transport("request panicked".to_string()));
    tokio::spawn(async move {
        let task = tokio::task::spawn_blocking(move || request.execute(&*backend));
        let response = match task.await {
            Ok(response) => response,
            Err(e) => {
                warn!("Backend request panicked: {}", e);
                failed
            }
        };
        // Receiver is gone once the driver has stopped
        let _ = done_tx.send(response);
    });
}

fn publish(engine: &ChatEngine, snapshots: &watch::Sender<Snapshot>) {
    let snapshot = engine.snapshot();
    snapshots.send_if_modified(|current| {
        if *current == snapshot {
            false
        } else {
            *current = snapshot;
            true
        }
    });
}

/// Engine time, taken from tokio's clock so a paused test clock applies
fn now() -> std::time::Instant {
    TokioInstant::now().into_std()
}

fn sleep_until(deadline: Option<std::time::Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(TokioInstant::from_std(at)).await,
            None => std::future::pending().await,
        }
    }
}
