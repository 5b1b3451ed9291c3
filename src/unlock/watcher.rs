//! Background cooldown poller.
//!
//! Calls [`UnlockEngine::tick`] on a fixed interval so the LOCKED → IDLE
//! transition and the "gift ready" notification happen without user input.

use super::{UnlockEngine, UnlockStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

enum WatchCommand {
    Status(oneshot::Sender<UnlockStatus>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Clone, Debug)]
pub struct CooldownWatcher {
    tx: mpsc::UnboundedSender<WatchCommand>,
}

impl CooldownWatcher {
    /// Stop polling and wait for the task to acknowledge.
    pub async fn stop(&self) {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(WatchCommand::Shutdown(tx));
        let _ = rx.await;
    }

    /// Status as seen by the watcher task; `None` once it has stopped.
    pub async fn status(&self) -> Option<UnlockStatus> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(WatchCommand::Status(tx)).is_ok() {
            rx.await.ok()
        } else {
            None
        }
    }
}

pub fn spawn_cooldown_watcher(engine: Arc<UnlockEngine>, every: Duration) -> CooldownWatcher {
    let (tx, mut rx) = mpsc::unbounded_channel::<WatchCommand>();
    let handle = CooldownWatcher { tx };

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        log::debug!("cooldown watcher started (every {:?})", every);
        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(WatchCommand::Status(resp)) => { let _ = resp.send(engine.status()); }
                        Some(WatchCommand::Shutdown(done)) => { let _ = done.send(()); break; }
                        None => break,
                    }
                }
                _ = interval.tick() => {
                    engine.tick();
                }
            }
        }
        log::debug!("cooldown watcher stopped");
    });

    handle
}
