//! SaveActor - periodically persists the player cache
//!
//! The actor wakes up every `interval`, snapshots the shared cache and hands
//! it to [`PlayerStorage::save_all`]. A failed save is not retried
//! separately: the next cycle submits the full snapshot again.
//!
//! On shutdown a final save runs before the storage is closed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, instrument, trace, warn};

use super::messages::{SaveCommand, SaveStats, SharedCache};
use crate::storage::{PlayerStorage, PlayerStore};

/// Periodic save actor
pub struct SaveActor<S: PlayerStore> {
    storage: Arc<PlayerStorage<S>>,

    cache: SharedCache,

    interval: Duration,

    command_rx: mpsc::Receiver<SaveCommand>,

    stats: SaveStats,
}

impl<S: PlayerStore> SaveActor<S> {
    pub fn new(
        storage: Arc<PlayerStorage<S>>,
        cache: SharedCache,
        interval: Duration,
        command_rx: mpsc::Receiver<SaveCommand>,
    ) -> Self {
        Self {
            storage,
            cache,
            interval,
            command_rx,
            stats: SaveStats::default(),
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting save actor (interval: {:?})", self.interval);

        // The first tick completes immediately; skip it so the initial load
        // is not written straight back.
        let mut save_interval =
            time::interval_at(time::Instant::now() + self.interval, self.interval);
        save_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut shutdown_reply: Option<oneshot::Sender<()>> = None;

        loop {
            tokio::select! {
                _ = save_interval.tick() => {
                    trace!("periodic save triggered");
                    self.save().await;
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SaveCommand::Flush { respond_to }) => {
                            debug!("manual flush requested");
                            let result = if self.save().await {
                                Ok(())
                            } else {
                                Err(anyhow::anyhow!("not every batch could be saved"))
                            };
                            let _ = respond_to.send(result);
                        }
                        Some(SaveCommand::GetStats { respond_to }) => {
                            let _ = respond_to.send(self.stats.clone());
                        }
                        Some(SaveCommand::Shutdown { respond_to }) => {
                            debug!("received shutdown command");
                            shutdown_reply = Some(respond_to);
                            break;
                        }
                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("final save before shutdown");
        self.save().await;
        self.storage.close().await;

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
        debug!("save actor stopped");
    }

    /// Save a snapshot of the cache; `true` iff every batch was written
    async fn save(&mut self) -> bool {
        let snapshot = self.cache.read().await.clone();
        self.stats.last_snapshot_size = snapshot.len();

        let saved = self.storage.save_all(&snapshot).await;
        if saved {
            self.stats.save_count += 1;
        } else {
            self.stats.failed_saves += 1;
            warn!("saving {} players failed, retrying next cycle", snapshot.len());
        }
        saved
    }
}

/// Handle for communicating with the save actor
#[derive(Clone)]
pub struct SaveHandle {
    sender: mpsc::Sender<SaveCommand>,
}

impl SaveHandle {
    /// Spawn a new save actor
    pub fn spawn<S>(storage: Arc<PlayerStorage<S>>, cache: SharedCache, interval: Duration) -> Self
    where
        S: PlayerStore + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SaveActor::new(storage, cache, interval, cmd_rx);

        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Save the cache now
    pub async fn flush(&self) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(SaveCommand::Flush { respond_to: tx }).await?;

        rx.await?
    }

    /// Get save statistics
    pub async fn get_stats(&self) -> Option<SaveStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SaveCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Final save, close the storage, and wait for the actor to stop
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(SaveCommand::Shutdown { respond_to: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }
}
