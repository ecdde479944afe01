//! Background re-check of due reminders.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::engine::WateringScheduleEngine;
use crate::models::Reminder;
use crate::storage::Storage;

/// An engine shared between the command handlers and the poller.
pub type SharedEngine<S, C> = Arc<Mutex<WateringScheduleEngine<S, C>>>;

const POLL_BUFFER: usize = 16;

/// Reminders found due by one poll.
#[derive(Debug, Clone)]
pub struct DueBatch {
    pub checked_at: NaiveDateTime,
    pub reminders: Vec<Reminder>,
}

struct PollTask {
    handle: tokio::task::JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns at most one recurring poll task.
///
/// Starting again cancels the previous task first, so there is never more
/// than one poller per instance. Dropping the poller cancels its task.
#[derive(Default)]
pub struct ReminderPoller {
    task: Option<PollTask>,
}

impl ReminderPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a poll that checks `engine` immediately and then every `every`.
    ///
    /// Each poll is sent on the returned channel. The poll only reads the
    /// engine. If the receiver falls behind, batches are dropped rather than
    /// queued; if it is dropped, the task stops.
    pub fn start<S, C>(&mut self, engine: SharedEngine<S, C>, every: Duration) -> mpsc::Receiver<DueBatch>
    where
        S: Storage + Send + 'static,
        C: Clock + 'static,
    {
        self.stop();

        let (tx, rx) = mpsc::channel(POLL_BUFFER);
        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => {
                        debug!("Reminder poll cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let batch = {
                            let engine = engine.lock().await;
                            DueBatch {
                                checked_at: engine.now(),
                                reminders: engine.due_reminders(),
                            }
                        };
                        match tx.try_send(batch) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                debug!("Reminder consumer is behind, dropping poll result");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                debug!("Reminder receiver dropped, stopping poll");
                                break;
                            }
                        }
                    }
                }
            }
        });

        info!("Reminder poll armed every {}s", every.as_secs());
        self.task = Some(PollTask { handle, cancel_token });
        rx
    }

    /// Cancel the running poll, if any. A poll already in progress is
    /// dropped before it can send.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel_token.cancel();
            task.handle.abort();
            debug!("Reminder poll stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| !task.cancel_token.is_cancelled() && !task.handle.is_finished())
    }
}

impl Drop for ReminderPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::EngineOptions;
    use crate::models::{NewPlant, ScheduleInput};
    use crate::storage::MemoryStorage;
    use chrono::{NaiveDate, TimeDelta};

    fn shared_engine() -> (SharedEngine<MemoryStorage, ManualClock>, ManualClock) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let mut engine =
            WateringScheduleEngine::open(MemoryStorage::new(), clock.clone(), EngineOptions::default()).unwrap();
        let mut fern = NewPlant::new("Fern", "fern");
        fern.schedule = Some(ScheduleInput::every(2));
        engine.add_plant(fern).unwrap();
        (Arc::new(Mutex::new(engine)), clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_is_immediate() {
        let (engine, clock) = shared_engine();
        clock.advance(TimeDelta::days(2));

        let mut poller = ReminderPoller::new();
        let mut rx = poller.start(engine, Duration::from_secs(60));

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.reminders.len(), 1);
        assert_eq!(batch.reminders[0].plant_name, "Fern");
        assert!(poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_observe_mutations() {
        let (engine, clock) = shared_engine();
        let mut poller = ReminderPoller::new();
        let mut rx = poller.start(Arc::clone(&engine), Duration::from_secs(60));

        assert!(rx.recv().await.unwrap().reminders.is_empty());

        clock.advance(TimeDelta::days(3));
        assert_eq!(rx.recv().await.unwrap().reminders.len(), 1);

        engine.lock().await.mark_watered(1, "").unwrap();
        assert!(rx.recv().await.unwrap().reminders.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_previous_task() {
        let (engine, _) = shared_engine();
        let mut poller = ReminderPoller::new();

        let mut first = poller.start(Arc::clone(&engine), Duration::from_secs(60));
        first.recv().await.unwrap();

        let mut second = poller.start(Arc::clone(&engine), Duration::from_secs(60));
        while first.recv().await.is_some() {}
        assert!(second.recv().await.is_some());
        assert!(poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_drops_poll_in_progress() {
        let (engine, _) = shared_engine();
        let mut poller = ReminderPoller::new();

        let mut first = poller.start(Arc::clone(&engine), Duration::from_secs(60));
        first.recv().await.unwrap();

        // Second tick of the first task blocks on the engine lock
        let guard = engine.lock().await;
        tokio::time::sleep(Duration::from_secs(61)).await;

        let mut second = poller.start(Arc::clone(&engine), Duration::from_secs(60));
        drop(guard);

        assert!(first.recv().await.is_none());
        assert!(second.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_channel() {
        let (engine, _) = shared_engine();
        let mut poller = ReminderPoller::new();
        let mut rx = poller.start(engine, Duration::from_secs(60));
        rx.recv().await.unwrap();

        poller.stop();
        assert!(!poller.is_active());
        while rx.recv().await.is_some() {}
    }
}
