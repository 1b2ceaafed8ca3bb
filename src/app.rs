//! Service wiring: queues, subscribers, notifiers and the alert recorder.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::AppState;
use crate::config::Config;
use crate::notifier::{ChannelNotifier, ConsoleNotifier, FanOut};
use crate::queue::{ACCELEROMETER_QUEUE, Broker, DATETIME_QUEUE};
use crate::scheduler::MedicationScheduler;
use crate::storage::{self, Storage};
use crate::subscriber::{FallHandler, MedicationHandler, consume};

/// A running set of subscribers.
pub struct App {
    state: AppState,
    shutdown: watch::Sender<bool>,
    subscribers: Vec<JoinHandle<u64>>,
    recorder: JoinHandle<u64>,
}

impl App {
    /// Open storage, declare queues and spawn the configured subscribers.
    pub async fn start(config: &Config) -> anyhow::Result<Self> {
        let storage = Storage::new(&config.database_url).await?;
        info!("Database initialized");

        let (alert_tx, alert_rx) = mpsc::unbounded_channel();
        let recorder = tokio::spawn(storage::record_alerts(storage.clone(), alert_rx));

        let mut notifier = FanOut::new().with(ChannelNotifier::new(alert_tx));
        if config.console {
            notifier = notifier.with(ConsoleNotifier);
        }
        let notifier = Arc::new(notifier);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut broker = Broker::new();
        let mut subscribers = Vec::new();

        if config.run_fall {
            let consumer = broker.declare(ACCELEROMETER_QUEUE, config.queue_capacity)?;
            let handler = FallHandler::new(config.thresholds);
            let notifier = notifier.clone();
            let shutdown_rx = shutdown_rx.clone();
            subscribers.push(tokio::spawn(async move {
                consume(consumer, handler, &*notifier, shutdown_rx).await
            }));
        }

        if config.run_medication {
            let consumer = broker.declare(DATETIME_QUEUE, config.queue_capacity)?;
            let handler =
                MedicationHandler::new(MedicationScheduler::new(config.dosage, config.seed));
            let notifier = notifier.clone();
            let shutdown_rx = shutdown_rx.clone();
            subscribers.push(tokio::spawn(async move {
                consume(consumer, handler, &*notifier, shutdown_rx).await
            }));
        }

        if subscribers.is_empty() {
            warn!("No subscribers configured; messages will be rejected");
        }

        Ok(Self {
            state: AppState { storage, broker },
            shutdown,
            subscribers,
            recorder,
        })
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Stop subscribers between messages and flush the alert recorder.
    ///
    /// Deliveries still queued are left unacknowledged.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let Self {
            state,
            shutdown,
            subscribers,
            recorder,
        } = self;

        // Receivers may already be gone if every subscriber exited.
        let _ = shutdown.send(true);
        drop(state);

        for subscriber in subscribers {
            let handled = subscriber.await?;
            info!(handled, "Subscriber joined");
        }

        let recorded = recorder.await?;
        info!(recorded, "Alert recorder flushed");
        Ok(())
    }
}
