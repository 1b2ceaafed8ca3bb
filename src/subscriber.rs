//! Queue subscribers.
//!
//! A subscriber pulls one delivery at a time, hands the payload to its
//! [`Handler`], forwards any resulting alert to the notifier and acknowledges
//! the delivery. Every delivery is acknowledged: a payload that fails to
//! decode is logged and skipped, never redelivered, and never stops the loop.
//!
//! Shutdown is only observed between deliveries, so an in-flight message is
//! always fully handled, notified and acknowledged first.

use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::classifier::FallThresholds;
use crate::model::{AccelerationSample, Alert, DecodeError, Tick};
use crate::notifier::Notifier;
use crate::queue::Consumer;
use crate::scheduler::MedicationScheduler;

/// Turns one payload into at most one alert.
pub trait Handler {
    fn handle(&mut self, payload: &[u8]) -> Result<Option<Alert>, DecodeError>;
}

/// What happened to a single delivery.
#[derive(Debug)]
pub enum Outcome {
    Alerted(Alert),
    Quiet,
    Skipped(DecodeError),
}

/// Handles acceleration samples with the fall classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallHandler {
    thresholds: FallThresholds,
}

impl FallHandler {
    pub fn new(thresholds: FallThresholds) -> Self {
        Self { thresholds }
    }
}

impl Handler for FallHandler {
    fn handle(&mut self, payload: &[u8]) -> Result<Option<Alert>, DecodeError> {
        let sample = AccelerationSample::decode(payload)?;
        Ok(self.thresholds.check(&sample).map(Alert::Fall))
    }
}

/// Handles clock ticks with the medication scheduler.
pub struct MedicationHandler<R = rand::rngs::StdRng> {
    scheduler: MedicationScheduler<R>,
}

impl<R: Rng> MedicationHandler<R> {
    pub fn new(scheduler: MedicationScheduler<R>) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &MedicationScheduler<R> {
        &self.scheduler
    }
}

impl<R: Rng> Handler for MedicationHandler<R> {
    fn handle(&mut self, payload: &[u8]) -> Result<Option<Alert>, DecodeError> {
        let tick = Tick::decode(payload)?;
        Ok(self.scheduler.on_tick(&tick).map(Alert::Medication))
    }
}

/// Handle one payload and notify, isolating decode failures.
pub fn process<H, N>(handler: &mut H, notifier: &N, payload: &[u8]) -> Outcome
where
    H: Handler + ?Sized,
    N: Notifier + ?Sized,
{
    match handler.handle(payload) {
        Ok(Some(alert)) => {
            notifier.notify(&alert);
            Outcome::Alerted(alert)
        }
        Ok(None) => Outcome::Quiet,
        Err(e) => Outcome::Skipped(e),
    }
}

/// Consume `consumer` until every publisher is gone or `shutdown` flips to
/// `true`. Returns the number of deliveries handled.
pub async fn consume<H, N>(
    mut consumer: Consumer,
    mut handler: H,
    notifier: &N,
    mut shutdown: watch::Receiver<bool>,
) -> u64
where
    H: Handler,
    N: Notifier + ?Sized,
{
    let queue = consumer.name().to_string();
    let mut handled = 0u64;
    info!(queue = %queue, "Subscriber started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let delivery = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // Sender dropped: nobody can ask us to stop anymore.
                    consumer.next().await
                } else {
                    continue;
                }
            }
            delivery = consumer.next() => delivery,
        };

        let Some(delivery) = delivery else {
            break;
        };

        match process(&mut handler, notifier, delivery.body()) {
            Outcome::Alerted(alert) => {
                info!(
                    queue = %queue,
                    tag = delivery.tag(),
                    kind = alert.kind().as_str(),
                    subject_id = %alert.subject_id(),
                    "Alert emitted"
                );
            }
            Outcome::Quiet => {
                debug!(queue = %queue, tag = delivery.tag(), "Delivery handled");
            }
            Outcome::Skipped(e) => {
                warn!(
                    queue = %queue,
                    tag = delivery.tag(),
                    error = %e,
                    "Skipping undecodable delivery"
                );
            }
        }

        delivery.ack();
        handled += 1;
    }

    info!(queue = %queue, handled, "Subscriber stopped");
    handled
}
