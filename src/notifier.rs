//! Alert delivery.
//!
//! A [`Notifier`] receives every alert a subscriber emits. Notifying has no
//! return value and is assumed to succeed; a sink that can fail (the alert
//! history, for instance) logs the failure itself.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::model::Alert;

const RULE: &str = "  ---------------------------------------------------";

pub trait Notifier: Send + Sync {
    fn notify(&self, alert: &Alert);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, alert: &Alert) {
        (**self).notify(alert)
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, alert: &Alert) {
        (**self).notify(alert)
    }
}

/// Render the warning block the caretakers' monitor shows.
pub fn render(alert: &Alert) -> String {
    let body = match alert {
        Alert::Fall(fall) => format!(
            "    Possible fall. An acceleration spike ({}, {}, {}) was detected at {} \
             for the elderly person wearing device {}:{}",
            fall.x,
            fall.y,
            fall.z,
            fall.timestamp.display_short(),
            fall.model,
            fall.subject_id
        ),
        Alert::Medication(reminder) => format!(
            "    Elderly person with id {} must take {} of {} at {}.",
            reminder.subject_id,
            reminder.dosage,
            reminder.drug,
            reminder.timestamp.display_short()
        ),
    };

    format!("{RULE}\n    WARNING\n{RULE}\n{body}\n")
}

/// Prints rendered alerts to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, alert: &Alert) {
        println!("{}", render(alert));
    }
}

/// Forwards alerts to another task, typically the history recorder.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: UnboundedSender<Alert>,
}

impl ChannelNotifier {
    pub fn new(sender: UnboundedSender<Alert>) -> Self {
        Self { sender }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, alert: &Alert) {
        if self.sender.send(alert.clone()).is_err() {
            warn!(
                subject_id = %alert.subject_id(),
                kind = alert.kind().as_str(),
                "Alert receiver closed; alert not forwarded"
            );
        }
    }
}

/// Keeps every alert in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, alert: &Alert) {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(alert.clone());
    }
}

/// Broadcasts each alert to several notifiers, in order.
#[derive(Default)]
pub struct FanOut {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.push(Box::new(notifier));
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Notifier for FanOut {
    fn notify(&self, alert: &Alert) {
        for notifier in &self.notifiers {
            notifier.notify(alert);
        }
    }
}
