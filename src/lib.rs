//! SMAM - alert subscribers for elderly monitoring wearables.
//!
//! # Overview
//!
//! Wearables publish two message streams: tri-axial acceleration samples and
//! periodic device-clock ticks. SMAM subscribes to both and turns them into
//! alerts for caretakers:
//!
//! - a **fall alert** when a sample crosses the fall thresholds, and
//! - a **medication reminder** when a subject's clock enters the window of
//!   the drug assigned to them.
//!
//! Alerts are rendered to the console monitor and kept in an SQLite history.
//! Medication schedules are held in memory only and do not survive a restart.
//!
//! # Modules
//!
//! - [`timestamp`]: device timestamps and time-of-day arithmetic
//! - [`codec`]: legacy and JSON payload decoding
//! - [`model`]: typed messages and alerts
//! - [`classifier`]: fall classifier
//! - [`scheduler`]: medication scheduler
//! - [`notifier`]: alert sinks
//! - [`queue`]: in-process message broker
//! - [`subscriber`]: consumer loop
//! - [`storage`]: SQLite alert history
//! - [`api`]: HTTP API handlers
//! - [`config`]: environment configuration
//! - [`app`]: service wiring

pub mod api;
pub mod app;
pub mod classifier;
pub mod codec;
pub mod config;
pub mod model;
pub mod notifier;
pub mod queue;
pub mod scheduler;
pub mod storage;
pub mod subscriber;
pub mod timestamp;
