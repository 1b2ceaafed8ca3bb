//! Medication reminder scheduling.
//!
//! The scheduler never keeps a timer. Devices send clock ticks at their own
//! cadence and every tick is checked against the subject's reminder window,
//! so "is it time" is derived purely from the device clock.
//!
//! # Lifecycle per subject
//!
//! - **Unseen**: no record yet.
//! - **Registered**: drug, dosage and base time assigned on the first tick.
//! - **Notified**: the reminder fired. The flag is never cleared, so each
//!   subject is reminded at most once for the lifetime of the scheduler.
//!
//! # Catalog bootstrap
//!
//! The six catalog drugs get their base times from the very first tick the
//! scheduler receives, whoever sent it. Later ticks never touch the catalog.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{MedicationAlert, Tick};
use crate::timestamp::{TimeOfDay, Timestamp};

/// The fixed drug catalog, in assignment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Drug {
    Ibuprofen,
    Paracetamol,
    Insulin,
    Furosemide,
    Piroxicam,
    Tolbutamide,
}

impl Drug {
    pub const ALL: [Drug; 6] = [
        Drug::Ibuprofen,
        Drug::Paracetamol,
        Drug::Insulin,
        Drug::Furosemide,
        Drug::Piroxicam,
        Drug::Tolbutamide,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Drug::Ibuprofen => "Ibuprofen",
            Drug::Paracetamol => "Paracetamol",
            Drug::Insulin => "Insulin",
            Drug::Furosemide => "Furosemide",
            Drug::Piroxicam => "Piroxicam",
            Drug::Tolbutamide => "Tolbutamide",
        }
    }
}

/// One drug with its assigned base time-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub drug: Drug,
    pub base_time: TimeOfDay,
}

/// The populated medication catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Assign base times from the first tick.
    ///
    /// Walks the drugs in catalog order; the running time advances one hour
    /// after every odd index, giving slots `h, h, h+1, h+1, h+2, h+2`.
    pub fn bootstrap(first_tick: Timestamp) -> Self {
        let mut time = TimeOfDay::base_from(first_tick);
        let mut entries = Vec::with_capacity(Drug::ALL.len());

        for (index, drug) in Drug::ALL.into_iter().enumerate() {
            entries.push(CatalogEntry {
                drug,
                base_time: time,
            });
            if index % 2 == 1 {
                time = time.next_hour();
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn base_time(&self, drug: Drug) -> Option<TimeOfDay> {
        self.entries
            .iter()
            .find(|entry| entry.drug == drug)
            .map(|entry| entry.base_time)
    }
}

/// How dosages are assigned to newly registered subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DosagePolicy {
    /// Every subject gets the same amount in milligrams.
    Fixed(u32),
    /// Uniform in `min..=max` milligrams.
    Range { min: u32, max: u32 },
}

impl Default for DosagePolicy {
    fn default() -> Self {
        DosagePolicy::Range { min: 50, max: 200 }
    }
}

impl DosagePolicy {
    fn assign<R: Rng>(&self, rng: &mut R) -> String {
        let milligrams = match *self {
            DosagePolicy::Fixed(mg) => mg,
            DosagePolicy::Range { min, max } if min <= max => rng.gen_range(min..=max),
            DosagePolicy::Range { min, .. } => min,
        };
        format!("{milligrams}mg")
    }
}

/// Per-subject medication assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectRecord {
    pub drug: Drug,
    pub base_time: TimeOfDay,
    pub dosage: String,
    pub notified: bool,
}

/// Where a subject currently is in the reminder lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectState {
    Unseen,
    Registered,
    Notified,
}

/// Owns the catalog and all subject records for one consumer.
pub struct MedicationScheduler<R = StdRng> {
    catalog: Option<Catalog>,
    subjects: HashMap<String, SubjectRecord>,
    dosage: DosagePolicy,
    rng: R,
}

impl MedicationScheduler<StdRng> {
    /// Create a scheduler; a `seed` makes drug and dosage assignment
    /// reproducible, `None` seeds from the OS.
    pub fn new(dosage: DosagePolicy, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(dosage, rng)
    }
}

impl<R: Rng> MedicationScheduler<R> {
    pub fn with_rng(dosage: DosagePolicy, rng: R) -> Self {
        Self {
            catalog: None,
            subjects: HashMap::new(),
            dosage,
            rng,
        }
    }

    /// Process one tick, returning the reminder to emit, if any.
    pub fn on_tick(&mut self, tick: &Tick) -> Option<MedicationAlert> {
        self.bootstrap(tick.timestamp);
        let record = self.register(&tick.subject_id)?;

        if record.notified || !record.base_time.is_due(tick.timestamp) {
            return None;
        }

        record.notified = true;
        info!(
            subject_id = %tick.subject_id,
            drug = record.drug.name(),
            dosage = %record.dosage,
            "Medication reminder due"
        );

        Some(MedicationAlert {
            subject_id: tick.subject_id.clone(),
            model: tick.model.clone(),
            timestamp: tick.timestamp,
            drug: record.drug.name().to_string(),
            dosage: record.dosage.clone(),
        })
    }

    /// Populate the catalog from `first_tick` unless it already is.
    ///
    /// Returns whether this call populated it.
    pub fn bootstrap(&mut self, first_tick: Timestamp) -> bool {
        if self.catalog.is_some() {
            return false;
        }

        let catalog = Catalog::bootstrap(first_tick);
        info!(
            first_tick = %first_tick,
            base_time = %TimeOfDay::base_from(first_tick),
            "Medication catalog populated"
        );
        self.catalog = Some(catalog);
        true
    }

    /// Look up or create the record for `subject_id`.
    ///
    /// Returns `None` only before the catalog is populated.
    fn register(&mut self, subject_id: &str) -> Option<&mut SubjectRecord> {
        let catalog = self.catalog.as_ref()?;

        if !self.subjects.contains_key(subject_id) {
            let entries = catalog.entries();
            let entry = entries[self.rng.gen_range(0..entries.len())];
            let record = SubjectRecord {
                drug: entry.drug,
                base_time: entry.base_time,
                dosage: self.dosage.assign(&mut self.rng),
                notified: false,
            };
            debug!(
                subject_id,
                drug = record.drug.name(),
                base_time = %record.base_time,
                dosage = %record.dosage,
                "Subject registered"
            );
            self.subjects.insert(subject_id.to_string(), record);
        }

        self.subjects.get_mut(subject_id)
    }

    pub fn state_of(&self, subject_id: &str) -> SubjectState {
        match self.subjects.get(subject_id) {
            None => SubjectState::Unseen,
            Some(record) if record.notified => SubjectState::Notified,
            Some(_) => SubjectState::Registered,
        }
    }

    pub fn subject(&self, subject_id: &str) -> Option<&SubjectRecord> {
        self.subjects.get(subject_id)
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    pub fn notified_subjects(&self) -> impl Iterator<Item = &str> {
        self.subjects
            .iter()
            .filter(|(_, record)| record.notified)
            .map(|(id, _)| id.as_str())
    }
}
