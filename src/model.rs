//! Data models for SMAM.
//!
//! Inbound messages ([`AccelerationSample`], [`Tick`]) live only for the
//! duration of one delivery. Outbound [`Alert`]s are handed to notifiers and
//! recorded in the alert history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{self, Fields, ParseError};
use crate::timestamp::Timestamp;

/// Why a delivery could not be turned into a typed message.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8")]
    Encoding,

    #[error("malformed payload: {0}")]
    Syntax(#[from] ParseError),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid value `{value}` for field `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
}

fn payload_fields(payload: &[u8]) -> Result<Fields, DecodeError> {
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::Encoding)?;
    Ok(codec::decode_fields(text)?)
}

fn required<'a>(fields: &'a Fields, field: &'static str) -> Result<&'a str, DecodeError> {
    fields
        .get(field)
        .map(String::as_str)
        .ok_or(DecodeError::MissingField(field))
}

fn timestamp_field(fields: &Fields, field: &'static str) -> Result<Timestamp, DecodeError> {
    let value = required(fields, field)?;
    value.parse().map_err(|e: crate::timestamp::TimestampError| {
        DecodeError::InvalidField {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        }
    })
}

fn float_field(fields: &Fields, field: &'static str) -> Result<f64, DecodeError> {
    let value = required(fields, field)?;
    value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseFloatError| DecodeError::InvalidField {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// One tri-axial acceleration reading from a wearable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelerationSample {
    /// Device id, which doubles as the subject id.
    pub subject_id: String,
    pub model: String,
    pub timestamp: Timestamp,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelerationSample {
    /// Build from decoded fields `id, datetime, x_position, y_position,
    /// z_position, model`. Extra fields are ignored.
    pub fn from_fields(fields: &Fields) -> Result<Self, DecodeError> {
        Ok(Self {
            subject_id: required(fields, "id")?.to_string(),
            model: required(fields, "model")?.to_string(),
            timestamp: timestamp_field(fields, "datetime")?,
            x: float_field(fields, "x_position")?,
            y: float_field(fields, "y_position")?,
            z: float_field(fields, "z_position")?,
        })
    }

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        Self::from_fields(&payload_fields(payload)?)
    }
}

/// A periodic device-clock tick that drives the medication scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub subject_id: String,
    pub model: String,
    pub timestamp: Timestamp,
}

impl Tick {
    /// Build from decoded fields `id, datetime, model`.
    pub fn from_fields(fields: &Fields) -> Result<Self, DecodeError> {
        Ok(Self {
            subject_id: required(fields, "id")?.to_string(),
            model: required(fields, "model")?.to_string(),
            timestamp: timestamp_field(fields, "datetime")?,
        })
    }

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        Self::from_fields(&payload_fields(payload)?)
    }
}

/// A possible fall detected from an acceleration sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallAlert {
    pub subject_id: String,
    pub model: String,
    pub timestamp: Timestamp,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<&AccelerationSample> for FallAlert {
    fn from(sample: &AccelerationSample) -> Self {
        Self {
            subject_id: sample.subject_id.clone(),
            model: sample.model.clone(),
            timestamp: sample.timestamp,
            x: sample.x,
            y: sample.y,
            z: sample.z,
        }
    }
}

/// A reminder that a subject must take their medication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationAlert {
    pub subject_id: String,
    pub model: String,
    pub timestamp: Timestamp,
    pub drug: String,
    pub dosage: String,
}

/// Any alert a subscriber can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Alert {
    Fall(FallAlert),
    Medication(MedicationAlert),
}

impl Alert {
    pub fn kind(&self) -> AlertKind {
        match self {
            Alert::Fall(_) => AlertKind::Fall,
            Alert::Medication(_) => AlertKind::Medication,
        }
    }

    pub fn subject_id(&self) -> &str {
        match self {
            Alert::Fall(a) => &a.subject_id,
            Alert::Medication(a) => &a.subject_id,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Alert::Fall(a) => &a.model,
            Alert::Medication(a) => &a.model,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Alert::Fall(a) => a.timestamp,
            Alert::Medication(a) => a.timestamp,
        }
    }
}

/// Discriminant of [`Alert`], used for storage and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Fall,
    Medication,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Fall => "fall",
            AlertKind::Medication => "medication",
        }
    }
}

/// An alert as recorded in the alert history.
#[derive(Debug, Clone, Serialize)]
pub struct StoredAlert {
    pub id: i64,

    /// Server-side time the alert was recorded (UTC).
    pub recorded_at: DateTime<Utc>,

    pub alert: Alert,
}

/// Response for GET /alerts endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<StoredAlert>,
}

/// Query parameters for GET /alerts/recent.
#[derive(Debug, Deserialize)]
pub struct RecentAlertsQuery {
    /// Maximum number of alerts to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Optional kind filter: "fall" or "medication".
    pub kind: Option<AlertKind>,
}

fn default_limit() -> u32 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_acceleration_legacy() {
        let sample = AccelerationSample::decode(
            b"{'id': 'A1', 'datetime': '2019:03:01:10:15:45', 'x_position': 0.3, \
              'y_position': 0.7, 'z_position': 0.1, 'model': 'Xiaomi My Band 2'}",
        )
        .unwrap();

        assert_eq!(sample.subject_id, "A1");
        assert_eq!(sample.model, "Xiaomi My Band 2");
        assert_eq!(sample.timestamp, Timestamp::new(2019, 3, 1, 10, 15, 45));
        assert_eq!(sample.x, 0.3);
        assert_eq!(sample.y, 0.7);
        assert_eq!(sample.z, 0.1);
    }

    #[test]
    fn test_decode_tick_json() {
        let tick =
            Tick::decode(br#"{"id": "B7", "datetime": "2019:03:01:10:15:45", "model": "Fitbit"}"#)
                .unwrap();

        assert_eq!(tick.subject_id, "B7");
        assert_eq!(tick.model, "Fitbit");
        assert_eq!(tick.timestamp.minute, 15);
    }

    #[test]
    fn test_missing_field_is_distinct_from_syntax() {
        let err = Tick::decode(b"{'id': 'B7', 'model': 'Fitbit'}").unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("datetime")));

        let err = Tick::decode(b"'id': 'B7'").unwrap_err();
        assert!(matches!(err, DecodeError::Syntax(ParseError::Unbraced)));
    }

    #[test]
    fn test_invalid_numeric_field() {
        let err = AccelerationSample::decode(
            b"{'id': 'A1', 'datetime': '2019:03:01:10:15:45', 'x_position': high, \
              'y_position': 0.7, 'z_position': 0.1, 'model': 'M'}",
        )
        .unwrap_err();

        assert!(matches!(
            err,
            DecodeError::InvalidField { field: "x_position", .. }
        ));
    }

    #[test]
    fn test_invalid_timestamp_field() {
        let err = Tick::decode(b"{'id': 'A1', 'datetime': 'yesterday', 'model': 'M'}").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidField { field: "datetime", .. }
        ));
    }

    #[test]
    fn test_non_utf8_payload() {
        let err = Tick::decode(&[0xff, 0xfe, 0x7b]).unwrap_err();
        assert!(matches!(err, DecodeError::Encoding));
    }

    #[test]
    fn test_alert_serializes_with_kind_tag() {
        let alert = Alert::Medication(MedicationAlert {
            subject_id: "A1".to_string(),
            model: "Fitbit".to_string(),
            timestamp: Timestamp::new(2019, 3, 1, 10, 15, 45),
            drug: "Insulin".to_string(),
            dosage: "120mg".to_string(),
        });

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["kind"], "medication");
        assert_eq!(json["timestamp"], "2019:03:01:10:15:45");
        assert_eq!(json["drug"], "Insulin");

        let back: Alert = serde_json::from_value(json).unwrap();
        assert_eq!(back, alert);
        assert_eq!(back.kind(), AlertKind::Medication);
    }
}
