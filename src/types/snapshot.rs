//! Revision snapshots of a packing slip.
//!
//! A snapshot is written once, whenever a slip is saved, as a JSON blob
//! with camelCase keys. It is parsed on read and never mutated.
//!
//! ## Parsing
//!
//! The envelope is strict: the blob must be JSON and its top level must be
//! an object, otherwise the snapshot is invalid. Field shapes inside the
//! envelope are lenient:
//!
//! - text fields that are not strings read as `""`, strings are trimmed
//! - a `lines` value that is not an array reads as no lines
//! - line entries that are not objects are dropped
//! - quantities accept numbers and numeric strings, anything else is `0`
//! - item ids are kept only when they are positive integers

use chrono::SecondsFormat;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use super::record::SlipRecord;

/// Error returned when a stored snapshot cannot be read.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The blob is not valid JSON.
    #[error("Snapshot is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The blob parsed, but the top level is not an object.
    #[error("Snapshot top level is {0}, expected an object")]
    NotAnObject(&'static str),
}

/// Reference to the item on a line, used as the first part of a [`LineKey`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemRef {
    /// Catalog item id.
    Id(i64),
    /// Lowercased, trimmed item name (when no id is known).
    Name(String),
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{}", id),
            Self::Name(name) => write!(f, "name:{}", name),
        }
    }
}

/// Identity of a line across snapshots: item plus box placement.
///
/// Two lines with the same key inside one snapshot are treated as one
/// aggregate by the differ.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineKey {
    /// Item reference.
    pub item: ItemRef,
    /// Lowercased, trimmed box name.
    pub box_name: String,
    /// Lowercased, trimmed box number.
    pub box_number: String,
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.item, self.box_name, self.box_number)
    }
}

/// One line inside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotLine {
    /// Catalog item id.
    #[serde(default, deserialize_with = "lenient_item_id")]
    pub item_id: Option<i64>,
    /// Item name at the time of the save.
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    /// Item unit.
    #[serde(default, deserialize_with = "lenient_text")]
    pub unit: String,
    /// Item notes.
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// Quantity.
    #[serde(default, deserialize_with = "lenient_qty")]
    pub qty: f64,
    /// Box label.
    #[serde(default, deserialize_with = "lenient_text")]
    pub box_name: String,
    /// Box number.
    #[serde(default, deserialize_with = "lenient_text")]
    pub box_number: String,
}

impl SnapshotLine {
    /// Create a line from its identity fields and quantity.
    pub fn new(
        item_id: Option<i64>,
        name: impl Into<String>,
        box_name: impl Into<String>,
        box_number: impl Into<String>,
        qty: f64,
    ) -> Self {
        Self {
            item_id,
            name: name.into(),
            box_name: box_name.into(),
            box_number: box_number.into(),
            qty,
            ..Self::default()
        }
    }

    /// Derive the identity key of this line.
    ///
    /// Prefers the item id; falls back to the lowercased name, so two
    /// different items sharing a name collapse into one key.
    pub fn key(&self) -> LineKey {
        let item = match self.item_id {
            Some(id) if id > 0 => ItemRef::Id(id),
            _ => ItemRef::Name(self.name.trim().to_lowercase()),
        };

        LineKey {
            item,
            box_name: self.box_name.trim().to_lowercase(),
            box_number: self.box_number.trim().to_lowercase(),
        }
    }
}

/// A point-in-time copy of a slip's header and lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Slip number.
    #[serde(default, deserialize_with = "lenient_text")]
    pub slip_no: String,
    /// Slip date as an RFC 3339 string.
    #[serde(default, deserialize_with = "lenient_text")]
    pub slip_date: String,
    /// Customer name.
    #[serde(default, deserialize_with = "lenient_text")]
    pub customer_name: String,
    /// Ship-to address.
    #[serde(default, deserialize_with = "lenient_text")]
    pub ship_to: String,
    /// Purchase order / bill reference.
    #[serde(default, deserialize_with = "lenient_text")]
    pub po_number: String,
    /// Header box number.
    #[serde(default, deserialize_with = "lenient_text")]
    pub box_number: String,
    /// Tracking number.
    #[serde(default, deserialize_with = "lenient_text")]
    pub tracking_number: String,
    /// Lines in save order.
    #[serde(default, deserialize_with = "lenient_lines")]
    pub lines: Vec<SnapshotLine>,
}

impl Snapshot {
    /// Parse a stored snapshot blob.
    pub fn parse(raw: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(raw)?;
        match value {
            Value::Object(_) => Ok(serde_json::from_value(value)?),
            other => Err(SnapshotError::NotAnObject(json_kind(&other))),
        }
    }

    /// Capture the current state of a slip.
    pub fn capture(slip: &SlipRecord) -> Self {
        Self {
            slip_no: slip.slip_no.clone(),
            slip_date: slip.slip_date.to_rfc3339_opts(SecondsFormat::Millis, true),
            customer_name: slip.customer_name.clone(),
            ship_to: slip.ship_to.clone(),
            po_number: slip.po_number.clone(),
            box_number: slip.box_number.clone(),
            tracking_number: slip.tracking_number.clone(),
            lines: slip
                .lines
                .iter()
                .map(|line| SnapshotLine {
                    item_id: line.item_id,
                    name: line.item_name.clone(),
                    unit: line.unit.clone(),
                    notes: line.notes.clone(),
                    qty: line.qty,
                    box_name: line.box_name.clone(),
                    box_number: line.box_number.clone(),
                })
                .collect(),
        }
    }

    /// Serialize to the stored blob format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Number of lines, before any aggregation.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Read a JSON number or numeric string as a finite float.
fn numeric(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s.trim().to_string(),
        _ => String::new(),
    })
}

fn lenient_qty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(numeric(&Value::deserialize(deserializer)?).unwrap_or(0.0))
}

fn lenient_item_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if matches!(value, Value::Bool(_)) {
        return Ok(None);
    }
    Ok(numeric(&value)
        .filter(|n| n.fract() == 0.0 && *n > 0.0 && *n <= i64::MAX as f64)
        .map(|n| n as i64))
}

fn lenient_lines<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SnapshotLine>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}
