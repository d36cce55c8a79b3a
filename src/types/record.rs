//! Slip and revision records as they come out of a report store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a packing slip.
///
/// Wraps the database id and implements `Ord` for deterministic ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlipId(i64);

impl SlipId {
    /// Create a new SlipId.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw database id.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SlipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SlipId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// One line of a packing slip, joined with its catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlipLineRecord {
    /// Line id.
    pub id: i64,
    /// Catalog item id, if the line references one.
    pub item_id: Option<i64>,
    /// Item SKU.
    pub sku: String,
    /// Item display name.
    pub item_name: String,
    /// Item unit of measure.
    pub unit: String,
    /// Item notes.
    pub notes: String,
    /// Shipped quantity.
    pub qty: f64,
    /// Box label the line was packed into.
    pub box_name: String,
    /// Box number the line was packed into.
    pub box_number: String,
}

impl SlipLineRecord {
    /// Create a line with a quantity and no item details.
    pub fn new(id: i64, item_id: Option<i64>, qty: f64) -> Self {
        Self {
            id,
            item_id,
            sku: String::new(),
            item_name: String::new(),
            unit: String::new(),
            notes: String::new(),
            qty,
            box_name: String::new(),
            box_number: String::new(),
        }
    }

    /// Attach catalog item details.
    pub fn with_item(
        mut self,
        sku: impl Into<String>,
        name: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        self.sku = sku.into();
        self.item_name = name.into();
        self.unit = unit.into();
        self
    }

    /// Attach box placement.
    pub fn with_box(mut self, box_name: impl Into<String>, box_number: impl Into<String>) -> Self {
        self.box_name = box_name.into();
        self.box_number = box_number.into();
        self
    }
}

/// A packing slip header with its lines.
///
/// Empty strings stand for absent optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlipRecord {
    /// Slip id.
    pub id: SlipId,
    /// Human-facing slip number (e.g. `PS-000042`).
    pub slip_no: String,
    /// Slip date, used for report windows and buckets.
    pub slip_date: DateTime<Utc>,
    /// Customer name.
    pub customer_name: String,
    /// Ship-to address.
    pub ship_to: String,
    /// Vendor id, if assigned.
    pub vendor_id: Option<i64>,
    /// Vendor name, if the vendor row exists.
    pub vendor_name: Option<String>,
    /// Purchase order / bill reference.
    pub po_number: String,
    /// Box number on the header.
    pub box_number: String,
    /// Carrier tracking number.
    pub tracking_number: String,
    /// Slip lines.
    pub lines: Vec<SlipLineRecord>,
}

impl SlipRecord {
    /// Create a slip header with no lines and no optional fields.
    pub fn new(
        id: SlipId,
        slip_no: impl Into<String>,
        slip_date: DateTime<Utc>,
        customer_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            slip_no: slip_no.into(),
            slip_date,
            customer_name: customer_name.into(),
            ship_to: String::new(),
            vendor_id: None,
            vendor_name: None,
            po_number: String::new(),
            box_number: String::new(),
            tracking_number: String::new(),
            lines: Vec::new(),
        }
    }

    /// Assign a vendor.
    pub fn with_vendor(mut self, vendor_id: i64, vendor_name: impl Into<String>) -> Self {
        self.vendor_id = Some(vendor_id);
        self.vendor_name = Some(vendor_name.into());
        self
    }

    /// Set the tracking number.
    pub fn with_tracking(mut self, tracking_number: impl Into<String>) -> Self {
        self.tracking_number = tracking_number.into();
        self
    }

    /// Set the header box number.
    pub fn with_box_number(mut self, box_number: impl Into<String>) -> Self {
        self.box_number = box_number.into();
        self
    }

    /// Append a line.
    pub fn with_line(mut self, line: SlipLineRecord) -> Self {
        self.lines.push(line);
        self
    }

    /// Whether a tracking number has been recorded.
    pub fn has_tracking(&self) -> bool {
        !self.tracking_number.is_empty()
    }

    /// Sum of line quantities.
    pub fn total_qty(&self) -> f64 {
        self.lines.iter().map(|l| l.qty).sum()
    }
}

/// A stored revision of a slip: the raw snapshot blob and its version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRecord {
    /// Revision id.
    pub id: i64,
    /// Owning slip.
    pub slip_id: SlipId,
    /// Version number, starting at 1.
    pub version: u32,
    /// When the revision was written.
    pub created_at: DateTime<Utc>,
    /// Serialized snapshot, parsed on read.
    pub snapshot: String,
}

impl RevisionRecord {
    /// Create a revision record.
    pub fn new(
        id: i64,
        slip_id: SlipId,
        version: u32,
        created_at: DateTime<Utc>,
        snapshot: impl Into<String>,
    ) -> Self {
        Self {
            id,
            slip_id,
            version,
            created_at,
            snapshot: snapshot.into(),
        }
    }
}
