use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const STATUS_AVAILABLE: &str = "available";
pub const STATUS_REQUESTED: &str = "requested";

/// One donation listing. Apart from the key, the document is schemaless and
/// kept exactly as the client submitted it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FoodRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl FoodRecord {
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    pub fn status(&self) -> Option<&str> {
        self.str_field("foodStatus")
    }

    /// Case-normalized copy of the name, used for lexicographic ordering.
    pub fn name_lower(&self) -> String {
        self.str_field("foodName").unwrap_or_default().to_lowercase()
    }

    /// Quantity arrives as a JSON number or a numeric string depending on the
    /// client form; coerce either, treating anything else as zero.
    pub fn quantity(&self) -> f64 {
        match self.fields.get("foodQuantity") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Expiry is stored as text and parsed on demand for sorting.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        parse_datetime(self.str_field("expiredDateTime")?)
    }
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

// Store acknowledgments, passed through to the caller unmodified.

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InsertAck {
    pub acknowledged: bool,
    pub inserted_id: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAck {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAck {
    pub acknowledged: bool,
    pub deleted_count: u64,
}
