//! Store domain model.
//!
//! # Responsibility
//! - Define the typed store record and its identifier.
//! - Coerce loosely typed input rows into typed records at the boundary.
//!
//! # Invariants
//! - `StoreId` is resolved once: integer-looking text becomes `Int`,
//!   anything else stays `Native`.
//! - `requires_tail_lift` is only ever taken from a JSON boolean.
//! - `name`, `address` and `postcode` are never blank on a valid record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Store primary key: integer ids from operators and imports, or the
/// store-native identifier generated when no id is supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreId {
    Int(i64),
    Native(String),
}

impl StoreId {
    /// Resolves raw operator text into an identifier.
    ///
    /// # Errors
    /// - Returns `StoreValidationError::BlankId` for empty text.
    pub fn parse(raw: &str) -> Result<Self, StoreValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StoreValidationError::BlankId);
        }
        Ok(match trimmed.parse::<i64>() {
            Ok(value) => Self::Int(value),
            Err(_) => Self::Native(trimmed.to_string()),
        })
    }

    /// Generates a fresh native identifier.
    pub fn generate() -> Self {
        Self::Native(Uuid::new_v4().to_string())
    }
}

impl Display for StoreId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Native(value) => write!(f, "{value}"),
        }
    }
}

/// Day of week used as restriction key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }

    /// Parses full or three-letter day names, case-insensitively.
    pub fn parse(value: &str) -> Result<Self, StoreValidationError> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| {
                let name = day.as_str().to_ascii_lowercase();
                normalized == name || (normalized.len() == 3 && name.starts_with(&normalized))
            })
            .ok_or_else(|| StoreValidationError::UnknownWeekday(value.trim().to_string()))
    }
}

impl Display for Weekday {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-text access hours per weekday.
pub type Restrictions = BTreeMap<Weekday, String>;

/// Typed store record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: StoreId,
    pub name: String,
    pub address: String,
    pub postcode: String,
    pub distance_km: f64,
    pub requires_tail_lift: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Restrictions>,
}

impl StoreRecord {
    /// Creates a record without restrictions.
    pub fn new(
        id: StoreId,
        name: impl Into<String>,
        address: impl Into<String>,
        postcode: impl Into<String>,
        distance_km: f64,
        requires_tail_lift: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            address: address.into(),
            postcode: postcode.into(),
            distance_km,
            requires_tail_lift,
            restrictions: None,
        }
    }

    /// Checks required fields before persistence.
    pub fn validate(&self) -> Result<(), StoreValidationError> {
        if let StoreId::Native(value) = &self.id {
            if value.trim().is_empty() {
                return Err(StoreValidationError::BlankId);
            }
        }
        for (field, value) in [
            ("name", &self.name),
            ("address", &self.address),
            ("postcode", &self.postcode),
        ] {
            if value.trim().is_empty() {
                return Err(StoreValidationError::BlankField(field));
            }
        }
        if !self.distance_km.is_finite() {
            return Err(StoreValidationError::NonFiniteDistance);
        }
        Ok(())
    }
}

/// Loosely typed store row as supplied by operators or import files.
///
/// Field names follow the import sheet columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreInput {
    #[serde(rename = "ID", default)]
    pub id: Value,
    #[serde(rename = "Store Name", default)]
    pub name: Value,
    #[serde(rename = "Store Address", default)]
    pub address: Value,
    #[serde(rename = "Store Postcode", default)]
    pub postcode: Value,
    #[serde(rename = "Kilometers", default)]
    pub distance_km: Value,
    #[serde(rename = "Tail Lift", default)]
    pub requires_tail_lift: Value,
}

impl StoreInput {
    /// Coerces this row into a typed, validated record.
    ///
    /// A missing id gets a generated native identifier. Text fields accept
    /// strings or numbers, `distance_km` accepts numbers or numeric text, and
    /// `requires_tail_lift` accepts only booleans.
    pub fn to_record(&self) -> Result<StoreRecord, StoreValidationError> {
        let record = StoreRecord {
            id: coerce_id(&self.id)?,
            name: coerce_text("name", &self.name)?,
            address: coerce_text("address", &self.address)?,
            postcode: coerce_text("postcode", &self.postcode)?,
            distance_km: coerce_distance(&self.distance_km)?,
            requires_tail_lift: match &self.requires_tail_lift {
                Value::Bool(value) => *value,
                Value::Null => return Err(StoreValidationError::MissingField("requires_tail_lift")),
                other => {
                    return Err(StoreValidationError::WrongType {
                        field: "requires_tail_lift",
                        expected: "boolean",
                        found: json_type_name(other),
                    })
                }
            },
            restrictions: None,
        };
        record.validate()?;
        Ok(record)
    }
}

impl From<&StoreRecord> for StoreInput {
    fn from(record: &StoreRecord) -> Self {
        Self {
            id: match &record.id {
                StoreId::Int(value) => Value::from(*value),
                StoreId::Native(value) => Value::from(value.as_str()),
            },
            name: Value::from(record.name.as_str()),
            address: Value::from(record.address.as_str()),
            postcode: Value::from(record.postcode.as_str()),
            distance_km: Value::from(record.distance_km),
            requires_tail_lift: Value::Bool(record.requires_tail_lift),
        }
    }
}

fn coerce_id(value: &Value) -> Result<StoreId, StoreValidationError> {
    match value {
        Value::Null => Ok(StoreId::generate()),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return Ok(StoreId::Int(int));
            }
            if number.is_u64() {
                return Err(StoreValidationError::IdOutOfRange(number.to_string()));
            }
            // Spreadsheet cells carry whole numbers as floats.
            match number.as_f64() {
                Some(float) if float.fract() == 0.0 => {
                    if float >= i64::MIN as f64 && float < i64::MAX as f64 {
                        Ok(StoreId::Int(float as i64))
                    } else {
                        Err(StoreValidationError::IdOutOfRange(number.to_string()))
                    }
                }
                _ => Err(StoreValidationError::WrongType {
                    field: "id",
                    expected: "integer or text",
                    found: "fractional number",
                }),
            }
        }
        Value::String(text) => StoreId::parse(text),
        other => Err(StoreValidationError::WrongType {
            field: "id",
            expected: "integer or text",
            found: json_type_name(other),
        }),
    }
}

fn coerce_text(field: &'static str, value: &Value) -> Result<String, StoreValidationError> {
    match value {
        Value::String(text) => Ok(text.trim().to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Null => Err(StoreValidationError::MissingField(field)),
        other => Err(StoreValidationError::WrongType {
            field,
            expected: "text",
            found: json_type_name(other),
        }),
    }
}

fn coerce_distance(value: &Value) -> Result<f64, StoreValidationError> {
    let wrong_type = |found| StoreValidationError::WrongType {
        field: "distance_km",
        expected: "number",
        found,
    };
    match value {
        Value::Number(number) => number.as_f64().ok_or_else(|| wrong_type("number")),
        Value::String(text) => text.trim().parse::<f64>().map_err(|_| wrong_type("string")),
        Value::Null => Err(StoreValidationError::MissingField("distance_km")),
        other => Err(wrong_type(json_type_name(other))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Input validation failures for store records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValidationError {
    BlankId,
    /// Whole-number id that does not fit a signed 64-bit integer.
    IdOutOfRange(String),
    MissingField(&'static str),
    BlankField(&'static str),
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    NonFiniteDistance,
    UnknownWeekday(String),
}

impl Display for StoreValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankId => write!(f, "store id must not be blank"),
            Self::IdOutOfRange(value) => {
                write!(f, "store id {value} is outside the supported integer range")
            }
            Self::MissingField(field) => write!(f, "missing required field `{field}`"),
            Self::BlankField(field) => write!(f, "field `{field}` must not be blank"),
            Self::WrongType {
                field,
                expected,
                found,
            } => write!(f, "field `{field}` must be {expected}, found {found}"),
            Self::NonFiniteDistance => write!(f, "field `distance_km` must be a finite number"),
            Self::UnknownWeekday(value) => write!(f, "unknown weekday `{value}`"),
        }
    }
}

impl Error for StoreValidationError {}
