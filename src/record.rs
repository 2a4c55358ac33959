//! Records and the typed entities built from them
//!
//! A [`Record`] is one table row materialised as a field-name to value map.
//! Values are plain strings; absent fields read as the empty string, which
//! is also what gets written back for them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CirculationError, Result};
use crate::schema::EntityKind;

/// Storage format for every date column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One row, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        self.0.insert(field.to_string(), value.into());
    }

    /// Value of a field, or `""` when absent
    pub fn get(&self, field: &str) -> &str {
        self.0.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn id(&self) -> &str {
        self.get("id")
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Map a raw row onto `fields`. Rows shorter than the schema are malformed
    /// and yield `None`; extra trailing cells are ignored.
    pub fn from_row(fields: &[&str], row: &[String]) -> Option<Self> {
        if row.len() < fields.len() {
            return None;
        }
        let map = fields
            .iter()
            .zip(row.iter())
            .map(|(field, value)| (field.to_string(), value.clone()))
            .collect();
        Some(Self(map))
    }

    /// Lay the record out in schema column order, absent fields as `""`
    pub fn to_row(&self, fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| self.get(f).to_string()).collect()
    }

    /// Overlay `partial` onto this record, restricted to `fields`. The `id`
    /// column is never overwritten.
    pub fn merge(&mut self, partial: &Record, fields: &[&str]) {
        for (field, value) in partial.fields() {
            if field == "id" || !fields.contains(&field) {
                continue;
            }
            self.set(field, value);
        }
    }
}

impl FromIterator<(String, String)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Enumerations stored as lowercase strings in their column
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Every accepted spelling, in declaration order
            pub fn values() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "Invalid {}: '{}'. Must be one of: {}",
                        $label,
                        other,
                        Self::values().join(", ")
                    )),
                }
            }
        }
    };
}

string_enum!(
    /// Standing of a member
    MemberStatus, "member status" {
        Active => "active",
        Suspended => "suspended",
        Inactive => "inactive",
    }
);

string_enum!(
    /// Kind of circulating item
    ItemType, "item type" {
        Book => "book",
        Dvd => "dvd",
        Magazine => "magazine",
        Audiobook => "audiobook",
        Other => "other",
    }
);

string_enum!(
    /// Availability of an item
    ItemStatus, "item status" {
        Available => "available",
        OnLoan => "on-loan",
        Lost => "lost",
        Damaged => "damaged",
        Retired => "retired",
    }
);

string_enum!(
    /// Loan lifecycle state
    TransactionStatus, "transaction status" {
        Active => "active",
        Returned => "returned",
        Overdue => "overdue",
        Lost => "lost",
    }
);

impl TransactionStatus {
    /// `returned` and `lost` admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Returned | TransactionStatus::Lost)
    }
}

/// Typed view over a [`Record`] of one kind
pub trait Entity: Sized {
    const KIND: EntityKind;

    fn from_record(record: &Record) -> Result<Self>;

    fn to_record(&self) -> Record;

    fn id(&self) -> &str;
}

fn invalid(kind: EntityKind, record: &Record, reason: String) -> CirculationError {
    CirculationError::InvalidRecord {
        entity: kind.label(),
        id: record.id().to_string(),
        reason,
    }
}

fn parse_field<T: FromStr<Err = String>>(kind: EntityKind, record: &Record, field: &str) -> Result<T> {
    record
        .get(field)
        .parse()
        .map_err(|reason| invalid(kind, record, reason))
}

/// Parse a `yyyy-MM-dd` date
pub fn parse_date(value: &str) -> std::result::Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn date_field(kind: EntityKind, record: &Record, field: &str) -> Result<NaiveDate> {
    parse_date(record.get(field))
        .map_err(|e| invalid(kind, record, format!("{} '{}' is not a valid date: {}", field, record.get(field), e)))
}

fn optional_date_field(kind: EntityKind, record: &Record, field: &str) -> Result<Option<NaiveDate>> {
    if record.get(field).is_empty() {
        Ok(None)
    } else {
        date_field(kind, record, field).map(Some)
    }
}

/// A library member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub status: MemberStatus,
    pub join_date: Option<NaiveDate>,
    pub notes: String,
}

impl Member {
    pub fn is_in_good_standing(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

impl Entity for Member {
    const KIND: EntityKind = EntityKind::Member;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.id().to_string(),
            name: record.get("name").to_string(),
            email: record.get("email").to_string(),
            phone: record.get("phone").to_string(),
            status: parse_field(Self::KIND, record, "status")?,
            join_date: optional_date_field(Self::KIND, record, "joinDate")?,
            notes: record.get("notes").to_string(),
        })
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", &self.id)
            .with("name", &self.name)
            .with("email", &self.email)
            .with("phone", &self.phone)
            .with("status", self.status.as_str())
            .with("joinDate", self.join_date.map(format_date).unwrap_or_default())
            .with("notes", &self.notes)
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// A circulating item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub external_code: String,
    pub status: ItemStatus,
    pub notes: String,
}

impl Item {
    pub fn is_available(&self) -> bool {
        self.status == ItemStatus::Available
    }
}

impl Entity for Item {
    const KIND: EntityKind = EntityKind::Item;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.id().to_string(),
            title: record.get("title").to_string(),
            author: record.get("author").to_string(),
            item_type: parse_field(Self::KIND, record, "type")?,
            external_code: record.get("externalCode").to_string(),
            status: parse_field(Self::KIND, record, "status")?,
            notes: record.get("notes").to_string(),
        })
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", &self.id)
            .with("title", &self.title)
            .with("author", &self.author)
            .with("type", self.item_type.as_str())
            .with("externalCode", &self.external_code)
            .with("status", self.status.as_str())
            .with("notes", &self.notes)
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// A loan of one item to one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub member_id: String,
    pub item_id: String,
    pub checkout_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: TransactionStatus,
}

impl Entity for Transaction {
    const KIND: EntityKind = EntityKind::Transaction;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.id().to_string(),
            member_id: record.get("memberId").to_string(),
            item_id: record.get("itemId").to_string(),
            checkout_date: date_field(Self::KIND, record, "checkoutDate")?,
            due_date: date_field(Self::KIND, record, "dueDate")?,
            return_date: optional_date_field(Self::KIND, record, "returnDate")?,
            status: parse_field(Self::KIND, record, "status")?,
        })
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", &self.id)
            .with("memberId", &self.member_id)
            .with("itemId", &self.item_id)
            .with("checkoutDate", format_date(self.checkout_date))
            .with("dueDate", format_date(self.due_date))
            .with("returnDate", self.return_date.map(format_date).unwrap_or_default())
            .with("status", self.status.as_str())
    }

    fn id(&self) -> &str {
        &self.id
    }
}
