//! Record validation
//!
//! Pure structural and business-rule checks run before a record is written.
//! Every violated rule is reported, in rule order, so callers can show the
//! whole list at once.
//!
//! ## Rules
//! - required fields are non-empty
//! - `email` matches a simple address pattern
//! - enum columns hold one of their allowed values
//! - date columns match `yyyy-MM-dd` and name a real calendar day
//! - a loan's due date falls strictly after its checkout date

use regex::Regex;
use serde::Serialize;
use std::str::FromStr;

use crate::error::{CirculationError, Result};
use crate::record::{parse_date, ItemStatus, ItemType, MemberStatus, Record, TransactionStatus};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const DATE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}$";

/// Aggregate outcome of a validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// `Err(ValidationFailed)` carrying every error, if any
    pub fn into_result(self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(CirculationError::ValidationFailed(self.errors))
        }
    }
}

/// Checks records of each kind
#[derive(Debug, Clone)]
pub struct Validator {
    email: Regex,
    date: Regex,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self {
            email: Regex::new(EMAIL_PATTERN).expect("email pattern compiles"),
            date: Regex::new(DATE_PATTERN).expect("date pattern compiles"),
        }
    }

    pub fn is_valid_email(&self, value: &str) -> bool {
        self.email.is_match(value.trim())
    }

    /// `yyyy-MM-dd` and a real date
    pub fn is_valid_date(&self, value: &str) -> bool {
        self.date.is_match(value) && parse_date(value).is_ok()
    }

    pub fn validate_member(&self, record: &Record) -> ValidationResult {
        let mut errors = Vec::new();
        required(record, "name", "Name", &mut errors);

        let email = record.get("email").trim();
        if email.is_empty() {
            errors.push("Email is required".to_string());
        } else if !self.is_valid_email(email) {
            errors.push(format!("Invalid email format: '{}'", email));
        }

        one_of::<MemberStatus>(record, "status", &mut errors);
        self.date_if_present(record, "joinDate", "Join date", &mut errors);
        ValidationResult::from_errors(errors)
    }

    pub fn validate_item(&self, record: &Record) -> ValidationResult {
        let mut errors = Vec::new();
        required(record, "title", "Title", &mut errors);
        if required(record, "type", "Type", &mut errors) {
            one_of::<ItemType>(record, "type", &mut errors);
        }
        one_of::<ItemStatus>(record, "status", &mut errors);
        ValidationResult::from_errors(errors)
    }

    pub fn validate_transaction(&self, record: &Record) -> ValidationResult {
        let mut errors = Vec::new();
        required(record, "memberId", "Member ID", &mut errors);
        required(record, "itemId", "Item ID", &mut errors);

        let checkout_ok = required(record, "checkoutDate", "Checkout date", &mut errors)
            && self.date(record, "checkoutDate", "Checkout date", &mut errors);
        let due_ok = required(record, "dueDate", "Due date", &mut errors)
            && self.date(record, "dueDate", "Due date", &mut errors);
        self.date_if_present(record, "returnDate", "Return date", &mut errors);
        one_of::<TransactionStatus>(record, "status", &mut errors);

        if checkout_ok && due_ok {
            // Both parsed above, so these cannot fail.
            if let (Ok(checkout), Ok(due)) = (
                parse_date(record.get("checkoutDate")),
                parse_date(record.get("dueDate")),
            ) {
                if due <= checkout {
                    errors.push("Due date must be after checkout date".to_string());
                }
            }
        }
        ValidationResult::from_errors(errors)
    }

    fn date(&self, record: &Record, field: &str, label: &str, errors: &mut Vec<String>) -> bool {
        let value = record.get(field);
        if self.is_valid_date(value) {
            true
        } else {
            errors.push(format!("{} must be a valid date (yyyy-MM-dd): '{}'", label, value));
            false
        }
    }

    fn date_if_present(&self, record: &Record, field: &str, label: &str, errors: &mut Vec<String>) {
        if !record.get(field).is_empty() {
            self.date(record, field, label, errors);
        }
    }
}

/// Push "<label> is required" when blank; returns whether a value is present
fn required(record: &Record, field: &str, label: &str, errors: &mut Vec<String>) -> bool {
    if record.get(field).trim().is_empty() {
        errors.push(format!("{} is required", label));
        false
    } else {
        true
    }
}

/// Enum membership, skipped for blank values
fn one_of<T: FromStr<Err = String>>(record: &Record, field: &str, errors: &mut Vec<String>) {
    let value = record.get(field);
    if value.is_empty() {
        return;
    }
    if let Err(message) = value.parse::<T>() {
        errors.push(message);
    }
}
