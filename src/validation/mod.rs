//! Structural validation of request payloads with sanitized errors.
//!
//! Validation failures travel on two channels: the raw detail, including the
//! rejected value, goes to the server-side log only; the caller gets a
//! closed vocabulary of codes plus the field path and a generic message
//! templated from those two. No attacker-supplied value ever appears in a
//! response.

use serde::Serialize;
use serde_json::Value;

/// Closed set of client-safe validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    InvalidType,
    InvalidFormat,
    RequiredField,
    TooSmall,
    TooBig,
    InvalidEnum,
    Unknown,
}

impl IssueCode {
    fn summary(self) -> &'static str {
        match self {
            IssueCode::InvalidType => "has the wrong type",
            IssueCode::InvalidFormat => "has an invalid format",
            IssueCode::RequiredField => "is required",
            IssueCode::TooSmall => "is below the allowed minimum",
            IssueCode::TooBig => "is above the allowed maximum",
            IssueCode::InvalidEnum => "is not one of the allowed values",
            IssueCode::Unknown => "is not recognized",
        }
    }
}

/// One sanitized validation failure: safe field path, safe code, generic
/// message. Never carries the rejected value.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub code: IssueCode,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: IssueCode) -> Self {
        let field = field.into();
        let message = format!("Field '{}' {}", field, code.summary());
        Self { field, code, message }
    }
}

/// Record a failure on both channels: raw detail to the log, sanitized
/// issue to the caller-visible list.
fn reject(issues: &mut Vec<ValidationIssue>, field: &str, code: IssueCode, raw: &Value) {
    tracing::debug!(
        target: "validation",
        field = %field,
        code = ?code,
        raw = %raw,
        "rejected payload value"
    );
    issues.push(ValidationIssue::new(field, code));
}

/// Dye categories accepted by the catalog schema.
pub const DYE_CATEGORIES: &[&str] = &[
    "white", "red", "brown", "yellow", "green", "blue", "purple", "rare",
];

const MAX_CATALOG_RECORDS: usize = 1000;
const MAX_NAME_CHARS: usize = 200;
const MAX_LOCALE_ENTRIES: usize = 5000;
const MAX_LOCALE_VALUE_CHARS: usize = 500;
const MIN_ITEM_ID: i64 = 1;
const MAX_ITEM_ID: i64 = 10_000_000;

/// Validate the full dye catalog payload: a non-empty, bounded array of
/// dye records.
pub fn validate_dye_catalog(payload: &Value) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    let Some(records) = payload.as_array() else {
        reject(&mut issues, "catalog", IssueCode::InvalidType, payload);
        return Err(issues);
    };

    if records.is_empty() {
        reject(&mut issues, "catalog", IssueCode::TooSmall, payload);
    }
    if records.len() > MAX_CATALOG_RECORDS {
        reject(&mut issues, "catalog", IssueCode::TooBig, payload);
    }

    for (index, record) in records.iter().enumerate() {
        validate_record(record, &format!("[{index}]."), &mut issues);
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Validate a single dye record. Field paths are relative to the record.
pub fn validate_dye_record(record: &Value) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    validate_record(record, "", &mut issues);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn validate_record(record: &Value, prefix: &str, issues: &mut Vec<ValidationIssue>) {
    let Some(map) = record.as_object() else {
        reject(issues, prefix.trim_end_matches('.'), IssueCode::InvalidType, record);
        return;
    };

    // itemID: required integer within range
    match map.get("itemID") {
        None => issues.push(ValidationIssue::new(
            format!("{prefix}itemID"),
            IssueCode::RequiredField,
        )),
        Some(v) => match v.as_i64() {
            None => reject(issues, &format!("{prefix}itemID"), IssueCode::InvalidType, v),
            Some(n) if n < MIN_ITEM_ID => {
                reject(issues, &format!("{prefix}itemID"), IssueCode::TooSmall, v)
            }
            Some(n) if n > MAX_ITEM_ID => {
                reject(issues, &format!("{prefix}itemID"), IssueCode::TooBig, v)
            }
            Some(_) => {}
        },
    }

    // name: required non-empty string, bounded
    match map.get("name") {
        None => issues.push(ValidationIssue::new(
            format!("{prefix}name"),
            IssueCode::RequiredField,
        )),
        Some(v) => match v.as_str() {
            None => reject(issues, &format!("{prefix}name"), IssueCode::InvalidType, v),
            Some(s) if s.is_empty() => {
                reject(issues, &format!("{prefix}name"), IssueCode::TooSmall, v)
            }
            Some(s) if s.chars().count() > MAX_NAME_CHARS => {
                reject(issues, &format!("{prefix}name"), IssueCode::TooBig, v)
            }
            Some(_) => {}
        },
    }

    // hex: required #RRGGBB string
    match map.get("hex") {
        None => issues.push(ValidationIssue::new(
            format!("{prefix}hex"),
            IssueCode::RequiredField,
        )),
        Some(v) => match v.as_str() {
            None => reject(issues, &format!("{prefix}hex"), IssueCode::InvalidType, v),
            Some(s) if !is_hex_color(s) => {
                reject(issues, &format!("{prefix}hex"), IssueCode::InvalidFormat, v)
            }
            Some(_) => {}
        },
    }

    // category: optional closed enum
    if let Some(v) = map.get("category") {
        match v.as_str() {
            None => reject(issues, &format!("{prefix}category"), IssueCode::InvalidType, v),
            Some(s) if !DYE_CATEGORIES.contains(&s) => {
                reject(issues, &format!("{prefix}category"), IssueCode::InvalidEnum, v)
            }
            Some(_) => {}
        }
    }

    // No other fields are part of the record schema
    for key in map.keys() {
        if !matches!(key.as_str(), "itemID" | "name" | "hex" | "category") {
            issues.push(ValidationIssue::new(
                format!("{prefix}{key}"),
                IssueCode::Unknown,
            ));
        }
    }
}

/// Validate a locale translation payload: a bounded object mapping
/// non-empty string keys to bounded string values.
pub fn validate_locale_map(payload: &Value) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    let Some(map) = payload.as_object() else {
        reject(&mut issues, "translations", IssueCode::InvalidType, payload);
        return Err(issues);
    };

    if map.len() > MAX_LOCALE_ENTRIES {
        reject(&mut issues, "translations", IssueCode::TooBig, payload);
    }

    for (key, value) in map {
        if key.is_empty() {
            issues.push(ValidationIssue::new("translations", IssueCode::TooSmall));
            continue;
        }
        match value.as_str() {
            None => reject(&mut issues, key, IssueCode::InvalidType, value),
            Some(s) if s.chars().count() > MAX_LOCALE_VALUE_CHARS => {
                reject(&mut issues, key, IssueCode::TooBig, value)
            }
            Some(_) => {}
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn is_hex_color(s: &str) -> bool {
    let Some(digits) = s.strip_prefix('#') else {
        return false;
    };
    digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit())
}
