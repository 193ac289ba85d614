//! Boundary checks shared by the services. Each returns `PortError::Validation` with a
//! message suitable for showing to the user.

use std::sync::LazyLock;

use regex::Regex;

use crate::ports::{PortError, PortResult};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{9,14}$").expect("valid phone regex"));
static PINCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{5,10}$").expect("valid pincode regex"));
static LAST4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}$").expect("valid last4 regex"));
static EXPIRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/[0-9]{2}$").expect("valid expiry regex"));
static UPI_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.\-_]{2,256}@[A-Za-z]{2,64}$").expect("valid upi regex")
});

/// Trims `value` and fails when nothing is left.
pub fn required(field: &str, value: &str) -> PortResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PortError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn matching(field: &str, value: &str, pattern: &Regex) -> PortResult<String> {
    let value = required(field, value)?;
    if !pattern.is_match(&value) {
        return Err(PortError::Validation(format!("{} is not valid", field)));
    }
    Ok(value)
}

pub fn email(value: &str) -> PortResult<String> {
    matching("email", value, &EMAIL).map(|e| e.to_lowercase())
}

pub fn phone(value: &str) -> PortResult<String> {
    matching("phone", value, &PHONE)
}

pub fn pincode(value: &str) -> PortResult<String> {
    matching("pincode", value, &PINCODE)
}

pub fn card_last4(value: &str) -> PortResult<String> {
    matching("last4", value, &LAST4)
}

pub fn card_expiry(value: &str) -> PortResult<String> {
    matching("expiry", value, &EXPIRY)
}

pub fn upi_id(value: &str) -> PortResult<String> {
    matching("upiId", value, &UPI_ID)
}

/// Optional free text: blank becomes `None`.
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_realistic_values() {
        assert!(phone("+91 98765 43210").is_ok());
        assert!(pincode("560001").is_ok());
        assert!(card_expiry("09/27").is_ok());
        assert!(upi_id("jane.doe@okbank").is_ok());
        assert_eq!(email(" Jane@Example.COM ").unwrap(), "jane@example.com");
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(matches!(phone("12345"), Err(PortError::Validation(_))));
        assert!(matches!(pincode("12"), Err(PortError::Validation(_))));
        assert!(matches!(card_last4("12a4"), Err(PortError::Validation(_))));
        assert!(matches!(card_expiry("13/27"), Err(PortError::Validation(_))));
        assert!(matches!(upi_id("no-at-sign"), Err(PortError::Validation(_))));
        assert!(matches!(required("city", "   "), Err(PortError::Validation(_))));
    }
}
