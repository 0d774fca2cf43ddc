// Validation utilities module
// Provides custom validation functions for checkout and profile rules

use regex::Regex;
use std::sync::OnceLock;
use validator::ValidationError;

static PHONE_RE: OnceLock<Regex> = OnceLock::new();

/// Strips spaces and dashes from a card number as entered by the user
pub fn strip_card_separators(raw: &str) -> String {
    raw.chars().filter(|c| *c != ' ' && *c != '-').collect()
}

/// Validates a payment card number: digits only and at least 13 of them
/// after separators are stripped
pub fn validate_card_number(raw: &str) -> Result<(), ValidationError> {
    let digits = strip_card_separators(raw);
    if digits.len() < 13 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("card_number_invalid"));
    }
    Ok(())
}

/// Validates a card expiry month (1-12)
pub fn validate_expiry_month(month: i32) -> Result<(), ValidationError> {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::new("expiry_month_out_of_range"));
    }
    Ok(())
}

/// Validates a card expiry year against the given current year
pub fn validate_expiry_year(year: i32, current_year: i32) -> Result<(), ValidationError> {
    if year < current_year {
        return Err(ValidationError::new("card_expired"));
    }
    Ok(())
}

/// Validates a contact phone number: optional leading +, then 7-20
/// digits with the usual separators
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let re = PHONE_RE.get_or_init(|| {
        Regex::new(r"^\+?[0-9][0-9 ()\-]{5,19}$").expect("phone pattern is valid")
    });
    if re.is_match(phone.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("phone_invalid"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_card_separators() {
        assert_eq!(strip_card_separators("1234 5678 9012 3456"), "1234567890123456");
        assert_eq!(strip_card_separators("1234-5678-9012-3456"), "1234567890123456");
        assert_eq!(strip_card_separators("1234567890123"), "1234567890123");
    }

    #[test]
    fn test_card_number_minimum_length() {
        assert!(validate_card_number("1234 5678 9012 3").is_ok()); // 13 digits
        assert!(validate_card_number("123456789012").is_err()); // 12 digits
    }

    #[test]
    fn test_card_number_rejects_letters() {
        assert!(validate_card_number("1234abcd90123456").is_err());
    }

    #[test]
    fn test_expiry_month_bounds() {
        assert!(validate_expiry_month(1).is_ok());
        assert!(validate_expiry_month(12).is_ok());
        assert!(validate_expiry_month(0).is_err());
        assert!(validate_expiry_month(13).is_err());
    }

    #[test]
    fn test_expiry_year_not_in_past() {
        assert!(validate_expiry_year(2026, 2026).is_ok());
        assert!(validate_expiry_year(2030, 2026).is_ok());
        assert!(validate_expiry_year(2025, 2026).is_err());
    }

    #[test]
    fn test_phone_formats() {
        assert!(validate_phone("+7 916 123-45-67").is_ok());
        assert!(validate_phone("89161234567").is_ok());
        assert!(validate_phone("+1 (555) 010-2030").is_ok());
        assert!(validate_phone("not a phone").is_err());
        assert!(validate_phone("+").is_err());
    }
}
