//! Server-enforced password complexity, §4.E.
//!
//! Length is checked by the `#[validate(length(...))]` attribute on the
//! DTO field; this module only checks character-class composition.

use std::collections::HashSet;
use validator::ValidationError;

const MIN_DISTINCT_LETTERS: usize = 6;

pub fn password_policy(password: &str) -> Result<(), ValidationError> {
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_symbol = password.chars().any(|c| !c.is_alphanumeric());

    if !(has_digit && has_upper && has_lower && has_symbol) {
        return Err(ValidationError::new("password_complexity"));
    }

    let distinct_letters: HashSet<char> = password.chars().filter(|c| c.is_alphabetic()).collect();
    if distinct_letters.len() < MIN_DISTINCT_LETTERS {
        return Err(ValidationError::new("password_letter_diversity"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_classes() {
        assert!(password_policy("alllowercase1234").is_err());
        assert!(password_policy("ALLUPPERCASE1234").is_err());
        assert!(password_policy("NoDigitsHere!!!!").is_err());
        assert!(password_policy("NoSymbolsHere1234").is_err());
    }

    #[test]
    fn rejects_low_letter_diversity() {
        // four classes present, but only 2 distinct letters (a, A)
        assert!(password_policy("aA111111!!!!").is_err());
    }

    #[test]
    fn accepts_compliant_password() {
        assert!(password_policy("Wonderland#2024").is_ok());
    }

    #[test]
    fn boundary_twelve_chars_all_classes_six_letters() {
        // "AbCdEf12#$%^" -> letters A,b,C,d,E,f = 6 distinct, digits, symbols present
        let pw = "AbCdEf12#$%^";
        assert_eq!(pw.len(), 12);
        assert!(password_policy(pw).is_ok());
    }
}
