//! Client-side form validation.
//!
//! Mirrors the checks the backend enforces so obviously bad input is
//! rejected before a request is made.

use crate::models::{ActivateRequest, LoginRequest, PackagePayload};

pub const MIN_PASSWORD_CHARS: usize = 6;
pub const PACKAGE_NAME_CHARS: std::ops::RangeInclusive<usize> = 3..=50;
pub const PACKAGE_PRICE_RANGE: std::ops::RangeInclusive<u64> = 1_000..=100_000_000;
pub const PACKAGE_DURATION_DAYS: std::ops::RangeInclusive<u32> = 1..=365;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("password must be at least 6 characters")]
    ShortPassword,
    #[error("package name must be 3-50 characters")]
    PackageNameLength,
    #[error("price must be between 1000 and 100000000")]
    PriceOutOfRange,
    #[error("duration must be between 1 and 365 days")]
    DurationOutOfRange,
    #[error("select at least one feature")]
    NoFeatures,
    #[error("payment id must not be empty")]
    EmptyPaymentId,
}

/// Normalize and validate login credentials.
pub fn login_request(email: &str, password: &str) -> Result<LoginRequest, InputError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(InputError::EmptyEmail);
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(InputError::InvalidEmail);
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(InputError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(InputError::ShortPassword);
    }
    Ok(LoginRequest {
        email,
        password: password.to_string(),
    })
}

/// Validate a package create/update form.
pub fn package_payload(
    name: &str,
    price: u64,
    duration_days: u32,
    feature_ids: Vec<u64>,
) -> Result<PackagePayload, InputError> {
    let name = name.trim().to_string();
    if !PACKAGE_NAME_CHARS.contains(&name.chars().count()) {
        return Err(InputError::PackageNameLength);
    }
    if !PACKAGE_PRICE_RANGE.contains(&price) {
        return Err(InputError::PriceOutOfRange);
    }
    if !PACKAGE_DURATION_DAYS.contains(&duration_days) {
        return Err(InputError::DurationOutOfRange);
    }
    if feature_ids.is_empty() {
        return Err(InputError::NoFeatures);
    }
    Ok(PackagePayload {
        name,
        price,
        duration_days,
        features: Vec::new(),
        feature_ids,
    })
}

/// Validate a payment activation form.
pub fn activate_request(payment_id: &str) -> Result<ActivateRequest, InputError> {
    let payment_id = payment_id.trim().to_string();
    if payment_id.is_empty() {
        return Err(InputError::EmptyPaymentId);
    }
    Ok(ActivateRequest { payment_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_normalizes_and_validates() {
        let request = login_request("  Admin@Apto.Example  ", "hunter22").expect("valid login");
        assert_eq!(request.email, "admin@apto.example");

        assert_eq!(login_request("", "hunter22"), Err(InputError::EmptyEmail));
        assert_eq!(
            login_request("admin-apto.example", "hunter22"),
            Err(InputError::InvalidEmail)
        );
        assert_eq!(
            login_request("admin@localhost", "hunter22"),
            Err(InputError::InvalidEmail)
        );
        assert_eq!(
            login_request("admin@apto.example", "12345"),
            Err(InputError::ShortPassword)
        );
    }

    #[test]
    fn package_form_bounds() {
        struct Case {
            name: &'static str,
            price: u64,
            duration: u32,
            features: Vec<u64>,
            expected: Result<(), InputError>,
        }

        let cases = vec![
            Case {
                name: "Pro Monthly",
                price: 50_000,
                duration: 30,
                features: vec![1, 2],
                expected: Ok(()),
            },
            Case {
                name: "ab",
                price: 50_000,
                duration: 30,
                features: vec![1],
                expected: Err(InputError::PackageNameLength),
            },
            Case {
                name: "Pro Monthly",
                price: 999,
                duration: 30,
                features: vec![1],
                expected: Err(InputError::PriceOutOfRange),
            },
            Case {
                name: "Pro Monthly",
                price: 50_000,
                duration: 366,
                features: vec![1],
                expected: Err(InputError::DurationOutOfRange),
            },
            Case {
                name: "Pro Monthly",
                price: 50_000,
                duration: 30,
                features: vec![],
                expected: Err(InputError::NoFeatures),
            },
        ];

        for case in cases {
            let result =
                package_payload(case.name, case.price, case.duration, case.features.clone());
            assert_eq!(
                result.map(|_| ()),
                case.expected,
                "case: {} / {} / {}",
                case.name,
                case.price,
                case.duration
            );
        }
    }

    #[test]
    fn activation_requires_payment_id() {
        assert!(activate_request("PAY-123").is_ok());
        assert_eq!(activate_request("   "), Err(InputError::EmptyPaymentId));
    }
}
