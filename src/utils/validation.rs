use crate::utils::error::{OrgError, Result};
use url::Url;

/// Upper bound, in code points, for department names, employee names and positions.
pub const MAX_NAME_LENGTH: usize = 200;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 去除前後空白並檢查長度 (以 Unicode code point 計算)
pub fn normalize_required_string(field_name: &str, raw: &str) -> Result<String> {
    let value = raw.trim();
    let length = value.chars().count();
    if length < 1 || length > MAX_NAME_LENGTH {
        return Err(OrgError::validation(format!(
            "{} length must be in range 1..{}",
            field_name, MAX_NAME_LENGTH
        )));
    }
    Ok(value.to_string())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(OrgError::validation(format!(
            "{} must be between {} and {}",
            field_name, min, max
        )));
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(OrgError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_database_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.trim().is_empty() {
        return Err(OrgError::MissingConfigError {
            field: field_name.to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "postgres" | "postgresql" => Ok(()),
            scheme => Err(OrgError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: redact(url_str),
                reason: format!("Unsupported database scheme: {}", scheme),
            }),
        },
        Err(e) => Err(OrgError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: redact(url_str),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| OrgError::MissingConfigError {
        field: field_name.to_string(),
    })
}

// Keeps credentials out of error messages and logs.
fn redact(url_str: &str) -> String {
    match url_str.rsplit_once('@') {
        Some((_, host)) => format!("***@{}", host),
        None => url_str.to_string(),
    }
}
