//! Common types used across FleetGo components

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_CATEGORY_LEN: usize = 64;

/// Error type for vehicle category validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    #[error("vehicle category cannot be empty")]
    Empty,
    #[error("vehicle category too long (max 64 characters)")]
    TooLong,
}

/// Free-form vehicle category tag such as `Car`, `Bike` or `Scooter`.
///
/// Categories compare byte-for-byte: `Car` and `car` are different
/// categories and no normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VehicleCategory(String);

impl VehicleCategory {
    pub fn new(category: impl Into<String>) -> Result<Self, CategoryError> {
        let category = category.into();
        if category.is_empty() {
            return Err(CategoryError::Empty);
        }
        if category.chars().count() > MAX_CATEGORY_LEN {
            return Err(CategoryError::TooLong);
        }
        Ok(Self(category))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact, case-sensitive comparison against a requested category
    pub fn matches(&self, requested: &str) -> bool {
        self.0 == requested
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VehicleCategory {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for VehicleCategory {
    type Error = CategoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VehicleCategory> for String {
    fn from(category: VehicleCategory) -> Self {
        category.0
    }
}

impl AsRef<str> for VehicleCategory {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_categories() {
        for name in ["Car", "Bike", "Scooter", "cargo-van", "Электросамокат"] {
            let category = VehicleCategory::new(name).unwrap();
            assert_eq!(category.as_str(), name);
        }
    }

    #[test]
    fn test_empty_category_rejected() {
        assert_eq!(VehicleCategory::new(""), Err(CategoryError::Empty));
    }

    #[test]
    fn test_long_category_rejected() {
        let name = "x".repeat(MAX_CATEGORY_LEN + 1);
        assert_eq!(VehicleCategory::new(name), Err(CategoryError::TooLong));

        let name = "x".repeat(MAX_CATEGORY_LEN);
        assert!(VehicleCategory::new(name).is_ok());
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let category = VehicleCategory::new("Car").unwrap();
        assert!(category.matches("Car"));
        assert!(!category.matches("car"));
        assert!(!category.matches("Car "));
    }

    #[test]
    fn test_serde_validates() {
        let category: VehicleCategory = serde_json::from_str("\"Bike\"").unwrap();
        assert_eq!(category.as_str(), "Bike");

        let result: Result<VehicleCategory, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());

        let json = serde_json::to_string(&category).unwrap();
        assert_eq!(json, "\"Bike\"");
    }
}
