use thiserror::Error;

/// Coarse error classes every [`RentalError`] falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidState,
    InvalidRequest,
    Forbidden,
    Internal,
}

#[derive(Debug, Error)]
pub enum RentalError {
    #[error("Vehicle not found: {id}")]
    VehicleNotFound { id: String },

    #[error("Rent not found: {id}")]
    RentNotFound { id: String },

    #[error("Account not found: {id}")]
    AccountNotFound { id: String },

    #[error("Vehicle {id} is not available for rent")]
    VehicleUnavailable { id: String },

    #[error("Vehicle {id} is not currently rented")]
    VehicleNotRented { id: String },

    #[error("Vehicle {id} is referenced by an open rent")]
    VehicleInUse { id: String },

    #[error("Account cannot rent its own vehicle {vehicle_id}")]
    SelfRental { vehicle_id: String },

    #[error("Rent {id} has already ended")]
    RentAlreadyClosed { id: String },

    #[error("Vehicle {vehicle_id} has no {unit_type} price")]
    MissingPrice {
        vehicle_id: String,
        unit_type: String,
    },

    #[error("Invalid unit type '{value}', expected 'Minutes' or 'Days'")]
    InvalidUnitType { value: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Access to {id} denied")]
    Forbidden { id: String },

    #[error("Stored {entity} record is invalid: {reason}")]
    InvalidRecord {
        entity: &'static str,
        reason: String,
    },

    #[error("Database error during {operation}: {source}")]
    DatabaseError {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RentalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RentalError::VehicleNotFound { .. }
            | RentalError::RentNotFound { .. }
            | RentalError::AccountNotFound { .. } => ErrorKind::NotFound,
            RentalError::VehicleUnavailable { .. }
            | RentalError::VehicleNotRented { .. }
            | RentalError::VehicleInUse { .. }
            | RentalError::SelfRental { .. } => ErrorKind::Conflict,
            RentalError::RentAlreadyClosed { .. } => ErrorKind::InvalidState,
            RentalError::MissingPrice { .. }
            | RentalError::InvalidUnitType { .. }
            | RentalError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            RentalError::Forbidden { .. } => ErrorKind::Forbidden,
            RentalError::InvalidRecord { .. }
            | RentalError::DatabaseError { .. }
            | RentalError::Configuration(_) => ErrorKind::Internal,
        }
    }

    /// Kind as it should be reported to the caller.
    ///
    /// A rent the caller does not own is reported exactly like a missing
    /// one so that callers cannot discover which rents exist.
    pub fn public_kind(&self) -> ErrorKind {
        match self.kind() {
            ErrorKind::Forbidden => ErrorKind::NotFound,
            kind => kind,
        }
    }

    pub(crate) fn database(
        operation: &str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RentalError::DatabaseError {
            operation: operation.to_string(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, RentalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_is_reported_as_not_found() {
        let err = RentalError::Forbidden {
            id: "rent-1".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(err.public_kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_taxonomy() {
        let cases = [
            (
                RentalError::VehicleUnavailable { id: "1".into() },
                ErrorKind::Conflict,
            ),
            (
                RentalError::RentAlreadyClosed { id: "r".into() },
                ErrorKind::InvalidState,
            ),
            (
                RentalError::MissingPrice {
                    vehicle_id: "1".into(),
                    unit_type: "Days".into(),
                },
                ErrorKind::InvalidRequest,
            ),
            (
                RentalError::AccountNotFound { id: "9".into() },
                ErrorKind::NotFound,
            ),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
            assert_eq!(err.public_kind(), kind, "{err}");
        }
    }

    #[test]
    fn test_database_error_keeps_operation() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = RentalError::database("close_rent", io);
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(
            err.to_string(),
            "Database error during close_rent: disk gone"
        );
    }
}
