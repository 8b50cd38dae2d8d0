use crate::error::RentalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account identifier issued by the identity layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vehicle identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(i64);

impl VehicleId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rent identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RentId(Uuid);

impl RentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A position in raw degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Squared planar distance in degree units. Not a geodesic distance.
    pub fn planar_distance_squared(&self, other: &GeoPoint) -> f64 {
        (other.latitude - self.latitude).powi(2) + (other.longitude - self.longitude).powi(2)
    }
}

/// Billing granularity of a rent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitType {
    Minutes,
    Days,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Minutes => "Minutes",
            UnitType::Days => "Days",
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitType {
    type Err = RentalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Minutes" => Ok(UnitType::Minutes),
            "Days" => Ok(UnitType::Days),
            other => Err(RentalError::InvalidUnitType {
                value: other.to_string(),
            }),
        }
    }
}

/// Identity of whoever invokes a lifecycle operation, as established by the
/// authorization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub account_id: AccountId,
    pub is_admin: bool,
}

impl Caller {
    pub const fn account(account_id: AccountId) -> Self {
        Self {
            account_id,
            is_admin: false,
        }
    }

    pub const fn admin(account_id: AccountId) -> Self {
        Self {
            account_id,
            is_admin: true,
        }
    }

    /// Administrators may act on any account's records
    pub fn can_act_for(&self, owner: AccountId) -> bool {
        self.is_admin || self.account_id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_type_parsing_is_exact() {
        assert_eq!("Minutes".parse::<UnitType>().unwrap(), UnitType::Minutes);
        assert_eq!("Days".parse::<UnitType>().unwrap(), UnitType::Days);

        for bad in ["minutes", "DAYS", "Hours", "", " Days"] {
            let err = bad.parse::<UnitType>().unwrap_err();
            assert!(matches!(err, RentalError::InvalidUnitType { .. }), "{bad}");
        }
    }

    #[test]
    fn test_unit_type_display_matches_parse() {
        for unit in [UnitType::Minutes, UnitType::Days] {
            assert_eq!(unit.to_string().parse::<UnitType>().unwrap(), unit);
        }
    }

    #[test]
    fn test_rent_id_from_str() {
        let id = RentId::new();
        let parsed: RentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<RentId>().is_err());
    }

    #[test]
    fn test_planar_distance() {
        let origin = GeoPoint::new(0.0, 0.0);
        let corner = GeoPoint::new(3.0, 4.0);
        assert_eq!(origin.planar_distance_squared(&corner), 25.0);
        assert_eq!(origin.planar_distance_squared(&origin), 0.0);
    }

    #[test]
    fn test_caller_permissions() {
        let owner = AccountId::new(7);
        assert!(Caller::account(owner).can_act_for(owner));
        assert!(!Caller::account(AccountId::new(8)).can_act_for(owner));
        assert!(Caller::admin(AccountId::new(1)).can_act_for(owner));
    }
}
