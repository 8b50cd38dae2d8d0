pub mod availability;
pub mod clock;
pub mod pricing;
pub mod rentals;
pub mod types;
pub mod vehicles;

pub use availability::{AvailabilityIndex, SearchArea};
pub use clock::{Clock, ManualClock, SystemClock};
pub use rentals::{Rent, RentClosure, RentStatus, RentalManager, RentalOperations};
pub use types::{AccountId, Caller, GeoPoint, RentId, UnitType, VehicleId};
pub use vehicles::{NewVehicle, Vehicle, VehicleFilter, VehicleUpdate};
