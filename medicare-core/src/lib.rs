pub mod account;
pub mod appointment;
pub mod error;
pub mod history;
pub mod outcome;
pub mod patient;
pub mod supply;
pub mod topic;

pub use account::{Account, AccountKind, Credentials, Membership, Profile};
pub use appointment::{Appointment, AppointmentStatus, NewAppointment, Service};
pub use error::{MedicareError, Result};
pub use history::{HistoryRecord, RouteSummary};
pub use outcome::{Outcome, OutcomeCode};
pub use patient::{MedicalRecord, Patient};
pub use supply::{Category, Item, PriceList};
pub use topic::Topic;
