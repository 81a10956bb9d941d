pub mod address;
pub mod outcome;
pub mod reference;
pub mod stats_models;

pub use address::{AddressRecord, AddressTags};
pub use outcome::{MatchOutcome, OutcomeKind, ReferenceMatch, UnitNumberSplit};
pub use reference::{ReferenceAddress, ReferenceGeometry};
