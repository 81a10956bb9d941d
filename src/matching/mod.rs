pub mod address;
pub mod inventory;
pub mod manager;
pub mod normalize;

pub use address::{match_address, AddressMatcher, MatchReport};
pub use inventory::{InventoryStats, ReferenceAddressInventory};
pub use manager::{conflate, ConflationResult};
