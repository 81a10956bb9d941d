pub mod blocks;
pub mod distance;
pub mod index;

pub use blocks::{Block, BlockId, BlockIndex, BlockKey, BlockLocation};
pub use distance::{calculate_distance, distance_meters};
pub use index::SpatialIndex;
