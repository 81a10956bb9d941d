pub mod proximity;

pub use proximity::{cluster_by_distance, cluster_records};
