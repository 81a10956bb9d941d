pub mod clustering;
pub mod errors;
pub mod matching;
pub mod models;
pub mod reduction;
pub mod spatial;
pub mod utils;
