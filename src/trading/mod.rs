pub mod emission;
pub mod sink;
pub mod stats;
