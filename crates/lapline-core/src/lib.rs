pub mod model;
pub mod points;
pub mod seed;
pub mod stats;
pub mod store;
pub mod time;
