pub mod config;
pub mod model;
pub mod period;
pub mod scheduler;
pub mod style;
