pub mod event;
pub mod models;
pub mod period;
pub mod usage;
