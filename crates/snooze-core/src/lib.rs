pub mod action;
pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod io;
pub mod kv;
pub mod paths;
pub mod presets;
pub mod queue;
pub mod recurrence;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod timer;

pub use error::{Result, SnoozeError};
