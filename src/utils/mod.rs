#[macro_use]
pub mod macros;
pub mod files;
pub mod global_config;
pub mod names;
pub mod types;
