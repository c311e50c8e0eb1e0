pub mod backend;
pub mod btle;
pub mod constants;
pub mod permission;
pub mod types;
