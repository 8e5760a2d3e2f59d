#![deny(clippy::all)]

mod buffer;
mod conversion;

pub mod analysis;
pub mod cluster;
pub mod config;
pub mod error;
pub mod prelude;
pub mod readiness;
pub mod report;
pub mod store;

pub use error::Error;
