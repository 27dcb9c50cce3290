pub mod action;
pub mod component;
pub mod config;
pub mod error;
pub mod io;
pub mod provision;
pub mod registry;
pub mod repository;
pub mod router;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Result, VerticeError};
