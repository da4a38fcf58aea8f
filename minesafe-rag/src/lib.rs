pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod index;
pub mod ports;
pub mod server;
pub mod services;

#[cfg(test)]
mod test_utils;

pub use error::{MineRagError, Result};
