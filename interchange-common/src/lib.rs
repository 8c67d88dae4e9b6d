//! Common utilities for the interchange-atlas toolkit

pub mod error;
pub mod names;

pub use error::{Error, Result};
