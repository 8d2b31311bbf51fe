//! Shared types for the fetchmee workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
