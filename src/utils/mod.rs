//! Pure utility functions.
//!
//! These are stateless helper functions used by the binaries.

pub mod bootstrap;
