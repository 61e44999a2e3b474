//! Foundational data models and stateless utilities.
//!
//! Everything in this layer is a pure description of molecular data: atoms,
//! frames, detected hydrogen bonds, and the network graph they form. Nothing
//! here performs analysis or holds run state.

pub mod models;
pub mod utils;
