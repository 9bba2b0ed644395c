//! Shared building blocks for the LED controller workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): types every other crate leans on
//! - **client-core**: wire codec, session and transport
//! - **led-controller**: application wiring and console front end

pub mod error;


pub use error::error_location::ErrorLocation;
