//! Core library for borehole radar travel-time picking: acquisitions
//! and their annotation arrays, the picking controller, derived
//! velocity and time-zero metrics, and session persistence.

pub mod display;
pub mod error;
pub mod geometry;
pub mod io;
pub mod metrics;
pub mod picking;
pub mod session;
pub mod survey;
