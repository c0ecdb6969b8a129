//! Seat Capture - seat name recognition from table screenshots
//!
//! A reference screenshot is calibrated once by drawing one rectangle per
//! seat. Every later screenshot is cropped with that calibration, each crop
//! is recognized concurrently and the cleaned-up names are routed to the
//! matching seats of a table.

pub mod calibration;
pub mod capture;
pub mod config;
pub mod error;
pub mod overlay;
pub mod routing;
pub mod shared;
pub mod storage;
pub mod vision;
