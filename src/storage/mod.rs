//! Storage Layer
//!
//! Handles persistence of the active calibration and locates the
//! application's config and data directories.

pub mod calibration;

pub use calibration::{
    deserialize_calibration, serialize_calibration, CalibrationRecord, CalibrationStore,
};

use anyhow::Result;
use std::path::PathBuf;

/// File name of the persisted calibration inside the data directory
pub const CALIBRATION_FILE_NAME: &str = "calibration.json";

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "seatcapture", "SeatCapture")
        .ok_or_else(|| anyhow::anyhow!("Could not determine application directories"))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default location of the calibration file
pub fn default_calibration_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(CALIBRATION_FILE_NAME))
}
