use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::api::config_dto::CyclerConfigDto;
use crate::error::{Error, Result};

/// Reads `path` and parses it as JSON into `T`.
///
/// Errors surface as `Error::IoError` when the file cannot be read and as
/// `Error::DeserializationError` when the JSON does not match `T`.
pub fn parse_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)?;
    let parsed: T = serde_json::from_str(&data)?;
    Ok(parsed)
}

/// Loads the optional cycler configuration file. `None` yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<CyclerConfigDto> {
    match path {
        Some(path) => {
            let config = parse_json_file::<CyclerConfigDto>(path)?;
            log::info!("Loaded configuration from '{}'.", path.display());
            Ok(config)
        }
        None => Ok(CyclerConfigDto::default()),
    }
}
