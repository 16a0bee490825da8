//! Configuration loading and management.

mod file;
mod paths;
mod types;
mod validate;

pub use file::{
    init_config_file, load_config, load_config_file, render_config, resolve_config_path, save_config,
};
pub use paths::{config_dir, config_file_path, data_dir};
pub use types::{
    Config, DetectorConfig, LocationConfig, RouteConfig, StoreConfig, StreamConfig,
};
pub use validate::{seconds_to_duration, validate_config};
