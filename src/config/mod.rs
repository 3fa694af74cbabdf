//! Configuration surface of the core
//!
//! Every service receives its section explicitly at construction and validates
//! it there; a service with an invalid section refuses to start.

pub mod macros;
mod schemas;
mod utils;

pub use schemas::*;
pub use utils::{
    apply_env_overrides, apply_overrides_from, load_config_from_path, CONFIG_FILE_PATH,
};
