//! CLI argument parsing and command handling.

mod args;
mod progress;
pub mod records;
pub mod stream;
mod validators;

pub use args::{
    AddArgs, Cli, Command, ConfigAction, GlobalArgs, ListArgs, LocationArgs, RouteArgs,
    StreamArgs, SubmitArgs,
};
