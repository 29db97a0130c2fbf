//! CLI command handling module
//!
//! Handles all CLI subcommands and argument parsing.

mod commands;
mod logging;
mod trace;
mod version;

pub use commands::{ConfigSubcommand, handle_config_command};
pub use logging::init_logging;
pub use trace::{
    DiagnoseArgs, TraceArgs, diagnosis_output, handle_describe, handle_diagnose, render_tree,
    resolve_fields,
};
pub use version::display_version;
