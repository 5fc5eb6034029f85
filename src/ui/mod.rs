//! Terminal output helpers
//!
//! Fancy output (cliclack steps, spinners) in interactive terminals,
//! plain prefixed lines in CI.

pub mod context;
pub mod output;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_error, outro_success, section, spinner, step_error, step_info,
    step_ok, step_warn,
};
