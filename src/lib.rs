//! Slipway - deployment orchestrator for containerized app stacks
//!
//! Deploys an application server + PostgreSQL + reverse proxy stack
//! through docker compose, doing only the work a deployment actually
//! needs: images rebuild when their inputs changed, modules install
//! where they are missing and update where their content changed.
//!
//! Cache files record state only after the corresponding operation
//! succeeded, so a failed run never claims work that did not happen.
//! Invocations are assumed non-overlapping on a single host; nothing
//! locks the cache files.

pub mod cache;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod history;
pub mod plan;
pub mod sizing;
pub mod stack;
pub mod ui;

pub use error::{SlipwayError, SlipwayResult};
