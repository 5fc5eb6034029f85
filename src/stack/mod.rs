//! Stack collaborators: compose runtime, database inspection,
//! readiness probing and reverse proxy provisioning
//!
//! The deployment core only talks to the stack through the traits in
//! [`runtime`]; everything else here is the production wiring.

pub mod compose;
pub mod health;
pub mod postgres;
pub mod proxy;
pub mod runtime;

pub use compose::ComposeRuntime;
pub use postgres::PostgresInspector;
pub use runtime::{DatabaseInspector, StackRuntime};
