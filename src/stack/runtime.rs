//! Stack runtime abstraction
//!
//! The deployment executor drives the stack through this trait so the
//! planning and ordering logic stays testable without a container
//! engine on the box.

use crate::error::SlipwayResult;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Operations the deployment plan needs from the container stack
#[async_trait]
pub trait StackRuntime: Send + Sync {
    /// Stop all running containers of this deployment
    async fn stop(&self) -> SlipwayResult<()>;

    /// Build the container images
    async fn build(&self) -> SlipwayResult<()>;

    /// Bring the full stack up, detached
    async fn launch(&self) -> SlipwayResult<()>;

    /// Bring only the database service up, detached
    async fn launch_database(&self) -> SlipwayResult<()>;

    /// Create the first database on a fresh environment
    async fn create_database(&self) -> SlipwayResult<()>;

    /// Install modules on one database via a one-off app container
    async fn install_modules(&self, database: &str, modules: &[String]) -> SlipwayResult<()>;

    /// Update modules on one database via a one-off app container
    async fn update_modules(
        &self,
        database: &str,
        modules: &[String],
        force: bool,
    ) -> SlipwayResult<()>;

    /// Tail of the compose logs, for failure diagnostics
    async fn tail_logs(&self, lines: u32) -> SlipwayResult<String>;
}

/// Live database-engine queries feeding the planner
#[async_trait]
pub trait DatabaseInspector: Send + Sync {
    /// Names of user databases, in engine enumeration order. An empty
    /// list is a valid, meaningful result (fresh environment).
    async fn list_databases(&self) -> SlipwayResult<Vec<String>>;

    /// Modules installed on one database. Implementations degrade to an
    /// empty set with a warning when the engine cannot be queried, so
    /// the planner over-installs rather than silently skipping work.
    async fn installed_modules(&self, database: &str) -> SlipwayResult<BTreeSet<String>>;
}
