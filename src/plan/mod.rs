//! Deployment planning
//!
//! Pure functions that turn the module catalog, the change-detection
//! result and the live per-database state into an ordered list of
//! steps. Execution lives in [`execute`]; nothing here touches the
//! filesystem or spawns processes.

pub mod execute;

use crate::config::EnvConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One operation in a deployment plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Rebuild the container images
    Build,
    /// Bring the full stack up without module work
    Launch,
    /// Bring only the database service up
    LaunchDatabase,
    /// Create the first database on a fresh environment
    CreateDatabase,
    /// Install modules not yet present on one database
    Install {
        database: String,
        modules: Vec<String>,
    },
    /// Update changed modules on one database
    Update {
        database: String,
        modules: Vec<String>,
        force: bool,
    },
    /// Final full-stack relaunch, always the last step of a plan
    Relaunch,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Launch => write!(f, "launch"),
            Self::LaunchDatabase => write!(f, "launch-database"),
            Self::CreateDatabase => write!(f, "create-database"),
            Self::Install { database, modules } => {
                write!(f, "install[{}]: {}", database, modules.join(","))
            }
            Self::Update {
                database, modules, ..
            } => write!(f, "update[{}]: {}", database, modules.join(",")),
            Self::Relaunch => write!(f, "relaunch"),
        }
    }
}

/// Options influencing which operations a plan includes
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub auto_install: bool,
    pub auto_update: bool,
    pub force_update: bool,
    /// Explicit module list replacing the detector result for this run
    pub update_override: Option<Vec<String>>,
}

impl PlanOptions {
    pub fn from_config(config: &EnvConfig) -> Self {
        Self {
            auto_install: config.auto_install_modules,
            auto_update: config.auto_update_modules,
            force_update: config.force_update,
            update_override: config.update_module_list.clone(),
        }
    }
}

/// Module work for one database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseOps {
    /// Catalog modules not installed on the database, lexicographic
    pub to_install: Vec<String>,
    /// Modules to update, lexicographic
    pub to_update: Vec<String>,
}

/// Compute the install/update sets for one database.
///
/// `to_install` is catalog minus installed; `to_update` is the detector
/// result intersected with the catalog. An explicit override is taken
/// verbatim instead of the detector result.
pub fn database_ops(
    catalog: &BTreeSet<String>,
    installed: &BTreeSet<String>,
    updated: &BTreeSet<String>,
    update_override: Option<&[String]>,
) -> DatabaseOps {
    let to_install: Vec<String> = catalog.difference(installed).cloned().collect();

    let to_update: Vec<String> = match update_override {
        Some(list) => list.to_vec(),
        None => updated.intersection(catalog).cloned().collect(),
    };

    DatabaseOps {
        to_install,
        to_update,
    }
}

/// Plan module operations across databases that already exist.
///
/// Per database the install operation precedes the update operation; a
/// module must exist before it can be meaningfully updated. Database
/// order follows the enumeration order from the live engine query. One
/// final relaunch closes the plan so the stack is always left running.
pub fn plan_existing(
    databases: &[String],
    catalog: &BTreeSet<String>,
    updated: &BTreeSet<String>,
    installed: &BTreeMap<String, BTreeSet<String>>,
    opts: &PlanOptions,
) -> Vec<Step> {
    let empty = BTreeSet::new();
    let mut steps = Vec::new();

    for db in databases {
        let ops = database_ops(
            catalog,
            installed.get(db).unwrap_or(&empty),
            updated,
            opts.update_override.as_deref(),
        );

        if opts.auto_install && !ops.to_install.is_empty() {
            steps.push(Step::Install {
                database: db.clone(),
                modules: ops.to_install,
            });
        }
        if opts.auto_update && !ops.to_update.is_empty() {
            steps.push(Step::Update {
                database: db.clone(),
                modules: ops.to_update,
                force: opts.force_update,
            });
        }
    }

    steps.push(Step::Relaunch);
    steps
}

/// Plan the install-everything pass after a fresh database was created.
pub fn plan_bootstrap_install(databases: &[String], catalog: &BTreeSet<String>) -> Vec<Step> {
    let all: Vec<String> = catalog.iter().cloned().collect();
    let mut steps = Vec::new();

    for db in databases {
        if !all.is_empty() {
            steps.push(Step::Install {
                database: db.clone(),
                modules: all.clone(),
            });
        }
    }

    steps.push(Step::Relaunch);
    steps
}
