//! Deployment configuration schema
//!
//! An `EnvConfig` is built once at startup from the project `.env` file
//! plus the process environment, then passed by reference into every
//! component. Nothing reads environment variables after startup.

use crate::error::{SlipwayError, SlipwayResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Deployment target environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployTarget {
    Dev,
    Prod,
}

impl DeployTarget {
    /// Label overlay suffix used by compose invocations
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

impl FromStr for DeployTarget {
    type Err = SlipwayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(SlipwayError::EnvInvalid {
                name: "DEPLOY_TARGET".to_string(),
                reason: format!("must be 'dev' or 'prod', got '{other}'"),
            }),
        }
    }
}

impl fmt::Display for DeployTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable deployment configuration, resolved once at startup
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Compose project name, also the container name prefix
    pub project_name: String,

    /// Stack release version (informational)
    pub stack_version: String,

    /// Expected reverse proxy checkout version
    pub proxy_version: String,

    /// Git URL the reverse proxy checkout is cloned from
    pub proxy_repo: String,

    /// Deployment target (dev or prod)
    pub target: DeployTarget,

    /// Application server image version
    pub app_version: String,

    /// PostgreSQL image version
    pub postgres_version: String,

    /// PostgreSQL role used for engine queries
    pub db_user: String,

    /// Host port the app is exposed on
    pub exposed_port: u16,

    /// Port the app listens on inside the container
    pub internal_port: u16,

    /// App log directory (as mounted into the container)
    pub log_dir: String,

    /// App config directory (as mounted into the container)
    pub conf_dir: String,

    /// Raw addons path setting from the environment
    pub addons_setting: String,

    /// Public domain, prod only
    pub domain: Option<String>,

    /// Install missing catalog modules on each database
    pub auto_install_modules: bool,

    /// Update changed modules on each database
    pub auto_update_modules: bool,

    /// Explicit module list overriding change detection for this run
    pub update_module_list: Option<Vec<String>>,

    /// Append the force-update modifier to update operations
    pub force_update: bool,

    /// Rebuild images regardless of detected changes
    pub force_rebuild: bool,

    /// Create a database on first run (dev only)
    pub auto_create_database: bool,

    /// Project base directory
    pub base_dir: PathBuf,
}

impl EnvConfig {
    /// Resolved addons root. The default `./addons` setting points into
    /// the project; anything else is taken as an external path.
    pub fn addons_dir(&self) -> PathBuf {
        if self.addons_setting == "./addons" {
            self.base_dir.join("addons")
        } else {
            PathBuf::from(&self.addons_setting)
        }
    }

    /// Addons directory inside the build context
    pub fn staged_addons_dir(&self) -> PathBuf {
        self.base_dir.join("addons")
    }

    pub fn env_file(&self) -> PathBuf {
        self.base_dir.join(".env")
    }

    /// Image definition file whose mtime participates in rebuild decisions
    pub fn dockerfile(&self) -> PathBuf {
        self.base_dir.join("app.Dockerfile")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.base_dir.join("cache")
    }

    /// Build-input cache (env file + dockerfile mtimes)
    pub fn build_cache_file(&self) -> PathBuf {
        self.cache_dir().join("config_cache.json")
    }

    /// Module fingerprint cache
    pub fn module_cache_file(&self) -> PathBuf {
        self.cache_dir().join("addons_cache.json")
    }

    /// Directory holding the reverse proxy checkout, shared across stacks
    pub fn proxy_base_dir(&self) -> PathBuf {
        self.base_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone())
    }

    /// App config file rewritten by auto-config and proxy toggling
    pub fn app_conf_file(&self) -> PathBuf {
        self.base_dir.join("config").join("app.conf")
    }

    pub fn postgres_conf_file(&self) -> PathBuf {
        self.base_dir.join("config").join("postgresql.conf")
    }

    /// App server log file, tailed on launch failure
    pub fn app_log_file(&self) -> PathBuf {
        self.base_dir.join("log").join("app-server.log")
    }

    /// Name of the database container
    pub fn db_container(&self) -> String {
        format!("{}_db", self.project_name)
    }

    /// Internal URL used for readiness probing
    pub fn internal_url(&self) -> String {
        format!("http://localhost:{}", self.exposed_port)
    }

    /// Public URL used for readiness probing in prod
    pub fn public_url(&self) -> Option<String> {
        self.domain.as_ref().map(|d| format!("https://{d}"))
    }

    /// Check the parts of the configuration that depend on the filesystem
    pub fn validate(&self) -> SlipwayResult<()> {
        let addons = self.addons_dir();
        if !addons.exists() {
            return Err(SlipwayError::AddonsRootMissing(addons));
        }
        if !addons.is_dir() {
            return Err(SlipwayError::AddonsRootNotDir(addons));
        }
        Ok(())
    }
}
