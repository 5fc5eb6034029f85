//! Configuration loading for Slipway
//!
//! The `.env` file in the project directory is merged into the process
//! environment (existing variables win), then an immutable [`EnvConfig`]
//! is resolved from it. Cache files live under the project; deployment
//! history lives under the user state directory.

pub mod schema;

pub use schema::{DeployTarget, EnvConfig};

use crate::error::{SlipwayError, SlipwayResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default reverse proxy checkout when TRAEFIK_REPO is not set
const DEFAULT_PROXY_REPO: &str = "https://github.com/slipway-sh/traefik-stack.git";

/// Environment lookup seam so config resolution is testable without
/// touching process state.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Load the `.env` file (if present) and resolve the configuration.
pub fn load(base_dir: &Path, env_file: Option<&Path>) -> SlipwayResult<EnvConfig> {
    let env_path = env_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| base_dir.join(".env"));

    if env_path.exists() {
        dotenvy::from_path(&env_path).map_err(|e| SlipwayError::EnvInvalid {
            name: env_path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!("Loaded environment from {}", env_path.display());
    } else if env_file.is_some() {
        // An explicitly requested env file must exist
        return Err(SlipwayError::EnvFileNotFound(env_path));
    } else {
        debug!("No .env file at {}, using process environment", env_path.display());
    }

    let lookup = |name: &str| std::env::var(name).ok();
    resolve(base_dir, &lookup)
}

/// Resolve an [`EnvConfig`] from an environment lookup.
pub fn resolve(base_dir: &Path, env: EnvLookup<'_>) -> SlipwayResult<EnvConfig> {
    let target: DeployTarget = required(env, "DEPLOY_TARGET")?.parse()?;

    Ok(EnvConfig {
        project_name: required(env, "COMPOSE_PROJECT_NAME")?,
        stack_version: required(env, "VERSION")?,
        proxy_version: required(env, "TRAEFIK_VERSION")?,
        proxy_repo: optional(env, "TRAEFIK_REPO")
            .unwrap_or_else(|| DEFAULT_PROXY_REPO.to_string()),
        target,
        app_version: required(env, "APP_VERSION")?,
        postgres_version: required(env, "POSTGRES_VERSION")?,
        db_user: optional(env, "POSTGRES_USER").unwrap_or_else(|| "app".to_string()),
        exposed_port: port(env, "APP_EXPOSED_PORT")?,
        internal_port: port(env, "APP_INTERNAL_PORT")?,
        log_dir: required(env, "APP_LOG")?,
        conf_dir: required(env, "APP_CONFIG")?,
        addons_setting: required(env, "APP_ADDONS")?,
        domain: optional(env, "DOMAIN"),
        auto_install_modules: flag(env, "AUTO_INSTALL_MODULES"),
        auto_update_modules: flag(env, "AUTO_UPDATE_MODULES"),
        update_module_list: optional(env, "UPDATE_MODULE_LIST").map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect()
        }),
        force_update: flag(env, "FORCE_UPDATE"),
        force_rebuild: flag(env, "FORCE_REBUILD"),
        auto_create_database: flag(env, "AUTO_CREATE_DATABASE"),
        base_dir: base_dir.to_path_buf(),
    })
}

fn required(env: EnvLookup<'_>, name: &str) -> SlipwayResult<String> {
    match env(name) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(SlipwayError::EnvMissing(name.to_string())),
    }
}

fn optional(env: EnvLookup<'_>, name: &str) -> Option<String> {
    env(name).filter(|v| !v.trim().is_empty())
}

fn flag(env: EnvLookup<'_>, name: &str) -> bool {
    matches!(
        env(name).as_deref().map(str::trim),
        Some("true") | Some("1")
    )
}

fn port(env: EnvLookup<'_>, name: &str) -> SlipwayResult<u16> {
    let raw = required(env, name)?;
    raw.trim().parse().map_err(|_| SlipwayError::EnvInvalid {
        name: name.to_string(),
        reason: format!("port must be a number, got '{raw}'"),
    })
}

/// Get the state directory path for run history
pub fn state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slipway")
}

/// Directory holding per-run deployment records
pub fn history_dir() -> PathBuf {
    state_dir().join("history")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("COMPOSE_PROJECT_NAME", "acme"),
            ("VERSION", "1.2"),
            ("TRAEFIK_VERSION", "3.1"),
            ("DEPLOY_TARGET", "dev"),
            ("APP_VERSION", "18"),
            ("POSTGRES_VERSION", "16"),
            ("APP_EXPOSED_PORT", "8069"),
            ("APP_INTERNAL_PORT", "8069"),
            ("APP_LOG", "./log"),
            ("APP_CONFIG", "./config"),
            ("APP_ADDONS", "./addons"),
            ("AUTO_INSTALL_MODULES", "true"),
            ("AUTO_UPDATE_MODULES", "true"),
            ("FORCE_UPDATE", "false"),
            ("FORCE_REBUILD", "false"),
            ("AUTO_CREATE_DATABASE", "true"),
        ])
    }

    fn resolve_with(vars: &HashMap<&str, &str>) -> SlipwayResult<EnvConfig> {
        let lookup = |name: &str| vars.get(name).map(|v| v.to_string());
        resolve(Path::new("/srv/stack"), &lookup)
    }

    #[test]
    fn resolves_complete_environment() {
        let cfg = resolve_with(&base_env()).unwrap();
        assert_eq!(cfg.project_name, "acme");
        assert_eq!(cfg.target, DeployTarget::Dev);
        assert_eq!(cfg.exposed_port, 8069);
        assert!(cfg.auto_install_modules);
        assert!(!cfg.force_rebuild);
        assert_eq!(cfg.domain, None);
        assert_eq!(cfg.update_module_list, None);
        assert_eq!(cfg.db_user, "app");
        assert_eq!(cfg.proxy_repo, DEFAULT_PROXY_REPO);
    }

    #[test]
    fn db_user_and_proxy_repo_are_overridable() {
        let mut vars = base_env();
        vars.insert("POSTGRES_USER", "erp");
        vars.insert("TRAEFIK_REPO", "https://git.example.com/proxy.git");
        let cfg = resolve_with(&vars).unwrap();
        assert_eq!(cfg.db_user, "erp");
        assert_eq!(cfg.proxy_repo, "https://git.example.com/proxy.git");
    }

    #[test]
    fn missing_required_var_errors() {
        let mut vars = base_env();
        vars.remove("POSTGRES_VERSION");
        assert!(matches!(
            resolve_with(&vars),
            Err(SlipwayError::EnvMissing(name)) if name == "POSTGRES_VERSION"
        ));
    }

    #[test]
    fn empty_required_var_errors() {
        let mut vars = base_env();
        vars.insert("COMPOSE_PROJECT_NAME", "  ");
        assert!(resolve_with(&vars).is_err());
    }

    #[test]
    fn invalid_port_errors() {
        let mut vars = base_env();
        vars.insert("APP_EXPOSED_PORT", "eighty");
        assert!(matches!(
            resolve_with(&vars),
            Err(SlipwayError::EnvInvalid { name, .. }) if name == "APP_EXPOSED_PORT"
        ));
    }

    #[test]
    fn invalid_target_errors() {
        let mut vars = base_env();
        vars.insert("DEPLOY_TARGET", "staging");
        assert!(resolve_with(&vars).is_err());
    }

    #[test]
    fn update_list_is_split_and_trimmed() {
        let mut vars = base_env();
        vars.insert("UPDATE_MODULE_LIST", "sale, stock ,,crm");
        let cfg = resolve_with(&vars).unwrap();
        assert_eq!(
            cfg.update_module_list,
            Some(vec![
                "sale".to_string(),
                "stock".to_string(),
                "crm".to_string()
            ])
        );
    }

    #[test]
    fn flags_accept_true_and_one() {
        let mut vars = base_env();
        vars.insert("FORCE_REBUILD", "1");
        vars.insert("AUTO_UPDATE_MODULES", "yes");
        let cfg = resolve_with(&vars).unwrap();
        assert!(cfg.force_rebuild);
        assert!(!cfg.auto_update_modules);
    }
}
