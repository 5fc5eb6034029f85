//! Plan execution
//!
//! Drives the stack runtime through an ordered list of steps,
//! fail-fast: the first failing operation aborts everything that
//! remains. Cache state is committed strictly after the side effect it
//! describes succeeded, so the cache never records work that did not
//! happen.

use crate::cache::{load_cache, ModuleCache, PendingCache};
use crate::config::EnvConfig;
use crate::detect::{detect_module_changes, list_catalog_modules};
use crate::error::SlipwayResult;
use crate::plan::{plan_bootstrap_install, plan_existing, PlanOptions, Step};
use crate::stack::{DatabaseInspector, StackRuntime};
use crate::ui::{self, UiContext};
use std::collections::BTreeMap;
use tracing::debug;

/// Execute steps in order, narrating progress. Returns the labels of
/// the steps that completed, for the run record.
pub async fn execute_steps(
    runtime: &dyn StackRuntime,
    steps: &[Step],
    ctx: &UiContext,
) -> SlipwayResult<Vec<String>> {
    let mut executed = Vec::with_capacity(steps.len());

    for step in steps {
        debug!("Executing step: {}", step);
        match step {
            Step::Build => {
                runtime.build().await?;
                ui::step_ok(ctx, "Container images were successfully built");
            }
            Step::Launch | Step::Relaunch => {
                ui::step_info(ctx, "Spinning up containers");
                runtime.launch().await?;
                ui::step_ok(ctx, "Containers were successfully started");
            }
            Step::LaunchDatabase => {
                ui::step_info(ctx, "Launching database");
                runtime.launch_database().await?;
            }
            Step::CreateDatabase => {
                ui::step_info(ctx, "Creating database");
                runtime.create_database().await?;
                ui::step_ok(ctx, "Database created successfully");
            }
            Step::Install { database, modules } => {
                ui::step_info(ctx, &format!("Installing modules on database {database}"));
                runtime.install_modules(database, modules).await?;
                ui::step_ok(
                    ctx,
                    &format!("Installing modules on database {database} completed"),
                );
            }
            Step::Update {
                database,
                modules,
                force,
            } => {
                ui::step_info(ctx, &format!("Updating modules on database {database}"));
                runtime.update_modules(database, modules, *force).await?;
                ui::step_ok(
                    ctx,
                    &format!("Updating modules on database {database} completed"),
                );
            }
        }
        executed.push(step.to_string());
    }

    Ok(executed)
}

/// Run the module install/update phase of a deployment.
///
/// Enumerates live databases, plans per-database work from the change
/// detector and the live installed-module sets, executes the plan and
/// commits the new module cache only after the final relaunch
/// succeeded. On a fresh environment (no databases) the bootstrap path
/// launches the stack, optionally creates the first database and
/// installs the full catalog on it.
pub async fn run_module_phase(
    config: &EnvConfig,
    runtime: &dyn StackRuntime,
    inspector: &dyn DatabaseInspector,
    ctx: &UiContext,
) -> SlipwayResult<Vec<String>> {
    let mut executed =
        execute_steps(runtime, std::slice::from_ref(&Step::LaunchDatabase), ctx).await?;

    let databases = inspector.list_databases().await?;

    if databases.is_empty() {
        // Fresh environment: launch bare, then bootstrap if configured
        executed.extend(execute_steps(runtime, &[Step::Launch], ctx).await?);

        if !(config.target == crate::config::DeployTarget::Dev && config.auto_create_database) {
            return Ok(executed);
        }

        executed.extend(execute_steps(runtime, &[Step::CreateDatabase], ctx).await?);

        let databases = inspector.list_databases().await?;
        let catalog = list_catalog_modules(&config.addons_dir())?;

        // Fingerprint now so the cache records exactly what was installed
        let cached: ModuleCache = load_cache(&config.module_cache_file()).unwrap_or_default();
        let detected = detect_module_changes(&config.addons_dir(), &cached)?;
        let pending = PendingCache::new(config.module_cache_file(), detected.cache);

        let steps = plan_bootstrap_install(&databases, &catalog);
        ui::section(ctx, "DEPLOYING ENVIRONMENT");
        executed.extend(execute_steps(runtime, &steps, ctx).await?);

        pending.commit()?;
        return Ok(executed);
    }

    // Existing databases: incremental install/update per database
    let catalog = list_catalog_modules(&config.addons_dir())?;

    ui::step_info(ctx, "Fetching list of addons to update");
    let cached: ModuleCache = load_cache(&config.module_cache_file()).unwrap_or_default();
    let detected = detect_module_changes(&config.addons_dir(), &cached)?;
    let pending = PendingCache::new(config.module_cache_file(), detected.cache);

    let opts = PlanOptions::from_config(config);
    if detected.updated.is_empty() && opts.update_override.is_none() {
        ui::step_ok(ctx, "No addons found to be updated");
    }

    let mut installed = BTreeMap::new();
    for db in &databases {
        ui::step_info(
            ctx,
            &format!("Checking for addons to be installed on database {db}"),
        );
        installed.insert(db.clone(), inspector.installed_modules(db).await?);
    }

    let steps = plan_existing(&databases, &catalog, &detected.updated, &installed, &opts);
    ui::section(ctx, "DEPLOYING ENVIRONMENT");
    executed.extend(execute_steps(runtime, &steps, ctx).await?);

    // The plan is fully applied; only now record the new fingerprints
    pending.commit()?;

    Ok(executed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeployTarget, EnvConfig};
    use crate::error::SlipwayError;
    use crate::stack::{DatabaseInspector, StackRuntime};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeState {
        ops: Vec<String>,
        databases: Vec<String>,
        installed: BTreeMap<String, BTreeSet<String>>,
        fail_op: Option<String>,
    }

    #[derive(Clone, Default)]
    struct FakeStack {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeStack {
        fn record(&self, op: &str) -> SlipwayResult<()> {
            let mut state = self.state.lock().unwrap();
            if state.fail_op.as_deref() == Some(op) {
                return Err(SlipwayError::LaunchFailed(format!("injected: {op}")));
            }
            state.ops.push(op.to_string());
            Ok(())
        }

        fn ops(&self) -> Vec<String> {
            self.state.lock().unwrap().ops.clone()
        }
    }

    #[async_trait]
    impl StackRuntime for FakeStack {
        async fn stop(&self) -> SlipwayResult<()> {
            self.record("stop")
        }
        async fn build(&self) -> SlipwayResult<()> {
            self.record("build")
        }
        async fn launch(&self) -> SlipwayResult<()> {
            self.record("launch")
        }
        async fn launch_database(&self) -> SlipwayResult<()> {
            self.record("launch-database")
        }
        async fn create_database(&self) -> SlipwayResult<()> {
            self.record("create-database")?;
            self.state
                .lock()
                .unwrap()
                .databases
                .push("master".to_string());
            Ok(())
        }
        async fn install_modules(&self, database: &str, modules: &[String]) -> SlipwayResult<()> {
            self.record(&format!("install:{database}:{}", modules.join(",")))
        }
        async fn update_modules(
            &self,
            database: &str,
            modules: &[String],
            force: bool,
        ) -> SlipwayResult<()> {
            self.record(&format!("update:{database}:{}:{force}", modules.join(",")))
        }
        async fn tail_logs(&self, _lines: u32) -> SlipwayResult<String> {
            Ok(String::new())
        }
    }

    #[async_trait]
    impl DatabaseInspector for FakeStack {
        async fn list_databases(&self) -> SlipwayResult<Vec<String>> {
            Ok(self.state.lock().unwrap().databases.clone())
        }
        async fn installed_modules(&self, database: &str) -> SlipwayResult<BTreeSet<String>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .installed
                .get(database)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn test_config(base: &Path) -> EnvConfig {
        EnvConfig {
            project_name: "acme".to_string(),
            stack_version: "1.0".to_string(),
            proxy_version: "3.1".to_string(),
            proxy_repo: "https://git.example.com/proxy.git".to_string(),
            target: DeployTarget::Dev,
            app_version: "18".to_string(),
            postgres_version: "16".to_string(),
            db_user: "app".to_string(),
            exposed_port: 8069,
            internal_port: 8069,
            log_dir: "./log".to_string(),
            conf_dir: "./config".to_string(),
            addons_setting: "./addons".to_string(),
            domain: None,
            auto_install_modules: true,
            auto_update_modules: true,
            update_module_list: None,
            force_update: false,
            force_rebuild: false,
            auto_create_database: true,
            base_dir: base.to_path_buf(),
        }
    }

    fn write_module(base: &Path, name: &str, content: &str) {
        let dir = base.join("addons").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("__init__.py"), content).unwrap();
    }

    #[tokio::test]
    async fn fresh_environment_bootstraps_in_order() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        write_module(temp.path(), "sale", "a");
        write_module(temp.path(), "crm", "b");

        let stack = FakeStack::default();
        let ctx = UiContext::non_interactive();

        run_module_phase(&config, &stack, &stack, &ctx)
            .await
            .unwrap();

        assert_eq!(
            stack.ops(),
            vec![
                "launch-database",
                "launch",
                "create-database",
                "install:master:crm,sale",
                "launch",
            ]
        );
        // Fingerprints recorded for the installed catalog
        let cache: ModuleCache = load_cache(&config.module_cache_file()).unwrap();
        assert!(cache.contains_key("sale") && cache.contains_key("crm"));
    }

    #[tokio::test]
    async fn fresh_environment_without_auto_create_only_launches() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(temp.path());
        config.auto_create_database = false;
        write_module(temp.path(), "sale", "a");

        let stack = FakeStack::default();
        let ctx = UiContext::non_interactive();

        run_module_phase(&config, &stack, &stack, &ctx)
            .await
            .unwrap();

        assert_eq!(stack.ops(), vec!["launch-database", "launch"]);
        assert!(!config.module_cache_file().exists());
    }

    #[tokio::test]
    async fn existing_database_installs_before_updates_then_relaunches() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        write_module(temp.path(), "a", "same");
        write_module(temp.path(), "b", "changed-later");
        write_module(temp.path(), "c", "never-installed");

        // First pass records fingerprints for a and b
        let first = detect_module_changes(&config.addons_dir(), &ModuleCache::new()).unwrap();
        let mut seeded = first.cache.clone();
        seeded.remove("c");
        crate::cache::write_cache(&config.module_cache_file(), &seeded).unwrap();
        write_module(temp.path(), "b", "changed-now");

        let stack = FakeStack::default();
        {
            let mut state = stack.state.lock().unwrap();
            state.databases = vec!["prod".to_string()];
            state.installed.insert(
                "prod".to_string(),
                BTreeSet::from(["a".to_string(), "b".to_string()]),
            );
        }
        let ctx = UiContext::non_interactive();

        run_module_phase(&config, &stack, &stack, &ctx)
            .await
            .unwrap();

        assert_eq!(
            stack.ops(),
            vec![
                "launch-database",
                "install:prod:c",
                "update:prod:b,c:false",
                "launch",
            ]
        );
    }

    #[tokio::test]
    async fn failed_operation_aborts_remaining_plan_and_cache() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        write_module(temp.path(), "m", "x");

        let stack = FakeStack::default();
        {
            let mut state = stack.state.lock().unwrap();
            state.databases = vec!["one".to_string(), "two".to_string()];
            state.fail_op = Some("install:one:m".to_string());
        }
        let ctx = UiContext::non_interactive();

        let result = run_module_phase(&config, &stack, &stack, &ctx).await;
        assert!(result.is_err());

        // Nothing ran for the second database, no relaunch, no cache
        let ops = stack.ops();
        assert!(!ops.iter().any(|o| o.contains("two")));
        assert!(!ops.contains(&"launch".to_string()));
        assert!(!config.module_cache_file().exists());
    }

    #[tokio::test]
    async fn override_list_replaces_detector_result() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(temp.path());
        config.update_module_list = Some(vec!["sale".to_string()]);
        write_module(temp.path(), "sale", "x");

        // Seed cache so the detector reports nothing
        let first = detect_module_changes(&config.addons_dir(), &ModuleCache::new()).unwrap();
        crate::cache::write_cache(&config.module_cache_file(), &first.cache).unwrap();

        let stack = FakeStack::default();
        {
            let mut state = stack.state.lock().unwrap();
            state.databases = vec!["prod".to_string()];
            state
                .installed
                .insert("prod".to_string(), BTreeSet::from(["sale".to_string()]));
        }
        let ctx = UiContext::non_interactive();

        run_module_phase(&config, &stack, &stack, &ctx)
            .await
            .unwrap();

        assert_eq!(
            stack.ops(),
            vec!["launch-database", "update:prod:sale:false", "launch"]
        );
    }

    #[tokio::test]
    async fn second_run_without_changes_is_update_free() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        write_module(temp.path(), "sale", "x");

        let stack = FakeStack::default();
        {
            let mut state = stack.state.lock().unwrap();
            state.databases = vec!["prod".to_string()];
            state
                .installed
                .insert("prod".to_string(), BTreeSet::from(["sale".to_string()]));
        }
        let ctx = UiContext::non_interactive();

        // First run installs nothing (already installed) but records
        // fingerprints; second run must plan no module work at all.
        run_module_phase(&config, &stack, &stack, &ctx)
            .await
            .unwrap();
        stack.state.lock().unwrap().ops.clear();

        run_module_phase(&config, &stack, &stack, &ctx)
            .await
            .unwrap();
        assert_eq!(stack.ops(), vec!["launch-database", "launch"]);
    }
}
