//! Resource-based configuration sizing
//!
//! Computes app server and postgres tuning from the host's CPU count
//! and total RAM, then rewrites the stack's config files. The split
//! gives the app server 65% of RAM and postgres 20%, leaving the rest
//! to the OS.

pub mod conf;

use crate::error::{SlipwayError, SlipwayResult};
use crate::ui::{self, UiContext};
use std::fs;
use std::path::Path;

const APP_RAM_SHARE: f64 = 0.65;
const POSTGRES_RAM_SHARE: f64 = 0.20;
const HARD_LIMIT_FACTOR: f64 = 1.40;
const DB_MAXCONN: u64 = 32;
const MAX_CRON_THREADS: u64 = 1;

/// Detected host resources
#[derive(Debug, Clone, Copy)]
pub struct ResourceProfile {
    pub cpus: u64,
    pub total_ram_bytes: u64,
}

impl ResourceProfile {
    /// Detect CPUs and total RAM of the current host
    pub fn detect() -> SlipwayResult<Self> {
        Ok(Self {
            cpus: num_cpus::get() as u64,
            total_ram_bytes: total_memory_bytes()?,
        })
    }
}

/// Total system memory from /proc/meminfo (the deployment host is
/// Linux; containers require it anyway)
fn total_memory_bytes() -> SlipwayResult<u64> {
    let content = fs::read_to_string("/proc/meminfo")
        .map_err(|e| SlipwayError::io("reading /proc/meminfo", e))?;
    parse_meminfo_total(&content)
        .ok_or_else(|| SlipwayError::Internal("MemTotal not found in /proc/meminfo".to_string()))
}

fn parse_meminfo_total(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find(|l| l.starts_with("MemTotal:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

/// Computed app server tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTuning {
    pub workers: u64,
    pub max_cron_threads: u64,
    pub limit_memory_soft: u64,
    pub limit_memory_hard: u64,
    pub db_maxconn: u64,
}

/// Computed postgres tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresTuning {
    pub shared_buffers_mb: u64,
    pub effective_cache_size_mb: u64,
    pub max_connections: u64,
    pub work_mem_mb: u64,
    pub maintenance_work_mem_mb: u64,
}

/// Full tuning derived from one resource profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuning {
    pub app: AppTuning,
    pub postgres: PostgresTuning,
}

impl Tuning {
    pub fn compute(profile: ResourceProfile) -> Self {
        let total = profile.total_ram_bytes as f64;
        let app_ram = total * APP_RAM_SHARE;
        let postgres_ram = total * POSTGRES_RAM_SHARE;

        let workers = profile.cpus * 2;
        let limit_memory_soft = (app_ram / (profile.cpus + MAX_CRON_THREADS) as f64) as u64;
        let limit_memory_hard = (limit_memory_soft as f64 * HARD_LIMIT_FACTOR) as u64;

        let max_connections =
            ((workers + MAX_CRON_THREADS) as f64 * DB_MAXCONN as f64 * 1.1) as u64;

        Self {
            app: AppTuning {
                workers,
                max_cron_threads: MAX_CRON_THREADS,
                limit_memory_soft,
                limit_memory_hard,
                db_maxconn: DB_MAXCONN,
            },
            postgres: PostgresTuning {
                shared_buffers_mb: (postgres_ram * 0.4 / 1e6) as u64,
                effective_cache_size_mb: (total * 0.5 / 1e6) as u64,
                max_connections,
                work_mem_mb: (total * 0.25 / max_connections as f64 / 1e6) as u64,
                maintenance_work_mem_mb: (total * 0.05 / 1e6) as u64,
            },
        }
    }
}

/// Write the computed tuning into the stack's config files.
pub fn apply(
    tuning: &Tuning,
    app_conf: &Path,
    postgres_conf: &Path,
    ctx: &UiContext,
) -> SlipwayResult<()> {
    ui::step_info(ctx, "Writing new configuration files");

    conf::set_options(
        app_conf,
        &[
            ("workers", tuning.app.workers.to_string()),
            ("max_cron_threads", tuning.app.max_cron_threads.to_string()),
            (
                "limit_memory_soft",
                tuning.app.limit_memory_soft.to_string(),
            ),
            (
                "limit_memory_hard",
                tuning.app.limit_memory_hard.to_string(),
            ),
            ("db_maxconn", tuning.app.db_maxconn.to_string()),
        ],
    )?;

    conf::write_postgres_conf(
        postgres_conf,
        &[
            ("listen_addresses", "'*'".to_string()),
            (
                "shared_buffers",
                format!("{}MB", tuning.postgres.shared_buffers_mb),
            ),
            (
                "effective_cache_size",
                format!("{}MB", tuning.postgres.effective_cache_size_mb),
            ),
            (
                "max_connections",
                tuning.postgres.max_connections.to_string(),
            ),
            ("work_mem", format!("{}MB", tuning.postgres.work_mem_mb)),
            (
                "maintenance_work_mem",
                format!("{}MB", tuning.postgres.maintenance_work_mem_mb),
            ),
        ],
    )?;

    ui::step_ok(ctx, "App and postgres config files have been written");
    Ok(())
}

/// Print the computed values for review.
pub fn review(tuning: &Tuning, ctx: &UiContext) {
    ui::section(ctx, "Calculated values for the app server");
    ui::key_value(ctx, "workers", &tuning.app.workers.to_string());
    ui::key_value(ctx, "max_cron_threads", &tuning.app.max_cron_threads.to_string());
    ui::key_value(ctx, "limit_memory_soft", &tuning.app.limit_memory_soft.to_string());
    ui::key_value(ctx, "limit_memory_hard", &tuning.app.limit_memory_hard.to_string());
    ui::key_value(ctx, "db_maxconn", &tuning.app.db_maxconn.to_string());

    ui::section(ctx, "Calculated values for postgres");
    ui::key_value(
        ctx,
        "shared_buffers",
        &format!("{}MB", tuning.postgres.shared_buffers_mb),
    );
    ui::key_value(
        ctx,
        "effective_cache_size",
        &format!("{}MB", tuning.postgres.effective_cache_size_mb),
    );
    ui::key_value(
        ctx,
        "max_connections",
        &tuning.postgres.max_connections.to_string(),
    );
    ui::key_value(ctx, "work_mem", &format!("{}MB", tuning.postgres.work_mem_mb));
    ui::key_value(
        ctx,
        "maintenance_work_mem",
        &format!("{}MB", tuning.postgres.maintenance_work_mem_mb),
    );
}
