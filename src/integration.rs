//! # Migration System Integration
//!
//! Wires configuration, environment and services together and runs a root
//! task to completion.
//!
//! ## Core Components
//!
//! - **[`MigrationConfig`]**: TOML configuration for a migration run
//! - **[`MigrationSystem`]**: Owns the shared services and runs root tasks
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use server_migration::{MigrationConfig, MigrationSystem};
//! use server_migration::plan::MigrationPlan;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = MigrationConfig::from_toml_file("server-migration.toml")?;
//!     let plan = MigrationPlan::from_toml_file("plan.toml")?;
//!
//!     let system = MigrationSystem::new(config);
//!     let report = system.run_plan(&plan)?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

use crate::env::properties::INTERACTIVE;
use crate::environment::{MigrationEnvironment, parse_boolean};
use crate::interaction::ConsolePrompt;
use crate::plan::{MigrationPlan, PlanParameters};
use crate::report::MigrationReport;
use crate::task::{MigrationServices, ServerMigrationTask, TaskBuilder, execute_root};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Ask the user before steps guarded by a confirmation
    pub interactive: bool,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: Option<String>,
    /// Seed values of the migration environment
    pub properties: BTreeMap<String, String>,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub json_path: Option<PathBuf>,
    pub summary_path: Option<PathBuf>,
    pub print_summary: bool,
}

impl MigrationConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    /// Property overrides applied on top of the configured properties
    pub fn with_property_overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.properties.extend(overrides);
        self
    }

    pub fn environment(&self) -> MigrationEnvironment {
        MigrationEnvironment::new(self.properties.clone())
    }
}

/// Runs root tasks against one set of services
pub struct MigrationSystem {
    config: MigrationConfig,
    services: Arc<MigrationServices>,
}

impl MigrationSystem {
    /// Services built from `config`; interactive runs prompt on the console
    pub fn new(config: MigrationConfig) -> Self {
        let environment = config.environment();
        // untracked: only task lookups belong in the report's read list
        let interactive = environment
            .properties()
            .get(INTERACTIVE)
            .and_then(|value| parse_boolean(value))
            .unwrap_or(config.interactive);
        let services = if interactive {
            MigrationServices::new(environment).with_prompt(Arc::new(ConsolePrompt))
        } else {
            MigrationServices::new(environment)
        };
        Self::with_services(config, services)
    }

    pub fn with_services(config: MigrationConfig, services: MigrationServices) -> Self {
        info!(
            "Migration system ready ({} properties, interactive: {})",
            services.environment().properties().len(),
            services.is_interactive()
        );
        Self {
            config,
            services: Arc::new(services),
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn services(&self) -> &Arc<MigrationServices> {
        &self.services
    }

    /// Run `task` as the migration root and write the configured reports
    pub fn run(&self, task: &dyn ServerMigrationTask) -> Result<MigrationReport> {
        info!("Starting migration {}", task.name());
        let execution = execute_root(Arc::clone(&self.services), task);
        let report = MigrationReport::from_execution(&execution, self.services.environment());
        info!(
            "Migration {} finished with {} ({} tasks)",
            report.task, report.status, report.statistics.total_tasks
        );
        self.write_reports(&report)?;
        Ok(report)
    }

    /// Build the root task from `builder` and run it; wiring errors surface
    /// before anything runs
    pub fn run_builder<P, B>(&self, builder: &B, params: P) -> Result<MigrationReport>
    where
        B: TaskBuilder<P>,
    {
        let task = builder
            .build_task(params)
            .context("Failed to build migration task")?;
        self.run(task.as_ref())
    }

    /// Compile `plan` and run it against its seeded in-memory model
    pub fn run_plan(&self, plan: &MigrationPlan) -> Result<MigrationReport> {
        let builder = plan.compile().context("Failed to compile migration plan")?;
        let params = PlanParameters::new(Arc::new(plan.model()));
        self.run_builder(&builder, params)
    }

    fn write_reports(&self, report: &MigrationReport) -> Result<()> {
        let settings = &self.config.report;
        if let Some(path) = &settings.json_path {
            report.write_json(path)?;
        }
        if let Some(path) = &settings.summary_path {
            report.write_summary(path)?;
        }
        if settings.print_summary {
            println!("{}", report.summary());
        }
        if report.is_failed() {
            warn!("Migration {} failed", report.task);
        }
        Ok(())
    }
}
