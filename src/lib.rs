//! # Server Migration
//!
//! A task composition and execution engine for migrating server
//! configurations. A migration is a tree of named tasks: leaf tasks do the
//! work, composite tasks run ordered subtasks and aggregate their outcomes.
//! Every run produces an execution tree of SUCCESS, FAIL and SKIPPED results
//! that can be summarized as text or JSON.
//!
//! ## Architecture Overview
//!
//! - **[`task`]**: Task builders, skip policies, hooks and the execution context
//! - **[`environment`]**: Property store consulted by skip policies and tasks
//! - **[`management`]**: Management operations and an in-memory resource model
//! - **[`resource`]**: Resource selection and per-resource fan-out
//! - **[`plan`]**: Declarative TOML plans compiled into task builders
//! - **[`report`]**: Statistics, summaries and JSON reports
//! - **[`integration`]**: Configuration and the system that runs root tasks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use server_migration::task::*;
//! use server_migration::{MigrationConfig, MigrationSystem};
//!
//! fn main() -> anyhow::Result<()> {
//!     let migrate = CompositeTaskBuilder::<NoParameters>::named("server-migration")
//!         .subtask(
//!             LeafTaskBuilder::named("remove-extensions")
//!                 .skip_policy(default_task_skip_property())
//!                 .run(|_: &NoParameters, _: &TaskName, _: &mut TaskContext| {
//!                     Ok(TaskResult::success())
//!                 }),
//!         );
//!
//!     let system = MigrationSystem::new(MigrationConfig::default());
//!     let report = system.run_builder(&migrate, NoParameters)?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

/// Task composition and execution engine.
///
/// Leaf and composite task builders, skip policies, lifecycle hooks,
/// parameter mappers and the context that records executions.
pub mod task;

/// Property-backed migration environment with read tracking.
pub mod environment;

/// Management operations, resource addresses and an in-memory model.
pub mod management;

/// Manageable resources, capability traits and resource selectors.
pub mod resource;

/// Migration file copying with backups of replaced targets.
pub mod files;

/// User prompts for interactive migrations.
pub mod interaction;

/// Reports built from finished execution trees.
pub mod report;

/// Declarative migration plans.
pub mod plan;

/// Configuration and the migration system.
pub mod integration;

/// Environment constants and path utilities.
///
/// Centralizes file names, property names and paths used throughout the
/// application.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use environment::{EnvironmentError, MigrationEnvironment};
pub use integration::{MigrationConfig, MigrationSystem, ReportConfig};
pub use management::{ManagementClient, ManagementModel, ManagementOperationError};
pub use plan::{MigrationPlan, PlanError};
pub use report::MigrationReport;
pub use task::{
    BuildError, CompositeTaskBuilder, LeafTaskBuilder, ServerMigrationTask, TaskExecution,
    TaskName, TaskResult, TaskStatus,
};
