//! Task composition and execution engine.
//!
//! A migration is a tree of tasks. Leaf tasks run a [`Runnable`]; composite
//! tasks run an ordered list of subtask slots, each of which may fan out into
//! several sibling tasks through a [`Mapper`]. Every execution is recorded as
//! a [`TaskExecution`] nested under its parent, and composites derive their
//! status from their direct subtasks with [`aggregate_status`].
//!
//! ```rust,no_run
//! use server_migration::task::*;
//! use server_migration::environment::MigrationEnvironment;
//! use std::sync::Arc;
//!
//! let remove_extensions = LeafTaskBuilder::<NoParameters>::named("remove-extensions")
//!     .skip_policy(default_task_skip_property())
//!     .run(|_: &NoParameters, _: &TaskName, _: &mut TaskContext| Ok(TaskResult::success()));
//!
//! let root = CompositeTaskBuilder::named("server-migration")
//!     .subtask(remove_extensions)
//!     .build(NoParameters)
//!     .expect("valid wiring");
//!
//! let services = Arc::new(MigrationServices::new(MigrationEnvironment::default()));
//! let execution = execute_root(services, &root);
//! println!("{}", execution.status());
//! ```

pub mod builder;
pub mod composite;
pub mod context;
pub mod execution;
pub mod hooks;
pub mod leaf;
pub mod name;
pub mod params;
pub mod result;
pub mod skip;


pub use builder::*;
pub use composite::*;
pub use context::*;
pub use execution::*;
pub use hooks::*;
pub use leaf::*;
pub use name::*;
pub use params::*;
pub use result::*;
pub use skip::{
    SkipPolicy, all_of, any_of, default_task_skip_property, not, skip_by_property_prefix,
    skip_if_any_property_set, skip_property_name, skip_unless_confirmed,
};
