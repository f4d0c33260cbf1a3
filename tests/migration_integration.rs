//! End-to-end migrations built in code: builders, resources, files and reports.

use server_migration::files::{BACKUP_SUFFIX, LocalMigrationFiles};
use server_migration::management::{Operation, ResourceAddress};
use server_migration::resource::{
    HasResource, HasServerConfiguration, ResourceParameters, ResourceSelector, ServerParameters,
    resource_task_name,
};
use server_migration::task::*;
use server_migration::{ManagementModel, MigrationConfig, MigrationEnvironment, MigrationSystem};
use serde_json::{Map, json};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

type Subsystem = ResourceParameters<ServerParameters>;

fn source_model() -> Arc<ManagementModel> {
    let mut logging = Map::new();
    logging.insert("level".to_string(), json!("DEBUG"));
    Arc::new(
        ManagementModel::new()
            .with_resource(ResourceAddress::root().append("extension", "org.legacy"), Map::new())
            .with_resource(ResourceAddress::root().append("subsystem", "logging"), logging)
            .with_resource(ResourceAddress::root().append("subsystem", "mail"), Map::new())
            .with_resource(ResourceAddress::root().append("subsystem", "ee"), Map::new()),
    )
}

fn remove_extensions() -> CompositeTaskBuilder<ServerParameters> {
    CompositeTaskBuilder::named("remove-extensions")
        .skip_policy(default_task_skip_property())
        .subtask_mapped(
            ResourceSelector::all("extension").mapper::<ServerParameters>(),
            LeafTaskBuilder::<Subsystem>::new()
                .name_with(resource_task_name::<Subsystem>("remove-extension"))
                .run(|params: &Subsystem, _: &TaskName, _: &mut TaskContext| {
                    params
                        .server_configuration()
                        .client()
                        .execute(&Operation::remove(params.resource().address.clone()))?;
                    Ok(TaskResult::success())
                }),
        )
}

fn update_subsystems() -> CompositeTaskBuilder<ServerParameters> {
    CompositeTaskBuilder::named("subsystems")
        .skip_policy(default_task_skip_property())
        .subtask_mapped(
            ResourceSelector::all("subsystem").mapper::<ServerParameters>(),
            LeafTaskBuilder::<Subsystem>::new()
                .name_with(resource_task_name::<Subsystem>("update-subsystem"))
                .skip_policy(skip_by_property_prefix("subsystem.mail"))
                .run(|params: &Subsystem, _: &TaskName, context: &mut TaskContext| {
                    let level = context
                        .environment()
                        .property_as_string_or("logging.level", "INFO");
                    if params.resource().name != "logging" {
                        return Ok(TaskResult::skipped());
                    }
                    params.server_configuration().client().execute(
                        &Operation::write_attribute(
                            params.resource().address.clone(),
                            "level",
                            level,
                        ),
                    )?;
                    Ok(TaskResult::success())
                }),
        )
}

fn migration() -> CompositeTaskBuilder<ServerParameters> {
    CompositeTaskBuilder::named("server-migration")
        .subtask(remove_extensions())
        .subtask(update_subsystems())
}

#[test]
fn test_full_migration_updates_model_and_reports() {
    let model = source_model();
    let config = MigrationConfig::default()
        .with_property_overrides([("logging.level".to_string(), "WARN".to_string())]);
    let system = MigrationSystem::new(config);

    let report = system
        .run_builder(&migration(), ServerParameters::new("standalone", model.clone()))
        .expect("Migration should build and run");

    assert!(!report.is_failed());
    assert_eq!(report.status, TaskStatus::Success);
    assert!(!model.contains(&ResourceAddress::root().append("extension", "org.legacy")));
    let logging = model
        .attributes(&ResourceAddress::root().append("subsystem", "logging"))
        .unwrap();
    assert_eq!(logging["level"], "WARN");

    assert!(report.properties_read.contains(&"logging.level".to_string()));
    assert!(report.properties_read.contains(&"subsystems.skip".to_string()));
    assert!(report.summary().contains("[SKIPPED] update-subsystem resource=ee"));
}

#[test]
fn test_failure_is_isolated_to_its_branch() {
    let model = source_model();
    let params = ServerParameters::new("standalone", model.clone());
    let failing = migration().subtask(
        LeafTaskBuilder::<ServerParameters>::named("add-datasource").run(
            |params: &ServerParameters, _: &TaskName, _: &mut TaskContext| {
                params.server_configuration().client().execute(&Operation::add(
                    ResourceAddress::root()
                        .append("subsystem", "datasources")
                        .append("data-source", "ExampleDS"),
                ))?;
                Ok(TaskResult::success())
            },
        ),
    );

    let report = MigrationSystem::new(MigrationConfig::default())
        .run_builder(&failing, params)
        .unwrap();

    assert!(report.is_failed());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].path_display(),
        "server-migration / add-datasource"
    );
    assert!(report.failures[0]
        .error
        .as_deref()
        .unwrap()
        .contains("/subsystem=datasources not found"));
    // earlier siblings still ran
    assert!(!model.contains(&ResourceAddress::root().append("extension", "org.legacy")));
}

#[test]
fn test_skip_whole_branch_by_property() {
    let model = source_model();
    let config = MigrationConfig::default()
        .with_property_overrides([("remove-extensions.skip".to_string(), "true".to_string())]);

    let report = MigrationSystem::new(config)
        .run_builder(&migration(), ServerParameters::new("standalone", model.clone()))
        .unwrap();

    assert_eq!(report.status, TaskStatus::Success);
    assert!(model.contains(&ResourceAddress::root().append("extension", "org.legacy")));
    let removal = report.execution.subtask_named("remove-extensions").unwrap();
    assert!(removal.result.is_skipped());
    assert!(removal.subtasks.is_empty());
}

#[test]
fn test_file_copy_task_backs_up_existing_target() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("source").join("standalone.xml");
    let target = temp_dir.path().join("target").join("standalone.xml");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&source, "<server version=\"old\"/>").unwrap();
    fs::write(&target, "<server version=\"new\"/>").unwrap();

    let (from, to) = (source.clone(), target.clone());
    let copy = LeafTaskBuilder::<NoParameters>::named("copy-configuration").run(
        move |_: &NoParameters, _: &TaskName, context: &mut TaskContext| {
            context.files().copy(&from, &to)?;
            Ok(TaskResult::success())
        },
    );

    let services = MigrationServices::new(MigrationEnvironment::default())
        .with_files(Arc::new(LocalMigrationFiles::new()));
    let system = MigrationSystem::with_services(MigrationConfig::default(), services);
    let report = system.run_builder(&copy, NoParameters).unwrap();

    assert_eq!(report.status, TaskStatus::Success);
    assert_eq!(fs::read_to_string(&target).unwrap(), "<server version=\"old\"/>");
    let backup = target.with_file_name(format!("standalone.xml{}", BACKUP_SUFFIX));
    assert_eq!(fs::read_to_string(backup).unwrap(), "<server version=\"new\"/>");
}

#[test]
fn test_wiring_error_surfaces_before_running() {
    let broken = CompositeTaskBuilder::<NoParameters>::named("root")
        .subtask(LeafTaskBuilder::<NoParameters>::named("no-runnable"));

    let error = MigrationSystem::new(MigrationConfig::default())
        .run_builder(&broken, NoParameters)
        .unwrap_err();
    let root_cause = error.downcast_ref::<BuildError>().unwrap();
    assert!(matches!(root_cause, BuildError::InSubtask { index: 0, .. }));
}
