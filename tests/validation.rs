use std::fs;

use pipegen::catalog::{CatalogFile, DeployableUnit};
use pipegen::config::PipelineConfig;
use pipegen::lockfile::{fingerprint, generate_lock};
use pipegen::pipeline::generate_from_file;
use pipegen::validation::validate_catalog;
use tempfile::tempdir;

fn base_catalog(units: Vec<DeployableUnit>) -> CatalogFile {
    CatalogFile {
        version: 1,
        pipeline: PipelineConfig::default(),
        units,
    }
}

#[test]
fn validation_collects_every_error() {
    let mut catalog = base_catalog(vec![
        DeployableUnit::generic("Infra"),
        DeployableUnit::generic("Infra"),
        DeployableUnit::asset_publishing("Fn", ""),
    ]);
    catalog.version = 3;

    let report = validate_catalog(&catalog);

    assert!(!report.is_ok());
    assert_eq!(report.errors.len(), 3, "{:?}", report.errors);
}

#[test]
fn empty_catalog_fails_validation() {
    let report = validate_catalog(&base_catalog(Vec::new()));
    assert!(!report.is_ok());
}

#[test]
fn asset_only_catalog_warns_but_passes() {
    let report = validate_catalog(&base_catalog(vec![DeployableUnit::asset_publishing(
        "Fn",
        "fn-code",
    )]));
    assert!(report.is_ok(), "{:?}", report.errors);
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.contains("no aggregate build action"))
    );
}

#[test]
fn pipeline_stack_colliding_with_unit_fails() {
    let mut catalog = base_catalog(vec![DeployableUnit::generic("CodePipelineStack")]);
    catalog.pipeline.stack_name = Some("CodePipelineStack".into());

    let report = validate_catalog(&catalog);
    assert!(!report.is_ok());
    assert!(generate_from_file(&catalog).is_err());
}

#[test]
fn bundled_catalog_is_valid() {
    let catalog = CatalogFile::load(std::path::Path::new("catalogs/lambda-infra.yaml"))
        .expect("bundled catalog should load");
    let report = validate_catalog(&catalog);
    assert!(
        report.is_ok(),
        "bundled catalog should pass validation: {:?}",
        report.errors
    );

    let definition = generate_from_file(&catalog).unwrap();
    let stacks: Vec<_> = definition
        .deploy_actions()
        .map(|d| d.stack_name.as_str())
        .collect();
    assert_eq!(stacks, ["LambdaStack", "InfraStack", "CodePipelineStack"]);
}

#[test]
fn lockfile_records_fingerprint_and_actions() {
    let temp = tempdir().unwrap();
    let catalog = base_catalog(vec![
        DeployableUnit::asset_publishing("Lambda", "lambda-code"),
        DeployableUnit::generic("Infra"),
    ]);
    let definition = generate_from_file(&catalog).unwrap();

    let lock_path = temp.path().join("pipeline.lock");
    generate_lock(&definition, &lock_path).unwrap();

    let content = fs::read_to_string(&lock_path).unwrap();
    assert!(content.contains("fingerprint"));
    assert!(content.contains("Deploy_Lambda"));
    assert!(content.contains(&fingerprint(&definition).unwrap()));

    let again = generate_from_file(&catalog).unwrap();
    assert_eq!(
        fingerprint(&definition).unwrap(),
        fingerprint(&again).unwrap()
    );
}
