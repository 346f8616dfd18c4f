use std::collections::HashSet;
use std::path::{Component, Path};

use serde::Serialize;

use crate::catalog::{CatalogFile, UnitKind, is_stack_identifier};
use crate::pipeline::generate_from_file;

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Lints a catalog file, collecting every problem instead of stopping at the
/// first one. A clean report means generation will succeed.
pub fn validate_catalog(catalog: &CatalogFile) -> ValidationReport {
    let mut report = ValidationReport::default();

    if catalog.version != 1 {
        report
            .errors
            .push(format!("Unsupported catalog version: {}", catalog.version));
    }

    let units = catalog.deployment_units();
    if units.is_empty() {
        report
            .errors
            .push("Catalog must contain at least one deployable unit".into());
    }

    let mut seen = HashSet::new();
    for (idx, unit) in units.iter().enumerate() {
        if unit.name.trim().is_empty() {
            report
                .errors
                .push(format!("Unit {} has a blank name", idx + 1));
            continue;
        }
        if !seen.insert(unit.name.as_str()) {
            report
                .errors
                .push(format!("Duplicate deployable unit name '{}'", unit.name));
        }
        if !is_stack_identifier(&unit.name) {
            report.errors.push(format!(
                "Unit '{}' is not a valid stack name (letters, digits and '-', starting with a letter)",
                unit.name
            ));
        }
        if let UnitKind::AssetPublishing { source_folder } = &unit.kind {
            report.merge(validate_source_folder(&unit.name, source_folder));
        }
    }

    if !units.is_empty() && units.iter().all(|unit| !unit.is_generic()) {
        report.warnings.push(
            "All units are asset-publishing; no aggregate build action will be emitted".into(),
        );
    }

    if catalog.pipeline.name.trim().is_empty() {
        report.errors.push("Pipeline name cannot be empty".into());
    }
    if catalog.pipeline.source.branch.trim().is_empty() {
        report.errors.push("Source branch cannot be empty".into());
    }
    if catalog.pipeline.source.repository.trim().is_empty() {
        report.errors.push("Source repository cannot be empty".into());
    }

    if report.is_ok()
        && let Err(err) = generate_from_file(catalog)
    {
        report.errors.push(err.to_string());
    }

    report
}

fn validate_source_folder(unit: &str, folder: &str) -> ValidationReport {
    let mut report = ValidationReport::default();
    if folder.trim().is_empty() {
        report.errors.push(format!(
            "Asset-publishing unit '{unit}' requires a non-empty source_folder"
        ));
        return report;
    }
    let path = Path::new(folder);
    if path.is_absolute() {
        report.warnings.push(format!(
            "Source folder '{folder}' for unit '{unit}' is absolute; it is joined onto the source root"
        ));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        report.warnings.push(format!(
            "Source folder '{folder}' for unit '{unit}' escapes the source root"
        ));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_characters_in_names_are_errors() {
        let catalog = CatalogFile {
            version: 1,
            pipeline: Default::default(),
            units: vec![
                crate::catalog::DeployableUnit::asset_publishing("Lambda", "lambda-code"),
                crate::catalog::DeployableUnit::generic("*"),
            ],
        };
        let report = validate_catalog(&catalog);
        assert!(!report.is_ok());
        assert!(report.errors.iter().any(|e| e.contains("'*'")));
    }

    #[test]
    fn parent_folder_warns() {
        let report = validate_source_folder("Fn", "../outside");
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 1);
    }
}
