use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::GeneratorError;

pub const TEMPLATE_SUFFIX: &str = ".template.json";
pub const ASSET_MANIFEST_SUFFIX: &str = ".assets.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum UnitKind {
    Generic,
    /// Ships code assets that must be published before the stack deploys.
    AssetPublishing { source_folder: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeployableUnit {
    pub name: String,
    #[serde(flatten)]
    pub kind: UnitKind,
}

impl DeployableUnit {
    pub fn generic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: UnitKind::Generic,
        }
    }

    pub fn asset_publishing(name: impl Into<String>, source_folder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: UnitKind::AssetPublishing {
                source_folder: source_folder.into(),
            },
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self.kind, UnitKind::Generic)
    }

    pub fn template_file(&self) -> String {
        format!("{}{}", self.name, TEMPLATE_SUFFIX)
    }

    pub fn asset_manifest_file(&self) -> String {
        format!("{}{}", self.name, ASSET_MANIFEST_SUFFIX)
    }
}

/// Ordered set of units admitted for generation.
///
/// Only constructible through [`Catalog::new`], so holding one means the
/// list is non-empty, names are unique stack identifiers, and every
/// asset-publishing unit names its source folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    units: Vec<DeployableUnit>,
}

impl Catalog {
    pub fn new(units: Vec<DeployableUnit>) -> Result<Self, GeneratorError> {
        if units.is_empty() {
            return Err(GeneratorError::EmptyCatalog);
        }

        let mut seen = HashSet::with_capacity(units.len());
        for (idx, unit) in units.iter().enumerate() {
            if unit.name.trim().is_empty() {
                return Err(GeneratorError::BlankUnitName(idx + 1));
            }
            if !is_stack_identifier(&unit.name) {
                return Err(GeneratorError::InvalidUnitName(unit.name.clone()));
            }
            if !seen.insert(unit.name.as_str()) {
                return Err(GeneratorError::DuplicateUnit(unit.name.clone()));
            }
            if let UnitKind::AssetPublishing { source_folder } = &unit.kind
                && source_folder.trim().is_empty()
            {
                return Err(GeneratorError::MissingSourceFolder(unit.name.clone()));
            }
        }

        Ok(Self { units })
    }

    pub fn units(&self) -> &[DeployableUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&DeployableUnit> {
        self.units.iter().find(|unit| unit.name == name)
    }

    pub fn generic_units(&self) -> Vec<&DeployableUnit> {
        self.units.iter().filter(|unit| unit.is_generic()).collect()
    }

    pub fn asset_publishing_units(&self) -> Vec<&DeployableUnit> {
        self.units.iter().filter(|unit| !unit.is_generic()).collect()
    }
}

/// Stack names: ASCII letters, digits and `-`, starting with a letter.
///
/// Unit names end up in artifact globs, shell commands and resource names,
/// so nothing else is admitted.
pub fn is_stack_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// On-disk catalog: pipeline settings plus the ordered unit list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogFile {
    pub version: u32,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub units: Vec<DeployableUnit>,
}

impl CatalogFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let catalog: CatalogFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse catalog YAML: {}", path.display()))?;
        Ok(catalog)
    }

    /// Units in deployment order, with the pipeline's own stack appended when
    /// the configuration names one.
    pub fn deployment_units(&self) -> Vec<DeployableUnit> {
        let mut units = self.units.clone();
        if let Some(stack) = &self.pipeline.stack_name {
            units.push(DeployableUnit::generic(stack.clone()));
        }
        units
    }

    pub fn to_catalog(&self) -> Result<Catalog, GeneratorError> {
        if self.version != 1 {
            return Err(GeneratorError::UnsupportedVersion(self.version));
        }
        Catalog::new(self.deployment_units())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kind_tags() {
        let yaml = r#"
version: 1
units:
  - name: LambdaStack
    kind: asset-publishing
    source_folder: lambda-code
  - name: InfraStack
    kind: generic
"#;
        let file: CatalogFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            file.units,
            vec![
                DeployableUnit::asset_publishing("LambdaStack", "lambda-code"),
                DeployableUnit::generic("InfraStack"),
            ]
        );
    }

    #[test]
    fn unknown_kind_is_rejected_at_parse_time() {
        let yaml = "version: 1\nunits:\n  - name: X\n    kind: container\n";
        assert!(serde_yaml::from_str::<CatalogFile>(yaml).is_err());
    }

    #[test]
    fn asset_publishing_without_folder_is_rejected_at_parse_time() {
        let yaml = "version: 1\nunits:\n  - name: X\n    kind: asset-publishing\n";
        assert!(serde_yaml::from_str::<CatalogFile>(yaml).is_err());
    }

    #[test]
    fn catalog_rejects_blank_source_folder() {
        let err = Catalog::new(vec![DeployableUnit::asset_publishing("Fn", "  ")]).unwrap_err();
        assert_eq!(err, GeneratorError::MissingSourceFolder("Fn".into()));
    }

    #[test]
    fn catalog_rejects_blank_name() {
        let err = Catalog::new(vec![
            DeployableUnit::generic("Infra"),
            DeployableUnit::generic(""),
        ])
        .unwrap_err();
        assert_eq!(err, GeneratorError::BlankUnitName(2));
    }

    #[test]
    fn catalog_rejects_names_outside_stack_identifiers() {
        for name in ["Infra[1]", "*", "Fn?", "Infra ", "My Stack", "infra_stack", "2fast"] {
            let err = Catalog::new(vec![DeployableUnit::generic(name)]).unwrap_err();
            assert_eq!(err, GeneratorError::InvalidUnitName(name.into()));
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn trailing_space_does_not_sneak_past_duplicate_check() {
        let err = Catalog::new(vec![
            DeployableUnit::generic("Infra"),
            DeployableUnit::generic("Infra "),
        ])
        .unwrap_err();
        assert_eq!(err, GeneratorError::InvalidUnitName("Infra ".into()));
    }

    #[test]
    fn stack_identifier_rules() {
        assert!(is_stack_identifier("InfraStack"));
        assert!(is_stack_identifier("infra-stack-2"));
        assert!(!is_stack_identifier("2fast"));
        assert!(!is_stack_identifier("infra_stack"));
        assert!(!is_stack_identifier(""));
    }

    #[test]
    fn pipeline_stack_is_appended_last() {
        let mut file = CatalogFile {
            version: 1,
            pipeline: PipelineConfig::default(),
            units: vec![DeployableUnit::generic("Infra")],
        };
        file.pipeline.stack_name = Some("CodePipelineStack".into());

        let catalog = file.to_catalog().unwrap();
        let names: Vec<_> = catalog.units().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Infra", "CodePipelineStack"]);
    }

    #[test]
    fn unsupported_version_fails() {
        let file = CatalogFile {
            version: 2,
            pipeline: PipelineConfig::default(),
            units: vec![DeployableUnit::generic("Infra")],
        };
        assert_eq!(
            file.to_catalog().unwrap_err(),
            GeneratorError::UnsupportedVersion(2)
        );
    }
}
