use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{Catalog, DeployableUnit, UnitKind};
use crate::config::BuildSettings;
use crate::error::GeneratorError;

const INSTALL_PROJECT: &str = "npm i -g npm && npm ci";
const INSTALL_PUBLISHER: &str = "npm install -g cdk-assets";
const RUN_BUILD: &str = "npm run build";
const RUN_SYNTH: &str = "npm run cdk synth";

/// Build instructions for one build action, shaped the way the build
/// executor reads them: `{version, phases, artifacts}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildSpecification {
    pub version: String,
    pub phases: Phases,
    pub artifacts: ArtifactSelection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Phases {
    pub install: PhaseCommands,
    pub pre_build: PhaseCommands,
    pub build: PhaseCommands,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PhaseCommands {
    pub commands: Vec<String>,
}

/// `files` are globs relative to `base-directory`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArtifactSelection {
    #[serde(rename = "base-directory")]
    pub base_directory: String,
    pub files: Vec<String>,
}

impl BuildSpecification {
    pub fn install_commands(&self) -> &[String] {
        &self.phases.install.commands
    }

    pub fn pre_build_commands(&self) -> &[String] {
        &self.phases.pre_build.commands
    }

    pub fn build_commands(&self) -> &[String] {
        &self.phases.build.commands
    }

    pub fn artifact_files(&self) -> &[String] {
        &self.artifacts.files
    }

    /// Whether `file` is selected by one of the artifact globs.
    pub fn exports(&self, file: &str) -> bool {
        self.artifacts.files.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|p| p.matches(file))
                .unwrap_or_else(|_| pattern == file)
        })
    }
}

/// Compiles the build spec for `target`, or the aggregate spec when `target`
/// is `None`.
///
/// The aggregate case returns `Ok(None)` when the catalog has no generic
/// units; an aggregate action with an empty artifact list is never produced.
pub fn compile(
    target: Option<&DeployableUnit>,
    catalog: &Catalog,
    settings: &BuildSettings,
) -> Result<Option<BuildSpecification>, GeneratorError> {
    match target {
        None => Ok(compile_aggregate(catalog, settings)),
        Some(unit) => compile_dedicated(unit, settings).map(Some),
    }
}

/// One spec covering every generic unit: install once, build, synth all.
pub fn compile_aggregate(catalog: &Catalog, settings: &BuildSettings) -> Option<BuildSpecification> {
    let generic = catalog.generic_units();
    if generic.is_empty() {
        debug!("No generic units; aggregate build spec skipped");
        return None;
    }

    let files = generic.iter().map(|unit| unit.template_file()).collect();
    Some(BuildSpecification {
        version: settings.spec_version.clone(),
        phases: Phases {
            install: commands([INSTALL_PROJECT.to_string()]),
            pre_build: PhaseCommands::default(),
            build: commands([RUN_BUILD.to_string(), RUN_SYNTH.to_string()]),
        },
        artifacts: ArtifactSelection {
            base_directory: settings.output_directory.clone(),
            files,
        },
    })
}

/// Spec for a single asset-publishing unit: installs its own folder's
/// dependencies plus the publisher, synths only this stack, then publishes
/// its asset manifest.
pub fn compile_dedicated(
    unit: &DeployableUnit,
    settings: &BuildSettings,
) -> Result<BuildSpecification, GeneratorError> {
    let source_folder = match &unit.kind {
        UnitKind::AssetPublishing { source_folder } => source_folder,
        UnitKind::Generic => return Err(GeneratorError::NotAssetPublishing(unit.name.clone())),
    };

    let folder = Path::new(&settings.source_root).join(source_folder);
    let folder_display = folder.to_string_lossy().replace('\\', "/");

    Ok(BuildSpecification {
        version: settings.spec_version.clone(),
        phases: Phases {
            install: commands([
                format!("cd {folder_display}"),
                "npm install".to_string(),
                format!("cd {}", return_path(&folder)),
                INSTALL_PROJECT.to_string(),
                INSTALL_PUBLISHER.to_string(),
            ]),
            pre_build: commands([
                RUN_BUILD.to_string(),
                format!("{RUN_SYNTH} {}", unit.name),
            ]),
            build: commands([format!(
                "cdk-assets -p {}/{} publish",
                settings.output_directory,
                unit.asset_manifest_file()
            )]),
        },
        artifacts: ArtifactSelection {
            base_directory: settings.output_directory.clone(),
            files: vec![unit.template_file()],
        },
    })
}

fn commands<const N: usize>(items: [String; N]) -> PhaseCommands {
    PhaseCommands {
        commands: items.into(),
    }
}

/// Relative path leading back out of `folder`, e.g. `lib/lambda-code` -> `../..`.
fn return_path(folder: &Path) -> String {
    let depth = folder
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
        .max(1);
    vec![".."; depth].join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedicated_spec_follows_publish_sequence() {
        let unit = DeployableUnit::asset_publishing("LambdaStack", "lambda-code");
        let spec = compile_dedicated(&unit, &BuildSettings::default()).unwrap();

        assert_eq!(
            spec.install_commands(),
            [
                "cd lib/lambda-code",
                "npm install",
                "cd ../..",
                "npm i -g npm && npm ci",
                "npm install -g cdk-assets",
            ]
        );
        assert_eq!(
            spec.pre_build_commands(),
            ["npm run build", "npm run cdk synth LambdaStack"]
        );
        assert_eq!(
            spec.build_commands(),
            ["cdk-assets -p cdk.out/LambdaStack.assets.json publish"]
        );
        assert_eq!(spec.artifact_files(), ["LambdaStack.template.json"]);
    }

    #[test]
    fn dedicated_spec_rejects_generic_unit() {
        let unit = DeployableUnit::generic("Infra");
        let err = compile_dedicated(&unit, &BuildSettings::default()).unwrap_err();
        assert_eq!(err, GeneratorError::NotAssetPublishing("Infra".into()));
    }

    #[test]
    fn aggregate_spec_only_lists_generic_templates() {
        let catalog = Catalog::new(vec![
            DeployableUnit::asset_publishing("Fn", "fn"),
            DeployableUnit::generic("Infra"),
            DeployableUnit::generic("Network"),
        ])
        .unwrap();
        let spec = compile_aggregate(&catalog, &BuildSettings::default()).unwrap();

        assert_eq!(
            spec.artifact_files(),
            ["Infra.template.json", "Network.template.json"]
        );
        assert!(spec.pre_build_commands().is_empty());
        assert_eq!(spec.build_commands(), ["npm run build", "npm run cdk synth"]);
    }

    #[test]
    fn aggregate_is_skipped_without_generic_units() {
        let catalog = Catalog::new(vec![DeployableUnit::asset_publishing("Fn", "fn")]).unwrap();
        let spec = compile(None, &catalog, &BuildSettings::default()).unwrap();
        assert!(spec.is_none());
    }

    #[test]
    fn serializes_with_hyphenated_base_directory() {
        let unit = DeployableUnit::asset_publishing("Fn", "fn");
        let spec = compile_dedicated(&unit, &BuildSettings::default()).unwrap();
        let value = serde_json::to_value(&spec).unwrap();

        assert_eq!(value["version"], "0.2");
        assert_eq!(value["artifacts"]["base-directory"], "cdk.out");
        assert_eq!(value["phases"]["pre_build"]["commands"][1], "npm run cdk synth Fn");
    }

    #[test]
    fn exports_matches_globs() {
        let unit = DeployableUnit::asset_publishing("Fn", "fn");
        let mut spec = compile_dedicated(&unit, &BuildSettings::default()).unwrap();
        assert!(spec.exports("Fn.template.json"));
        assert!(!spec.exports("Other.template.json"));

        spec.artifacts.files = vec!["*.template.json".into()];
        assert!(spec.exports("Other.template.json"));
    }

    #[test]
    fn return_path_handles_nested_folders() {
        assert_eq!(return_path(Path::new("lib/functions/api")), "../../..");
        assert_eq!(return_path(Path::new("code")), "..");
    }
}
