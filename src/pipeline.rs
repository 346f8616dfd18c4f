use std::fmt;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::buildspec::{self, BuildSpecification};
use crate::catalog::{Catalog, CatalogFile, DeployableUnit, UnitKind};
use crate::config::{BuildEnvironment, PipelineConfig};
use crate::error::GeneratorError;
use crate::role::{self, ElevatedRole, RoleRef};
use crate::wiring::{self, TemplatePath};

pub const AGGREGATE_ACTION: &str = "CDK_Build_Action";
pub const AGGREGATE_PROJECT: &str = "CDK_Pipeline_Project";

/// Opaque, deterministic artifact name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn source() -> Self {
        Self("SourceOutput".to_string())
    }

    pub fn aggregate() -> Self {
        Self("CdkBuildOutput".to_string())
    }

    pub fn dedicated(unit: &str) -> Self {
        Self(format!("{unit}_BuildOutput"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTrigger {
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceAction {
    pub name: String,
    pub repository: String,
    pub branch: String,
    pub trigger: SourceTrigger,
    pub output: ArtifactId,
}

impl SourceAction {
    fn new(config: &PipelineConfig) -> Self {
        let name = match &config.source.action_name {
            Some(name) => name.clone(),
            None => format!("Source_{}", config.source_label()),
        };
        Self {
            name,
            repository: config.source.repository.clone(),
            branch: config.source.branch.clone(),
            trigger: SourceTrigger::Poll,
            output: ArtifactId::source(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildScope {
    Aggregate,
    Dedicated,
}

/// Build project backing a build action. Read-only once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildProject {
    name: String,
    spec: BuildSpecification,
    environment: BuildEnvironment,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<RoleRef>,
}

impl BuildProject {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &BuildSpecification {
        &self.spec
    }

    pub fn environment(&self) -> &BuildEnvironment {
        &self.environment
    }

    pub fn role(&self) -> Option<&RoleRef> {
        self.role.as_ref()
    }
}

/// A build action and the units whose templates it produces.
///
/// The only way to attach the elevated role is [`BuildAction::dedicated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildAction {
    name: String,
    scope: BuildScope,
    project: BuildProject,
    input: ArtifactId,
    output: ArtifactId,
    units: Vec<String>,
}

impl BuildAction {
    pub fn aggregate(
        spec: BuildSpecification,
        units: Vec<String>,
        input: ArtifactId,
        environment: BuildEnvironment,
    ) -> Self {
        Self {
            name: AGGREGATE_ACTION.to_string(),
            scope: BuildScope::Aggregate,
            project: BuildProject {
                name: AGGREGATE_PROJECT.to_string(),
                spec,
                environment,
                role: None,
            },
            input,
            output: ArtifactId::aggregate(),
            units,
        }
    }

    pub fn dedicated(
        unit: &DeployableUnit,
        spec: BuildSpecification,
        input: ArtifactId,
        environment: BuildEnvironment,
        role: &ElevatedRole,
    ) -> Self {
        Self {
            name: format!("Build_{}", unit.name),
            scope: BuildScope::Dedicated,
            project: BuildProject {
                name: format!("Build_{}_Project", unit.name),
                spec,
                environment,
                role: Some(role.reference()),
            },
            input,
            output: ArtifactId::dedicated(&unit.name),
            units: vec![unit.name.clone()],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> BuildScope {
        self.scope
    }

    pub fn project(&self) -> &BuildProject {
        &self.project
    }

    pub fn input(&self) -> &ArtifactId {
        &self.input
    }

    pub fn output(&self) -> &ArtifactId {
        &self.output
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }
}

/// Create-or-update of one named stack from a template inside an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployAction {
    pub name: String,
    pub template: TemplatePath,
    pub stack_name: String,
    pub admin_permissions: bool,
}

impl DeployAction {
    fn new(unit: &DeployableUnit, template: TemplatePath) -> Self {
        Self {
            name: format!("Deploy_{}", unit.name),
            template,
            stack_name: unit.name.clone(),
            admin_permissions: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Action {
    Source(SourceAction),
    Build(BuildAction),
    Deploy(DeployAction),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Source(action) => &action.name,
            Action::Build(action) => action.name(),
            Action::Deploy(action) => &action.name,
        }
    }

    pub fn input(&self) -> Option<&ArtifactId> {
        match self {
            Action::Source(_) => None,
            Action::Build(action) => Some(action.input()),
            Action::Deploy(action) => Some(&action.template.artifact),
        }
    }

    pub fn output(&self) -> Option<&ArtifactId> {
        match self {
            Action::Source(action) => Some(&action.output),
            Action::Build(action) => Some(action.output()),
            Action::Deploy(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageName {
    Source,
    Build,
    Deploy,
}

/// Actions in a stage run concurrently; stages run strictly in sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub name: StageName,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub stages: Vec<Stage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<ElevatedRole>,
}

impl PipelineDefinition {
    pub fn stage(&self, name: StageName) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.name == name)
    }

    pub fn source_actions(&self) -> impl Iterator<Item = &SourceAction> {
        self.actions().filter_map(|action| match action {
            Action::Source(source) => Some(source),
            _ => None,
        })
    }

    pub fn build_actions(&self) -> impl Iterator<Item = &BuildAction> {
        self.actions().filter_map(|action| match action {
            Action::Build(build) => Some(build),
            _ => None,
        })
    }

    pub fn deploy_actions(&self) -> impl Iterator<Item = &DeployAction> {
        self.actions().filter_map(|action| match action {
            Action::Deploy(deploy) => Some(deploy),
            _ => None,
        })
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.stages.iter().flat_map(|stage| stage.actions.iter())
    }

    pub fn build_action(&self, name: &str) -> Option<&BuildAction> {
        self.build_actions().find(|action| action.name() == name)
    }

    pub fn role(&self) -> Option<&ElevatedRole> {
        self.roles.first()
    }
}

/// Build actions accumulated in catalog order, plus the role once some unit
/// needs it.
#[derive(Default)]
struct BuildPlan {
    actions: Vec<BuildAction>,
    role: Option<ElevatedRole>,
}

impl BuildPlan {
    fn with_unit(
        mut self,
        unit: &DeployableUnit,
        catalog: &Catalog,
        config: &PipelineConfig,
    ) -> Result<Self, GeneratorError> {
        match &unit.kind {
            UnitKind::Generic => {
                let has_aggregate = self
                    .actions
                    .iter()
                    .any(|action| action.scope() == BuildScope::Aggregate);
                if !has_aggregate
                    && let Some(spec) = buildspec::compile_aggregate(catalog, &config.build)
                {
                    let units = catalog
                        .generic_units()
                        .iter()
                        .map(|unit| unit.name.clone())
                        .collect();
                    self.actions.push(BuildAction::aggregate(
                        spec,
                        units,
                        ArtifactId::source(),
                        config.environment.clone(),
                    ));
                }
            }
            UnitKind::AssetPublishing { .. } => {
                let spec = buildspec::compile_dedicated(unit, &config.build)?;
                let role = self
                    .role
                    .get_or_insert_with(|| role::provision(&config.elevated_role));
                let action = BuildAction::dedicated(
                    unit,
                    spec,
                    ArtifactId::source(),
                    config.environment.clone(),
                    role,
                );
                self.actions.push(action);
            }
        }
        Ok(self)
    }
}

/// Arranges the catalog into Source, Build and Deploy stages.
///
/// Build actions appear in order of first use by the catalog and deploy
/// actions follow catalog order exactly, so the same catalog always yields
/// the same definition.
#[instrument(skip_all, fields(pipeline = config.name.as_str(), units = catalog.len()))]
pub fn assemble(
    catalog: &Catalog,
    config: &PipelineConfig,
) -> Result<PipelineDefinition, GeneratorError> {
    let source = SourceAction::new(config);

    let plan = catalog
        .units()
        .iter()
        .try_fold(BuildPlan::default(), |plan, unit| {
            plan.with_unit(unit, catalog, config)
        })?;

    let wiring = wiring::resolve(catalog, &plan.actions)?;
    let deploy_actions = catalog
        .units()
        .iter()
        .zip(wiring.into_templates())
        .map(|(unit, template)| {
            debug!(
                unit = unit.name.as_str(),
                artifact = template.artifact.as_str(),
                file = template.file.as_str(),
                "Wired deploy action"
            );
            Action::Deploy(DeployAction::new(unit, template))
        })
        .collect();

    let definition = PipelineDefinition {
        name: config.name.clone(),
        stages: vec![
            Stage {
                name: StageName::Source,
                actions: vec![Action::Source(source)],
            },
            Stage {
                name: StageName::Build,
                actions: plan.actions.into_iter().map(Action::Build).collect(),
            },
            Stage {
                name: StageName::Deploy,
                actions: deploy_actions,
            },
        ],
        roles: plan.role.into_iter().collect(),
    };

    wiring::verify(&definition)?;
    Ok(definition)
}

/// Admits `units` into a catalog and assembles the pipeline.
pub fn generate(
    units: Vec<DeployableUnit>,
    config: &PipelineConfig,
) -> Result<PipelineDefinition, GeneratorError> {
    let catalog = Catalog::new(units)?;
    generate_catalog(&catalog, config)
}

/// Generates from a loaded catalog file, honouring its version and the
/// pipeline's own stack setting.
pub fn generate_from_file(file: &CatalogFile) -> Result<PipelineDefinition, GeneratorError> {
    let catalog = file.to_catalog()?;
    generate_catalog(&catalog, &file.pipeline)
}

fn generate_catalog(
    catalog: &Catalog,
    config: &PipelineConfig,
) -> Result<PipelineDefinition, GeneratorError> {
    let definition = assemble(catalog, config)?;
    info!(
        pipeline = definition.name.as_str(),
        build_actions = definition.build_actions().count(),
        deploy_actions = definition.deploy_actions().count(),
        "Pipeline definition generated"
    );
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_action_is_placed_at_first_generic_unit() {
        let definition = generate(
            vec![
                DeployableUnit::generic("Network"),
                DeployableUnit::asset_publishing("Fn", "fn"),
                DeployableUnit::generic("Infra"),
            ],
            &PipelineConfig::default(),
        )
        .unwrap();

        let names: Vec<_> = definition.build_actions().map(|a| a.name()).collect();
        assert_eq!(names, [AGGREGATE_ACTION, "Build_Fn"]);
        let aggregate = definition.build_action(AGGREGATE_ACTION).unwrap();
        assert_eq!(aggregate.units(), ["Network", "Infra"]);
    }

    #[test]
    fn source_action_polls_configured_branch() {
        let mut config = PipelineConfig::default();
        config.source.branch = "main".into();
        config.stack_name = Some("CodePipelineStack".into());

        let definition = generate(vec![DeployableUnit::generic("Infra")], &config).unwrap();
        let source = definition.source_actions().next().unwrap();
        assert_eq!(source.name, "Source_CodePipelineStack");
        assert_eq!(source.branch, "main");
        assert_eq!(source.trigger, SourceTrigger::Poll);
    }

    #[test]
    fn source_action_name_can_be_configured() {
        let yaml = "name: Demo\nsource:\n  repository: Repo\n  branch: main\n  action_name: Checkout\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();

        let definition = generate(vec![DeployableUnit::generic("Infra")], &config).unwrap();
        let source = definition.source_actions().next().unwrap();
        assert_eq!(source.name, "Checkout");
        assert_eq!(source.repository, "Repo");
    }

    #[test]
    fn dedicated_project_names_stay_clear_of_aggregate_project() {
        let definition = generate(
            vec![
                DeployableUnit::asset_publishing("CDK", "cdk-code"),
                DeployableUnit::generic("Infra"),
            ],
            &PipelineConfig::default(),
        )
        .unwrap();

        let projects: Vec<_> = definition
            .build_actions()
            .map(|action| action.project().name())
            .collect();
        assert_eq!(projects, ["Build_CDK_Project", AGGREGATE_PROJECT]);
    }

    #[test]
    fn role_is_not_provisioned_for_generic_only_catalogs() {
        let definition =
            generate(vec![DeployableUnit::generic("Infra")], &PipelineConfig::default()).unwrap();
        assert!(definition.role().is_none());
    }

    #[test]
    fn serialized_actions_carry_type_tag() {
        let definition =
            generate(vec![DeployableUnit::generic("Infra")], &PipelineConfig::default()).unwrap();
        let value = serde_json::to_value(&definition).unwrap();
        assert_eq!(value["stages"][0]["actions"][0]["type"], "Source");
        assert_eq!(value["stages"][2]["actions"][0]["type"], "Deploy");
        assert_eq!(
            value["stages"][2]["actions"][0]["template"]["file"],
            "Infra.template.json"
        );
        assert!(value.get("roles").is_none());
    }
}
