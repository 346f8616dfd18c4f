use serde::{Deserialize, Serialize};

/// Naming and environment settings for one generation call.
///
/// Every field has a default so a catalog file may omit the whole
/// `pipeline:` block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    pub source: SourceSettings,
    pub elevated_role: RoleSettings,
    pub environment: BuildEnvironment,
    pub build: BuildSettings,
    /// The pipeline's own stack. When set it is deployed last as a generic unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_name: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "ProdCdkCodePipelineForLocalLambdaDevGuidance".to_string(),
            source: SourceSettings::default(),
            elevated_role: RoleSettings::default(),
            environment: BuildEnvironment::default(),
            build: BuildSettings::default(),
            stack_name: None,
        }
    }
}

impl PipelineConfig {
    /// Name used for the source action suffix: the pipeline stack when known,
    /// otherwise the pipeline itself.
    pub fn source_label(&self) -> &str {
        self.stack_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceSettings {
    pub repository: String,
    pub branch: String,
    /// Overrides the generated `Source_<label>` action name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            repository: "LambdaTest2".to_string(),
            branch: "dev".to_string(),
            action_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RoleSettings {
    pub name: String,
    pub description: String,
    pub assumed_by: String,
}

impl Default for RoleSettings {
    fn default() -> Self {
        Self {
            name: "LambdaBuildRole".to_string(),
            description: "Workaround for 'cdk-assets' authentication".to_string(),
            assumed_by: "codebuild.amazonaws.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildEnvironment {
    pub compute_type: String,
    pub build_image: String,
    pub privileged: bool,
}

impl Default for BuildEnvironment {
    fn default() -> Self {
        Self {
            compute_type: "BUILD_GENERAL1_SMALL".to_string(),
            build_image: "aws/codebuild/standard:5.0".to_string(),
            privileged: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildSettings {
    pub spec_version: String,
    /// Directory the synth step writes templates and asset manifests into.
    pub output_directory: String,
    /// Directory holding asset-publishing units' source folders.
    pub source_root: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            spec_version: "0.2".to_string(),
            output_directory: "cdk.out".to_string(),
            source_root: "lib".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: PipelineConfig = serde_yaml::from_str("source:\n  branch: main\n").unwrap();
        assert_eq!(config.source.branch, "main");
        assert_eq!(config.source.repository, "LambdaTest2");
        assert_eq!(config.elevated_role.name, "LambdaBuildRole");
        assert_eq!(config.build.output_directory, "cdk.out");
    }

    #[test]
    fn source_label_prefers_stack_name() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.source_label(), config.name);
        config.stack_name = Some("CodePipelineStack".into());
        assert_eq!(config.source_label(), "CodePipelineStack");
    }
}
