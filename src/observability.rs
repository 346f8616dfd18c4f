use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::pipeline::{BuildScope, PipelineDefinition};

/// Shape of a generated pipeline, for logs and metric exports.
#[derive(Debug, Default, Serialize, Clone, PartialEq, Eq)]
pub struct GenerationSummary {
    pub pipeline: String,
    pub stages: BTreeMap<String, usize>,
    pub aggregate_builds: usize,
    pub dedicated_builds: usize,
    pub artifacts: usize,
    pub role_attachments: usize,
}

impl GenerationSummary {
    pub fn from_definition(definition: &PipelineDefinition) -> Self {
        let mut summary = GenerationSummary {
            pipeline: definition.name.clone(),
            ..Default::default()
        };
        for stage in &definition.stages {
            summary
                .stages
                .insert(format!("{:?}", stage.name), stage.actions.len());
            summary.artifacts += stage
                .actions
                .iter()
                .filter(|action| action.output().is_some())
                .count();
        }
        for build in definition.build_actions() {
            match build.scope() {
                BuildScope::Aggregate => summary.aggregate_builds += 1,
                BuildScope::Dedicated => summary.dedicated_builds += 1,
            }
            if build.project().role().is_some() {
                summary.role_attachments += 1;
            }
        }
        summary
    }

    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();
        output.push_str("# HELP pipegen_stage_actions Actions per generated stage\n");
        output.push_str("# TYPE pipegen_stage_actions gauge\n");
        for (stage, count) in &self.stages {
            output.push_str(&format!(
                "pipegen_stage_actions{{pipeline=\"{}\",stage=\"{}\"}} {}\n",
                self.pipeline, stage, count
            ));
        }
        output.push_str("# HELP pipegen_build_actions Build actions by scope\n");
        output.push_str("# TYPE pipegen_build_actions gauge\n");
        output.push_str(&format!(
            "pipegen_build_actions{{pipeline=\"{}\",scope=\"aggregate\"}} {}\n",
            self.pipeline, self.aggregate_builds
        ));
        output.push_str(&format!(
            "pipegen_build_actions{{pipeline=\"{}\",scope=\"dedicated\"}} {}\n",
            self.pipeline, self.dedicated_builds
        ));
        output.push_str("# HELP pipegen_artifacts Artifacts produced by the pipeline\n");
        output.push_str("# TYPE pipegen_artifacts gauge\n");
        output.push_str(&format!(
            "pipegen_artifacts{{pipeline=\"{}\"}} {}\n",
            self.pipeline, self.artifacts
        ));
        output.push_str(
            "# HELP pipegen_elevated_role_attachments Build actions running under the elevated role\n",
        );
        output.push_str("# TYPE pipegen_elevated_role_attachments gauge\n");
        output.push_str(&format!(
            "pipegen_elevated_role_attachments{{pipeline=\"{}\"}} {}\n",
            self.pipeline, self.role_attachments
        ));
        output
    }
}

pub fn log_summary(summary: &GenerationSummary) {
    info!(
        pipeline = summary.pipeline.as_str(),
        artifacts = summary.artifacts,
        aggregate_builds = summary.aggregate_builds,
        dedicated_builds = summary.dedicated_builds,
        role_attachments = summary.role_attachments,
        "Pipeline summary"
    );
    for (stage, count) in &summary.stages {
        info!(stage = stage.as_str(), actions = count, "Stage summary");
    }
}
