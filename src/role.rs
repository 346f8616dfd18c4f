use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::RoleSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Effect {
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

/// Broad execution identity for asset-publishing builds.
///
/// Asset publishing from inside a build cannot authenticate with the
/// default project role, so these builds run under a wildcard role instead.
/// It is attached only through `BuildAction::dedicated`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ElevatedRole {
    pub name: String,
    pub description: String,
    pub assumed_by: String,
    pub statements: Vec<PolicyStatement>,
}

impl ElevatedRole {
    pub fn reference(&self) -> RoleRef {
        RoleRef(self.name.clone())
    }

    pub fn is_wildcard(&self) -> bool {
        self.statements.iter().any(|statement| {
            statement.actions.iter().any(|a| a == "*")
                && statement.resources.iter().any(|r| r == "*")
        })
    }
}

/// Name-only handle to the elevated role, stored on the build projects that use it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RoleRef(String);

impl RoleRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn provision(settings: &RoleSettings) -> ElevatedRole {
    warn!(
        role = settings.name.as_str(),
        assumed_by = settings.assumed_by.as_str(),
        "Provisioning wildcard build role for asset publishing"
    );
    ElevatedRole {
        name: settings.name.clone(),
        description: settings.description.clone(),
        assumed_by: settings.assumed_by.clone(),
        statements: vec![PolicyStatement {
            effect: Effect::Allow,
            actions: vec!["*".to_string()],
            resources: vec!["*".to_string()],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioned_role_is_wildcard_and_scoped_to_build_service() {
        let role = provision(&RoleSettings::default());
        assert!(role.is_wildcard());
        assert_eq!(role.assumed_by, "codebuild.amazonaws.com");
        assert_eq!(role.reference().as_str(), "LambdaBuildRole");
    }
}
