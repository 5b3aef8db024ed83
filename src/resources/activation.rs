use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use super::{DesiredResource, ResourceKind, not_blank};
use crate::{controller::Collection, resolver::Reference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    #[default]
    Always,
    OnFailure,
    Never,
}

impl RestartPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::Always => "always",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::Never => "never",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ActivationSpec {
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[validate(custom(function = "not_blank"))]
    pub project_name: String,
    #[validate(custom(function = "not_blank"))]
    pub rulebook: String,
    #[validate(custom(function = "not_blank"))]
    pub decision_env: String,
    /// Name of one of the caller's own controller tokens.
    #[validate(custom(function = "not_blank"))]
    pub controller_token: String,
    #[serde(default)]
    pub extra_vars: Option<String>,
    /// Left unset, CREATE sends `always` and UPDATE keeps the remote value.
    #[serde(default)]
    pub restart_policy: Option<RestartPolicy>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl ActivationSpec {
    pub fn new(
        name: impl Into<String>,
        project_name: impl Into<String>,
        rulebook: impl Into<String>,
        decision_env: impl Into<String>,
        controller_token: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            project_name: project_name.into(),
            rulebook: rulebook.into(),
            decision_env: decision_env.into(),
            controller_token: controller_token.into(),
            extra_vars: None,
            restart_policy: None,
            enabled: None,
        }
    }

    pub fn with_restart_policy(mut self, restart_policy: RestartPolicy) -> Self {
        self.restart_policy = Some(restart_policy);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_extra_vars(mut self, extra_vars: impl Into<String>) -> Self {
        self.extra_vars = Some(extra_vars.into());
        self
    }
}

impl DesiredResource for ActivationSpec {
    const KIND: ResourceKind = ResourceKind::Activation;

    fn name(&self) -> &str {
        &self.name
    }

    fn scalar_fields(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(restart_policy) = self.restart_policy {
            body.insert(
                "restart_policy".to_string(),
                Value::String(restart_policy.as_str().to_string()),
            );
        }
        if let Some(enabled) = self.enabled {
            body.insert("is_enabled".to_string(), Value::Bool(enabled));
        }
        body
    }

    fn create_defaults(&self) -> Map<String, Value> {
        let mut defaults = Map::new();
        defaults.insert(
            "restart_policy".to_string(),
            Value::String(RestartPolicy::default().as_str().to_string()),
        );
        defaults.insert("is_enabled".to_string(), Value::Bool(true));
        defaults
    }

    fn references(&self) -> Vec<Reference> {
        vec![
            Reference::required(
                "project_name",
                "project_id",
                Collection::Projects,
                self.project_name.clone(),
            ),
            Reference::required(
                "decision_env",
                "decision_environment_id",
                Collection::DecisionEnvironments,
                self.decision_env.clone(),
            ),
            Reference::required(
                "controller_token",
                "awx_token_id",
                Collection::AwxTokens,
                self.controller_token.clone(),
            ),
            Reference::required(
                "rulebook",
                "rulebook_id",
                Collection::Rulebooks,
                self.rulebook.clone(),
            )
            .scoped_by("project_id", "project_name"),
        ]
    }

    fn extra_vars(&self) -> Option<&str> {
        self.extra_vars
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}
