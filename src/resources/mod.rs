use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use crate::{
    batch::FailurePolicy,
    controller::Collection,
    error::{ReconcileError, invalid_item},
    resolver::Reference,
};

pub mod activation;
pub mod credential;
pub mod decision_environment;
pub mod project;

pub use activation::{ActivationSpec, RestartPolicy};
pub use credential::{CredentialSpec, CredentialType};
pub use decision_environment::DecisionEnvironmentSpec;
pub use project::ProjectSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[serde(alias = "projects")]
    Project,
    #[serde(alias = "decision_environments")]
    DecisionEnvironment,
    #[serde(alias = "credentials")]
    Credential,
    #[serde(alias = "activations")]
    Activation,
}

impl ResourceKind {
    pub fn collection(&self) -> Collection {
        match self {
            ResourceKind::Project => Collection::Projects,
            ResourceKind::DecisionEnvironment => Collection::DecisionEnvironments,
            ResourceKind::Credential => Collection::Credentials,
            ResourceKind::Activation => Collection::Activations,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::DecisionEnvironment => "decision environment",
            ResourceKind::Credential => "credential",
            ResourceKind::Activation => "activation",
        }
    }

    /// Key under which successful records are listed in the process report.
    pub fn report_key(&self) -> &'static str {
        match self {
            ResourceKind::Project => "projects",
            ResourceKind::DecisionEnvironment => "decision_environments",
            ResourceKind::Credential => "credentials",
            ResourceKind::Activation => "activations",
        }
    }

    pub fn default_failure_policy(&self) -> FailurePolicy {
        match self {
            ResourceKind::Project
            | ResourceKind::DecisionEnvironment
            | ResourceKind::Credential
            | ResourceKind::Activation => FailurePolicy::FailFast,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A user-declared target state for one remote resource.
///
/// Each kind supplies its scalar body fields and the named references it needs
/// resolved; the generic pipeline in [`crate::batch`] does the rest.
pub trait DesiredResource: Validate + Send + Sync {
    const KIND: ResourceKind;

    fn name(&self) -> &str;

    /// Scalar fields of the write body. Fields without a desired value are left out.
    fn scalar_fields(&self) -> Map<String, Value>;

    /// Sent on CREATE only, under any key `scalar_fields` leaves out. UPDATE keeps
    /// whatever the remote record already holds for those keys.
    fn create_defaults(&self) -> Map<String, Value> {
        Map::new()
    }

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    fn extra_vars(&self) -> Option<&str> {
        None
    }

    fn check(&self) -> Result<(), ReconcileError> {
        self.validate()
            .map_err(|errors| invalid_item(errors.to_string().replace('\n', "; ")))
    }
}

pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

pub(crate) fn insert_optional(body: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        body.insert(key.to_string(), Value::String(value.to_string()));
    }
}
