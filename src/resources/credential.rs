use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use super::{DesiredResource, ResourceKind, insert_optional, not_blank};
use crate::{
    config::Secret,
    error::{ReconcileError, invalid_item},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialType {
    #[serde(rename = "GitHub Personal Access Token")]
    GitHubPersonalAccessToken,
    #[serde(rename = "GitLab Personal Access Token")]
    GitLabPersonalAccessToken,
    #[serde(rename = "Container Registry", alias = "Container registry")]
    ContainerRegistry,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::GitHubPersonalAccessToken => "GitHub Personal Access Token",
            CredentialType::GitLabPersonalAccessToken => "GitLab Personal Access Token",
            CredentialType::ContainerRegistry => "Container Registry",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CredentialSpec {
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    pub secret: Secret,
    pub credential_type: CredentialType,
}

impl DesiredResource for CredentialSpec {
    const KIND: ResourceKind = ResourceKind::Credential;

    fn name(&self) -> &str {
        &self.name
    }

    fn scalar_fields(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("name".to_string(), Value::String(self.name.clone()));
        body.insert(
            "credential_type".to_string(),
            Value::String(self.credential_type.as_str().to_string()),
        );
        body.insert(
            "username".to_string(),
            Value::String(self.username.clone()),
        );
        body.insert(
            "secret".to_string(),
            Value::String(self.secret.expose().to_string()),
        );
        insert_optional(&mut body, "description", self.description.as_deref());
        body
    }

    fn check(&self) -> Result<(), ReconcileError> {
        self.validate()
            .map_err(|errors| invalid_item(errors.to_string().replace('\n', "; ")))?;
        if self.secret.is_empty() {
            return Err(invalid_item("secret: must not be blank"));
        }
        Ok(())
    }
}
