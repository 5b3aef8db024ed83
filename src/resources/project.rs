use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use super::{DesiredResource, ResourceKind, insert_optional, not_blank};
use crate::{controller::Collection, resolver::Reference};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProjectSpec {
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "url")]
    #[validate(url)]
    pub git_url: Option<String>,
    /// Name of a credential used to fetch the repository.
    #[serde(default)]
    pub credential: Option<String>,
}

impl ProjectSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            git_url: None,
            credential: None,
        }
    }

    pub fn with_git_url(mut self, git_url: impl Into<String>) -> Self {
        self.git_url = Some(git_url.into());
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }
}

impl DesiredResource for ProjectSpec {
    const KIND: ResourceKind = ResourceKind::Project;

    fn name(&self) -> &str {
        &self.name
    }

    fn scalar_fields(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("name".to_string(), Value::String(self.name.clone()));
        insert_optional(&mut body, "description", self.description.as_deref());
        insert_optional(&mut body, "url", self.git_url.as_deref());
        body
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::optional(
            "credential",
            "credential_id",
            Collection::Credentials,
            self.credential.clone(),
        )]
    }
}
