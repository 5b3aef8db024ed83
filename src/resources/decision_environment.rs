use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use super::{DesiredResource, ResourceKind, insert_optional, not_blank};
use crate::{controller::Collection, resolver::Reference};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DecisionEnvironmentSpec {
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Registry credential used to pull the image.
    #[serde(default)]
    pub credential: Option<String>,
}

impl DecisionEnvironmentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_url: None,
            description: None,
            credential: None,
        }
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

impl DesiredResource for DecisionEnvironmentSpec {
    const KIND: ResourceKind = ResourceKind::DecisionEnvironment;

    fn name(&self) -> &str {
        &self.name
    }

    fn scalar_fields(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("name".to_string(), Value::String(self.name.clone()));
        insert_optional(&mut body, "image_url", self.image_url.as_deref());
        insert_optional(&mut body, "description", self.description.as_deref());
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
