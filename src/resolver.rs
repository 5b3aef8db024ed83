use serde_json::{Map, Value};

use crate::{
    controller::{Collection, ControllerApi, ResourceId},
    error::{ReconcileError, invalid_item, not_found},
    locator::{LookupScope, ResourceLocator},
};

/// Narrows a lookup by the id another reference of the same item resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeRule {
    pub param: &'static str,
    pub from_field: &'static str,
}

/// A named reference a desired item declares towards another collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Field name on the desired item, used in error messages.
    pub field: &'static str,
    /// Key the resolved id is written under in the request body.
    pub body_key: &'static str,
    pub collection: Collection,
    pub name: Option<String>,
    pub required: bool,
    pub scope: Option<ScopeRule>,
}

impl Reference {
    pub fn required(
        field: &'static str,
        body_key: &'static str,
        collection: Collection,
        name: impl Into<String>,
    ) -> Self {
        Self {
            field,
            body_key,
            collection,
            name: Some(name.into()),
            required: true,
            scope: None,
        }
    }

    pub fn optional(
        field: &'static str,
        body_key: &'static str,
        collection: Collection,
        name: Option<String>,
    ) -> Self {
        Self {
            field,
            body_key,
            collection,
            name,
            required: false,
            scope: None,
        }
    }

    pub fn scoped_by(mut self, param: &'static str, from_field: &'static str) -> Self {
        self.scope = Some(ScopeRule { param, from_field });
        self
    }

    fn declared_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub field: &'static str,
    pub body_key: &'static str,
    pub id: ResourceId,
}

/// Ids resolved for one desired item; never reused across items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedReferences {
    entries: Vec<ResolvedReference>,
}

impl ResolvedReferences {
    pub fn get(&self, field: &str) -> Option<ResourceId> {
        self.entries
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn apply_to(&self, body: &mut Map<String, Value>) {
        for entry in &self.entries {
            body.insert(entry.body_key.to_string(), Value::from(entry.id));
        }
    }

    fn push(&mut self, entry: ResolvedReference) {
        self.entries.push(entry);
    }
}

pub struct DependencyResolver<'a> {
    locator: ResourceLocator<'a>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(api: &'a dyn ControllerApi) -> Self {
        Self {
            locator: ResourceLocator::new(api),
        }
    }

    /// Resolves references in declaration order, so a scoped reference must be
    /// declared after the reference it is scoped by.
    pub async fn resolve(
        &self,
        references: &[Reference],
    ) -> Result<ResolvedReferences, ReconcileError> {
        let mut resolved = ResolvedReferences::default();

        for reference in references {
            let Some(name) = reference.declared_name() else {
                if reference.required {
                    return Err(invalid_item(format!("{} is required", reference.field)));
                }
                continue;
            };

            let scope = match reference.scope {
                Some(rule) => {
                    let scope_id = resolved.get(rule.from_field).ok_or_else(|| {
                        invalid_item(format!(
                            "{} is scoped by {}, which did not resolve",
                            reference.field, rule.from_field
                        ))
                    })?;
                    Some(LookupScope {
                        param: rule.param,
                        value: scope_id.to_string(),
                    })
                }
                None => None,
            };

            let found = self
                .locator
                .find_scoped(reference.collection, name, scope.as_ref())
                .await?;

            match found {
                Some(id) => {
                    tracing::debug!(
                        target: "resolver",
                        field = reference.field,
                        name = %name,
                        id,
                        "reference_resolved"
                    );
                    resolved.push(ResolvedReference {
                        field: reference.field,
                        body_key: reference.body_key,
                        id,
                    });
                }
                None if reference.required => {
                    let scope_note = scope
                        .map(|scope| format!(" with {}={}", scope.param, scope.value))
                        .unwrap_or_default();
                    return Err(not_found(format!(
                        "{} '{}' not found in {}{}",
                        reference.field, name, reference.collection, scope_note
                    )));
                }
                None => {
                    tracing::debug!(
                        target: "resolver",
                        field = reference.field,
                        name = %name,
                        "optional_reference_absent"
                    );
                }
            }
        }

        Ok(resolved)
    }
}
