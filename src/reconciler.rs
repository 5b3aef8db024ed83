use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    controller::{ApiMethod, ApiRequest, ApiResponse, ControllerApi, ResourceId},
    error::{ReconcileError, remote_status},
    locator::ResourceLocator,
    resolver::ResolvedReferences,
    resources::{DesiredResource, ResourceKind},
};

const ALREADY_EXISTS: &str = "already exists";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Updated,
    /// CREATE lost a race against a concurrent writer; the record exists either way.
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub outcome: Outcome,
    pub id: Option<ResourceId>,
    pub record: Value,
}

/// Probe, decide, assemble, execute and classify for a single desired item.
pub struct Reconciler<'a> {
    api: &'a dyn ControllerApi,
    locator: ResourceLocator<'a>,
}

impl<'a> Reconciler<'a> {
    pub fn new(api: &'a dyn ControllerApi) -> Self {
        Self {
            api,
            locator: ResourceLocator::new(api),
        }
    }

    pub async fn reconcile<R: DesiredResource>(
        &self,
        item: &R,
        resolved: &ResolvedReferences,
        extra_var_id: Option<ResourceId>,
    ) -> Result<Applied, ReconcileError> {
        let kind = R::KIND;
        let name = item.name();
        let collection = kind.collection();
        let existing = self.locator.find(collection, name).await?;

        let mut fields = item.scalar_fields();
        if existing.is_none() {
            for (key, value) in item.create_defaults() {
                fields.entry(key).or_insert(value);
            }
        }
        let body = assemble_body(fields, resolved, extra_var_id);
        let request = match existing {
            Some(id) => ApiRequest::patch(collection.detail_path(id), body.clone()),
            None => ApiRequest::post(collection.list_path(), body.clone()),
        };
        let method = request.method;
        let action = request.describe();

        tracing::debug!(
            target: "reconciler",
            kind = %kind,
            name = %name,
            existing_id = ?existing,
            method = method.as_str(),
            "write_decided"
        );

        let response = self.api.send(request).await?;

        if response.is_success() {
            let outcome = match method {
                ApiMethod::Patch => Outcome::Updated,
                _ => Outcome::Created,
            };
            let id = response.id().or(existing);
            tracing::info!(
                target: "reconciler",
                kind = %kind,
                name = %name,
                id = ?id,
                outcome = ?outcome,
                "write_applied"
            );
            return Ok(Applied {
                outcome,
                id,
                record: response.body,
            });
        }

        if method == ApiMethod::Post && is_duplicate_race(&response) {
            tracing::warn!(
                target: "reconciler",
                kind = %kind,
                name = %name,
                status = response.status,
                "create_lost_duplicate_race"
            );
            return Ok(self.recover_existing(kind, name, body).await);
        }

        Err(remote_status(&action, response.status, &response.raw))
    }

    /// Best-effort fetch of the record a concurrent writer created; falls back to the
    /// body that was attempted.
    async fn recover_existing(&self, kind: ResourceKind, name: &str, attempted: Value) -> Applied {
        let collection = kind.collection();
        let id = match self.locator.find(collection, name).await {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(target: "reconciler", kind = %kind, name = %name, error = %err, "race_reprobe_failed");
                None
            }
        };

        let fetched = match id {
            Some(id) => match self.api.send(ApiRequest::get(collection.detail_path(id))).await {
                Ok(response) if response.is_success() => Some(response.body),
                Ok(response) => {
                    tracing::warn!(target: "reconciler", kind = %kind, id, status = response.status, "race_fetch_failed");
                    None
                }
                Err(err) => {
                    tracing::warn!(target: "reconciler", kind = %kind, id, error = %err, "race_fetch_failed");
                    None
                }
            },
            None => None,
        };

        let record = fetched.unwrap_or_else(|| reconstruct(attempted, id));
        Applied {
            outcome: Outcome::AlreadyExists,
            id,
            record,
        }
    }
}

fn assemble_body(
    mut body: Map<String, Value>,
    resolved: &ResolvedReferences,
    extra_var_id: Option<ResourceId>,
) -> Value {
    resolved.apply_to(&mut body);
    if let Some(extra_var_id) = extra_var_id {
        body.insert("extra_var_id".to_string(), Value::from(extra_var_id));
    }
    Value::Object(body)
}

fn reconstruct(mut attempted: Value, id: Option<ResourceId>) -> Value {
    if let (Some(id), Value::Object(map)) = (id, &mut attempted) {
        map.insert("id".to_string(), Value::from(id));
    }
    attempted
}

/// A 400 whose `name` field (or, lacking one, the raw body) says the record already exists.
fn is_duplicate_race(response: &ApiResponse) -> bool {
    if response.status != 400 {
        return false;
    }
    match response.body.get("name") {
        Some(Value::String(text)) => text.contains(ALREADY_EXISTS),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|text| text.contains(ALREADY_EXISTS)),
        _ => response.raw.contains(ALREADY_EXISTS),
    }
}
