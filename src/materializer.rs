use serde_json::json;

use crate::{
    controller::{ApiRequest, Collection, ControllerApi, ResourceId},
    error::{ReconcileError, materialization_failed, protocol_error, remote_status},
};

/// Creates detached children that have no name to look them up by.
pub struct SubResourceMaterializer<'a> {
    api: &'a dyn ControllerApi,
}

impl<'a> SubResourceMaterializer<'a> {
    pub fn new(api: &'a dyn ControllerApi) -> Self {
        Self { api }
    }

    /// Always a CREATE. The blob is orphaned if the parent write later fails.
    pub async fn materialize_extra_vars(&self, text: &str) -> Result<ResourceId, ReconcileError> {
        let collection = Collection::ExtraVars;
        let request = ApiRequest::post(collection.list_path(), json!({ "extra_var": text }));
        let action = format!("creating {collection}");

        let response = self
            .api
            .send(request)
            .await
            .map_err(materialization_failed)?;
        if !response.is_success() {
            return Err(materialization_failed(remote_status(
                &action,
                response.status,
                &response.raw,
            )));
        }

        let id = response.id().ok_or_else(|| {
            materialization_failed(protocol_error(format!(
                "{action}: response carries no id: {}",
                response.raw
            )))
        })?;
        tracing::debug!(target: "materializer", id, "extra_vars_created");
        Ok(id)
    }
}
