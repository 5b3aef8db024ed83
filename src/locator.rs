use crate::{
    controller::{
        ApiRequest, Collection, ControllerApi, Page, ResourceId,
        types::{record_id, record_name},
    },
    error::{ReconcileError, protocol_error, remote_status},
};

/// Extra query parameter narrowing a lookup, e.g. `project_id` for rulebooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupScope {
    pub param: &'static str,
    pub value: String,
}

/// Exact-name lookups against one page of a remote collection.
pub struct ResourceLocator<'a> {
    api: &'a dyn ControllerApi,
}

impl<'a> ResourceLocator<'a> {
    pub fn new(api: &'a dyn ControllerApi) -> Self {
        Self { api }
    }

    pub async fn find(
        &self,
        collection: Collection,
        name: &str,
    ) -> Result<Option<ResourceId>, ReconcileError> {
        self.find_scoped(collection, name, None).await
    }

    /// Returns the id of the first record named exactly `name`, in the order the
    /// controller returned them. Only the first page is inspected.
    pub async fn find_scoped(
        &self,
        collection: Collection,
        name: &str,
        scope: Option<&LookupScope>,
    ) -> Result<Option<ResourceId>, ReconcileError> {
        let mut request = ApiRequest::get(collection.list_path());
        if collection.supports_name_filter() {
            request = request.with_query("name", name);
        }
        if let Some(scope) = scope {
            request = request.with_query(scope.param, scope.value.clone());
        }

        let action = format!("looking up {collection} '{name}'");
        let response = self.api.send(request).await?;
        if !response.is_success() {
            return Err(remote_status(&action, response.status, &response.raw));
        }

        let page: Page = serde_json::from_value(response.body)
            .map_err(|err| protocol_error(format!("{action}: unexpected listing shape: {err}")))?;

        let matches: Vec<_> = page
            .results
            .iter()
            .filter(|record| record_name(record) == Some(name))
            .collect();

        if matches.len() > 1 {
            tracing::warn!(
                target: "locator",
                collection = %collection,
                name = %name,
                matches = matches.len(),
                "duplicate_name_match"
            );
        }

        let Some(first) = matches.first() else {
            tracing::debug!(target: "locator", collection = %collection, name = %name, "lookup_miss");
            return Ok(None);
        };

        let id = record_id(first).ok_or_else(|| {
            protocol_error(format!("{action}: matching record carries no usable id"))
        })?;
        tracing::debug!(target: "locator", collection = %collection, name = %name, id, "lookup_hit");
        Ok(Some(id))
    }
}
