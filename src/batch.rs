use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::{
    controller::{ControllerApi, ResourceId},
    error::{ReconcileError, invalid_item},
    materializer::SubResourceMaterializer,
    reconciler::{Applied, Outcome, Reconciler},
    resolver::DependencyResolver,
    resources::{DesiredResource, ResourceKind},
};

/// What a hard failure on one item does to the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failed item. Items already applied stay applied.
    FailFast,
    /// Attempt every item and record failures alongside successes.
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Created,
    Updated,
    AlreadyExists,
    Failed,
}

impl From<Outcome> for ItemOutcome {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Created => ItemOutcome::Created,
            Outcome::Updated => ItemOutcome::Updated,
            Outcome::AlreadyExists => ItemOutcome::AlreadyExists,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    pub index: usize,
    pub name: String,
    pub outcome: ItemOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReconcileError>,
}

impl ItemReport {
    fn from_result(index: usize, name: &str, result: Result<Applied, ReconcileError>) -> Self {
        match result {
            Ok(applied) => Self {
                index,
                name: name.to_string(),
                outcome: applied.outcome.into(),
                id: applied.id,
                record: Some(applied.record),
                error: None,
            },
            Err(err) => Self {
                index,
                name: name.to_string(),
                outcome: ItemOutcome::Failed,
                id: None,
                record: None,
                error: Some(err),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == ItemOutcome::Failed
    }
}

/// Per-item outcomes in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub kind: ResourceKind,
    pub policy: FailurePolicy,
    pub changed: bool,
    pub results: Vec<ItemReport>,
}

impl BatchReport {
    fn new(kind: ResourceKind, policy: FailurePolicy) -> Self {
        Self {
            kind,
            policy,
            changed: false,
            results: Vec::new(),
        }
    }

    fn push(&mut self, report: ItemReport) {
        if matches!(report.outcome, ItemOutcome::Created | ItemOutcome::Updated) {
            self.changed = true;
        }
        self.results.push(report);
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.results.iter().filter(|report| report.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Process-level document: `changed`, the successful records under the kind's
    /// report key, and the full per-item results.
    pub fn to_output(&self) -> Value {
        let records: Vec<Value> = self
            .results
            .iter()
            .filter_map(|report| report.record.clone())
            .collect();

        let mut output = Map::new();
        output.insert("changed".to_string(), Value::Bool(self.changed));
        output.insert(self.kind.report_key().to_string(), Value::Array(records));
        output.insert(
            "results".to_string(),
            serde_json::to_value(&self.results).unwrap_or_else(|_| json!([])),
        );
        Value::Object(output)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind} batch aborted at item {index}: {error}", kind = .report.kind)]
pub struct BatchError {
    /// Results up to and including the failing item.
    pub report: BatchReport,
    pub index: usize,
    pub error: ReconcileError,
}

/// Runs desired items through resolve, materialize and reconcile, one at a time.
///
/// Items are never processed concurrently: a later item may reference a resource
/// an earlier item in the same batch created.
pub struct BatchOrchestrator<'a> {
    resolver: DependencyResolver<'a>,
    materializer: SubResourceMaterializer<'a>,
    reconciler: Reconciler<'a>,
    policy: Option<FailurePolicy>,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(api: &'a dyn ControllerApi) -> Self {
        Self {
            resolver: DependencyResolver::new(api),
            materializer: SubResourceMaterializer::new(api),
            reconciler: Reconciler::new(api),
            policy: None,
        }
    }

    /// Overrides the per-kind default policy.
    pub fn with_policy(mut self, policy: Option<FailurePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy_for(&self, kind: ResourceKind) -> FailurePolicy {
        self.policy
            .unwrap_or_else(|| kind.default_failure_policy())
    }

    pub async fn run<R: DesiredResource>(&self, items: &[R]) -> Result<BatchReport, BatchError> {
        self.run_parsed(items.iter().map(Ok).collect()).await
    }

    /// Like [`run`](Self::run) for raw run-file items. An item that does not parse
    /// fails alone as `invalid_item`; the failure policy decides what happens next.
    pub async fn run_documents<R>(&self, documents: &[Value]) -> Result<BatchReport, BatchError>
    where
        R: DesiredResource + DeserializeOwned,
    {
        let parsed: Vec<Result<R, RejectedItem>> =
            documents.iter().map(parse_item::<R>).collect();
        self.run_parsed(
            parsed
                .iter()
                .map(|item| item.as_ref().map_err(Clone::clone))
                .collect(),
        )
        .await
    }

    #[tracing::instrument(name = "batch_run", target = "batch", skip(self, items), fields(items = items.len()))]
    async fn run_parsed<R: DesiredResource>(
        &self,
        items: Vec<Result<&R, RejectedItem>>,
    ) -> Result<BatchReport, BatchError> {
        let kind = R::KIND;
        let policy = self.policy_for(kind);
        let mut report = BatchReport::new(kind, policy);

        for (index, item) in items.into_iter().enumerate() {
            let (name, result) = match item {
                Ok(item) => (item.name().to_string(), self.apply_item(item).await),
                Err(rejected) => (rejected.name, Err(rejected.error)),
            };
            let failure = result.as_ref().err().cloned();
            report.push(ItemReport::from_result(index, &name, result));

            let Some(error) = failure else {
                continue;
            };
            tracing::warn!(
                target: "batch",
                kind = %kind,
                index,
                name = %name,
                error_kind = ?error.kind,
                error = %error,
                "item_failed"
            );
            if policy == FailurePolicy::FailFast {
                return Err(BatchError {
                    report,
                    index,
                    error,
                });
            }
        }

        tracing::info!(
            target: "batch",
            kind = %kind,
            policy = ?policy,
            changed = report.changed,
            failures = report.failures().count(),
            "batch_completed"
        );
        Ok(report)
    }

    /// Full pipeline for one item. Any error names the kind and the item.
    pub async fn apply_item<R: DesiredResource>(&self, item: &R) -> Result<Applied, ReconcileError> {
        let kind = R::KIND;
        self.apply_item_inner(item)
            .await
            .map_err(|err| err.for_item(kind.label(), item.name()))
    }

    async fn apply_item_inner<R: DesiredResource>(
        &self,
        item: &R,
    ) -> Result<Applied, ReconcileError> {
        item.check()?;

        let resolved = self.resolver.resolve(&item.references()).await?;

        let extra_var_id = match item.extra_vars() {
            Some(text) => Some(self.materializer.materialize_extra_vars(text).await?),
            None => None,
        };

        self.reconciler
            .reconcile(item, &resolved, extra_var_id)
            .await
    }
}

/// A run-file item that did not parse as its kind.
#[derive(Debug, Clone)]
struct RejectedItem {
    name: String,
    error: ReconcileError,
}

fn parse_item<R>(document: &Value) -> Result<R, RejectedItem>
where
    R: DesiredResource + DeserializeOwned,
{
    R::deserialize(document).map_err(|err| {
        let name = document
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let error = invalid_item(format!("malformed item: {err}")).for_item(R::KIND.label(), &name);
        RejectedItem { name, error }
    })
}
