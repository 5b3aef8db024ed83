use serde_json::json;

use eda_reconcile::{
    batch::{BatchOrchestrator, FailurePolicy, ItemOutcome},
    config::Secret,
    controller::{ApiMethod, ApiResponse, Collection},
    error::ReconcileErrorKind,
    resources::{ActivationSpec, CredentialSpec, CredentialType, ProjectSpec},
};

use crate::support::{FakeController, seed_activation_dependencies};

fn activation(name: &str) -> ActivationSpec {
    ActivationSpec::new(name, "rules", "hello.yml", "de-default", "aap-token")
}

#[tokio::test]
async fn given_activation_with_unknown_decision_env_when_run_then_no_write_is_issued() {
    let controller = FakeController::new();
    seed_activation_dependencies(&controller);
    let orchestrator = BatchOrchestrator::new(&controller);
    let spec = ActivationSpec::new("a1", "rules", "hello.yml", "nope", "aap-token")
        .with_extra_vars("foo: bar");

    let err = orchestrator
        .run(&[spec])
        .await
        .expect_err("fail-fast is the activation default");
    assert_eq!(err.index, 0);
    assert_eq!(err.error.kind, ReconcileErrorKind::NotFound);
    assert!(err.error.message.contains("decision_env"), "unexpected: {}", err.error);
    assert!(err.error.message.contains("activation 'a1'"), "unexpected: {}", err.error);
    assert!(controller.writes().is_empty());
    assert_eq!(err.report.results.len(), 1);
    assert_eq!(err.report.results[0].outcome, ItemOutcome::Failed);
}

#[tokio::test]
async fn given_extra_vars_when_run_then_one_blob_create_precedes_the_activation_write() {
    let controller = FakeController::new();
    seed_activation_dependencies(&controller);
    let orchestrator = BatchOrchestrator::new(&controller);

    let report = orchestrator
        .run(&[activation("a1").with_extra_vars("threshold: 3")])
        .await
        .expect("batch should succeed");
    assert_eq!(report.results[0].outcome, ItemOutcome::Created);

    let writes = controller.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].path, "extra-vars/");
    assert_eq!(writes[0].body, Some(json!({"extra_var": "threshold: 3"})));
    let blob_id = controller.records(Collection::ExtraVars)[0]["id"].clone();

    assert_eq!(writes[1].path, "activations/");
    let body = writes[1].body.clone().expect("activation body");
    assert_eq!(body["extra_var_id"], blob_id);
    assert_eq!(body["restart_policy"], json!("always"));
    assert_eq!(body["is_enabled"], json!(true));
}

#[tokio::test]
async fn given_no_extra_vars_when_run_then_no_blob_and_no_extra_var_id() {
    let controller = FakeController::new();
    seed_activation_dependencies(&controller);
    let orchestrator = BatchOrchestrator::new(&controller);

    orchestrator
        .run(&[activation("a1"), activation("a2").with_extra_vars("")])
        .await
        .expect("batch should succeed");

    let writes = controller.writes();
    assert_eq!(writes.len(), 2);
    for write in writes {
        assert_eq!(write.path, "activations/");
        let body = write.body.expect("activation body");
        assert!(body.get("extra_var_id").is_none(), "unexpected body {body}");
    }
}

#[tokio::test]
async fn given_extra_vars_rejected_when_run_then_activation_is_not_written() {
    let controller = FakeController::new();
    seed_activation_dependencies(&controller);
    controller.script(
        ApiMethod::Post,
        "extra-vars/",
        ApiResponse::json(400, json!({"extra_var": ["Invalid YAML."]})),
    );
    let orchestrator = BatchOrchestrator::new(&controller);

    let err = orchestrator
        .run(&[activation("a1").with_extra_vars(": : :")])
        .await
        .expect_err("materialization failure is fatal to the item");
    assert_eq!(err.error.kind, ReconcileErrorKind::Materialization);
    assert_eq!(err.error.status, Some(400));
    assert!(
        controller
            .writes()
            .iter()
            .all(|write| write.path != "activations/")
    );
}

#[tokio::test]
async fn given_fail_fast_when_middle_item_fails_then_later_items_are_not_attempted() {
    let controller = FakeController::new();
    controller.script(
        ApiMethod::Post,
        "projects/",
        ApiResponse::json(201, json!({"id": 1, "name": "p1"})),
    );
    controller.script(
        ApiMethod::Post,
        "projects/",
        ApiResponse::json(500, json!({"detail": "boom"})),
    );
    let orchestrator = BatchOrchestrator::new(&controller).with_policy(Some(FailurePolicy::FailFast));
    let items = [
        ProjectSpec::new("p1"),
        ProjectSpec::new("p2"),
        ProjectSpec::new("p3"),
    ];

    let err = orchestrator.run(&items).await.expect_err("p2 should abort");
    assert_eq!(err.index, 1);
    assert_eq!(err.report.results.len(), 2);
    assert_eq!(err.report.results[0].outcome, ItemOutcome::Created);
    assert!(err.report.changed);
    assert!(
        controller
            .requests()
            .iter()
            .all(|request| !request.query.iter().any(|(_, value)| value == "p3"))
    );
}

#[tokio::test]
async fn given_best_effort_when_middle_item_fails_then_results_keep_input_order() {
    let controller = FakeController::new();
    let orchestrator =
        BatchOrchestrator::new(&controller).with_policy(Some(FailurePolicy::BestEffort));
    let items = [
        ProjectSpec::new("p1"),
        ProjectSpec::new("p2").with_git_url("not a url"),
        ProjectSpec::new("p3"),
    ];

    let report = orchestrator.run(&items).await.expect("best effort never aborts");
    let names: Vec<_> = report.results.iter().map(|result| result.name.as_str()).collect();
    assert_eq!(names, ["p1", "p2", "p3"]);
    let indexes: Vec<_> = report.results.iter().map(|result| result.index).collect();
    assert_eq!(indexes, [0, 1, 2]);
    assert_eq!(report.results[1].outcome, ItemOutcome::Failed);
    assert_eq!(
        report.results[1].error.as_ref().map(|err| err.kind),
        Some(ReconcileErrorKind::InvalidItem)
    );
    assert_eq!(report.failures().count(), 1);
    assert!(report.changed);

    let output = report.to_output();
    assert_eq!(output["projects"].as_array().map(Vec::len), Some(2));
    assert_eq!(output["results"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn given_same_batch_twice_when_run_then_second_run_only_updates() {
    let controller = FakeController::new();
    seed_activation_dependencies(&controller);
    let orchestrator = BatchOrchestrator::new(&controller);
    let items = [activation("a1"), activation("a2")];

    let first = orchestrator.run(&items).await.expect("first run");
    assert!(
        first
            .results
            .iter()
            .all(|result| result.outcome == ItemOutcome::Created)
    );
    let state_after_first = controller.records(Collection::Activations);

    let second = orchestrator.run(&items).await.expect("second run");
    assert!(
        second
            .results
            .iter()
            .all(|result| result.outcome == ItemOutcome::Updated)
    );
    assert_eq!(controller.records(Collection::Activations), state_after_first);
}

#[tokio::test]
async fn given_credential_created_earlier_when_project_batch_runs_then_credential_id_is_sent() {
    let controller = FakeController::new();
    let orchestrator = BatchOrchestrator::new(&controller);
    let credential = CredentialSpec {
        name: "gh".to_string(),
        description: None,
        username: "bot".to_string(),
        secret: Secret::new("token"),
        credential_type: CredentialType::GitHubPersonalAccessToken,
    };

    let credentials = orchestrator.run(&[credential]).await.expect("credential batch");
    let credential_id = credentials.results[0].id.expect("credential id");

    orchestrator
        .run(&[ProjectSpec::new("proj1")
            .with_git_url("https://github.com/org/rules.git")
            .with_credential("gh")])
        .await
        .expect("project batch");

    let project_write = controller
        .writes()
        .into_iter()
        .find(|write| write.path == "projects/")
        .expect("project create");
    assert_eq!(
        project_write.body.expect("project body")["credential_id"],
        json!(credential_id)
    );
}

#[tokio::test]
async fn given_only_soft_successes_when_run_then_batch_is_unchanged() {
    let controller = FakeController::new();
    controller.script(
        ApiMethod::Post,
        "projects/",
        ApiResponse::json(400, json!({"name": ["project with this name already exists."]})),
    );
    let orchestrator = BatchOrchestrator::new(&controller);

    let report = orchestrator
        .run(&[ProjectSpec::new("proj1")])
        .await
        .expect("soft success is not a failure");
    assert_eq!(report.results[0].outcome, ItemOutcome::AlreadyExists);
    assert!(!report.changed);
    assert!(!report.has_failures());
}

#[tokio::test]
async fn given_malformed_item_between_good_ones_when_best_effort_then_only_it_fails() {
    let controller = FakeController::new();
    seed_activation_dependencies(&controller);
    let orchestrator =
        BatchOrchestrator::new(&controller).with_policy(Some(FailurePolicy::BestEffort));
    let documents = [
        json!({
            "name": "a1",
            "project_name": "rules",
            "rulebook": "hello.yml",
            "decision_env": "de-default",
            "controller_token": "aap-token"
        }),
        json!({
            "name": "a2",
            "project_name": "rules",
            "rulebook": "hello.yml",
            "decision_env": "de-default",
            "controller_token": "aap-token",
            "restart_policy": "sometimes"
        }),
        json!({
            "name": "a3",
            "project_name": "rules",
            "rulebook": "hello.yml",
            "decision_env": "de-default",
            "controller_token": "aap-token",
            "restart_policy": "never"
        }),
    ];

    let report = orchestrator
        .run_documents::<ActivationSpec>(&documents)
        .await
        .expect("best effort never aborts");
    let outcomes: Vec<_> = report.results.iter().map(|result| result.outcome).collect();
    assert_eq!(
        outcomes,
        [ItemOutcome::Created, ItemOutcome::Failed, ItemOutcome::Created]
    );
    let error = report.results[1].error.as_ref().expect("a2 error");
    assert_eq!(error.kind, ReconcileErrorKind::InvalidItem);
    assert!(error.message.starts_with("activation 'a2': "), "unexpected: {error}");
    assert!(error.message.contains("sometimes"), "unexpected: {error}");
    assert_eq!(report.results[1].name, "a2");

    let written: Vec<_> = controller
        .records(Collection::Activations)
        .into_iter()
        .map(|record| record["name"].clone())
        .collect();
    assert_eq!(written, [json!("a1"), json!("a3")]);
}

#[tokio::test]
async fn given_item_missing_required_field_when_fail_fast_then_batch_aborts_before_any_write() {
    let controller = FakeController::new();
    let orchestrator = BatchOrchestrator::new(&controller);
    let documents = [json!({"description": "no name"}), json!({"name": "p2"})];

    let err = orchestrator
        .run_documents::<ProjectSpec>(&documents)
        .await
        .expect_err("fail-fast is the project default");
    assert_eq!(err.index, 0);
    assert_eq!(err.error.kind, ReconcileErrorKind::InvalidItem);
    assert!(err.error.message.contains("name"), "unexpected: {}", err.error);
    assert_eq!(err.report.results.len(), 1);
    assert!(controller.requests().is_empty());
}
