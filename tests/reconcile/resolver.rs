use serde_json::{Map, Value, json};

use eda_reconcile::{
    controller::Collection,
    error::ReconcileErrorKind,
    resolver::{DependencyResolver, Reference},
    resources::{ActivationSpec, DesiredResource, ProjectSpec},
};

use crate::support::{FakeController, seed_activation_dependencies};

#[tokio::test]
async fn given_all_activation_references_exist_when_resolve_then_every_body_key_is_filled() {
    let controller = FakeController::new();
    let project_id = seed_activation_dependencies(&controller);
    let resolver = DependencyResolver::new(&controller);
    let spec = ActivationSpec::new("a1", "rules", "hello.yml", "de-default", "aap-token");

    let resolved = resolver
        .resolve(&spec.references())
        .await
        .expect("references should resolve");
    assert_eq!(resolved.len(), 4);
    assert_eq!(resolved.get("project_name"), Some(project_id));

    let mut body = Map::new();
    resolved.apply_to(&mut body);
    for key in [
        "project_id",
        "decision_environment_id",
        "awx_token_id",
        "rulebook_id",
    ] {
        assert!(body.contains_key(key), "missing {key} in {body:?}");
    }
}

#[tokio::test]
async fn given_missing_required_reference_when_resolve_then_not_found_names_the_field() {
    let controller = FakeController::new();
    controller.seed(Collection::Projects, json!({"name": "rules"}));
    let resolver = DependencyResolver::new(&controller);
    let spec = ActivationSpec::new("a1", "rules", "hello.yml", "missing-de", "aap-token");

    let err = resolver
        .resolve(&spec.references())
        .await
        .expect_err("missing decision environment must fail");
    assert_eq!(err.kind, ReconcileErrorKind::NotFound);
    assert!(err.message.contains("decision_env"), "unexpected: {err}");
    assert!(err.message.contains("missing-de"), "unexpected: {err}");
}

#[tokio::test]
async fn given_rulebook_only_in_another_project_when_resolve_then_rulebook_is_not_found() {
    let controller = FakeController::new();
    seed_activation_dependencies(&controller);
    let other = controller.seed(Collection::Projects, json!({"name": "other"}));
    controller.seed(
        Collection::Rulebooks,
        json!({"name": "only-other.yml", "project_id": other}),
    );
    let resolver = DependencyResolver::new(&controller);
    let spec = ActivationSpec::new("a1", "rules", "only-other.yml", "de-default", "aap-token");

    let err = resolver
        .resolve(&spec.references())
        .await
        .expect_err("rulebook from another project must not resolve");
    assert!(err.is_not_found());
    assert!(err.message.contains("rulebook"), "unexpected: {err}");
    assert!(err.message.contains("project_id="), "unexpected: {err}");
}

#[tokio::test]
async fn given_optional_credential_absent_when_resolve_then_nothing_is_looked_up() {
    let controller = FakeController::new();
    let resolver = DependencyResolver::new(&controller);
    let spec = ProjectSpec::new("proj1");

    let resolved = resolver
        .resolve(&spec.references())
        .await
        .expect("absent optional reference is fine");
    assert!(resolved.is_empty());
    assert!(controller.requests().is_empty());
}

#[tokio::test]
async fn given_optional_credential_unknown_when_resolve_then_it_is_omitted() {
    let controller = FakeController::new();
    let resolver = DependencyResolver::new(&controller);
    let spec = ProjectSpec::new("proj1").with_credential("nobody");

    let resolved = resolver
        .resolve(&spec.references())
        .await
        .expect("unknown optional reference is not an error");
    let mut body = Map::new();
    resolved.apply_to(&mut body);
    assert_eq!(Value::Object(body), json!({}));
}

#[tokio::test]
async fn given_blank_required_name_when_resolve_then_invalid_item_without_lookup() {
    let controller = FakeController::new();
    let resolver = DependencyResolver::new(&controller);
    let references = vec![Reference::required(
        "project_name",
        "project_id",
        Collection::Projects,
        "  ",
    )];

    let err = resolver
        .resolve(&references)
        .await
        .expect_err("blank required name must fail");
    assert_eq!(err.kind, ReconcileErrorKind::InvalidItem);
    assert!(controller.requests().is_empty());
}
