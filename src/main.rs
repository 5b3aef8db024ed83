use anyhow::{Context, Result};
use serde_json::Value;
use tracing::Instrument;

use eda_reconcile::{
    batch::{BatchError, BatchOrchestrator, BatchReport},
    cli::args_from_env,
    config::RunConfig,
    controller::http::HttpControllerClient,
    logging::init_tracing,
    resources::{
        ActivationSpec, CredentialSpec, DecisionEnvironmentSpec, ProjectSpec, ResourceKind,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = args_from_env()?;
    let config = RunConfig::load(&args.config_path)
        .with_context(|| format!("failed to load run file {}", args.config_path.display()))?;
    let logging = init_tracing(&config.logging)?;

    let password = config.controller.password()?;
    let client = HttpControllerClient::new(&config.controller, password)
        .context("failed to construct controller client")?;
    let orchestrator =
        BatchOrchestrator::new(&client).with_policy(args.policy.or(config.failure_policy));

    tracing::info!(
        target: "batch",
        run_id = logging.run_id(),
        log_file = %logging.log_file().display(),
        controller = %config.controller.url,
        items = config.resources.len(),
        "run_started"
    );

    let items = &config.resources.items;
    let outcome: Result<BatchReport, BatchError> = async {
        match config.resources.kind {
            ResourceKind::Project => orchestrator.run_documents::<ProjectSpec>(items).await,
            ResourceKind::DecisionEnvironment => {
                orchestrator
                    .run_documents::<DecisionEnvironmentSpec>(items)
                    .await
            }
            ResourceKind::Credential => orchestrator.run_documents::<CredentialSpec>(items).await,
            ResourceKind::Activation => orchestrator.run_documents::<ActivationSpec>(items).await,
        }
    }
    .instrument(logging.run_span())
    .await;

    match outcome {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report.to_output())?);
            Ok(())
        }
        Err(err) => {
            tracing::error!(target: "batch", index = err.index, error = %err, "run_aborted");
            let mut output = err.report.to_output();
            if let Value::Object(map) = &mut output {
                map.insert("failed".to_string(), Value::Bool(true));
                map.insert("msg".to_string(), Value::String(err.to_string()));
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
            drop(logging);
            std::process::exit(1);
        }
    }
}
