use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

use crate::batch::FailurePolicy;

const USAGE: &str = "usage: eda-reconcile [--config <path>] [--policy fail-fast|best-effort]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: PathBuf,
    /// Takes precedence over `failure_policy` in the run file.
    pub policy: Option<FailurePolicy>,
}

pub fn args_from_env() -> Result<CliArgs> {
    parse_args(env::args().skip(1))
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut policy = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --config"))?;
                config_path = Some(PathBuf::from(value));
            }
            "--policy" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --policy"))?;
                policy = Some(match value.as_str() {
                    "fail-fast" => FailurePolicy::FailFast,
                    "best-effort" => FailurePolicy::BestEffort,
                    other => return Err(anyhow!("unknown policy: {other}. {USAGE}")),
                });
            }
            other => return Err(anyhow!("unknown argument: {other}. {USAGE}")),
        }
    }

    Ok(CliArgs {
        config_path: config_path.unwrap_or_else(|| PathBuf::from("./eda.jsonc")),
        policy,
    })
}
