use anyhow::Context;
use uuid::Uuid;

use crate::config::{Config, Limits};
use crate::languages::CommandPlan;

use super::supervisor::{StageCommand, run_stage};
use super::{ClientError, ExecutionOutcome, ExecutionRequest, RunError, StageResult, Status, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Compile,
    Run,
}

/// Runs one submission from validation to classified outcome.
///
/// Client errors are raised before any workspace exists or any process is
/// launched. The workspace is removed on every path out of this function.
pub async fn execute(
    request: &ExecutionRequest,
    config: &Config,
) -> Result<ExecutionOutcome, RunError> {
    if request.code.is_empty() {
        return Err(ClientError::MissingCode.into());
    }

    let language = config.languages.resolve(&request.language).ok_or_else(|| {
        ClientError::UnsupportedLanguage {
            language: request.language.to_lowercase(),
            supported: config.languages.supported().join(", "),
        }
    })?;

    let class_name = match language.entry_point {
        Some(entry_point) => Some(entry_point.extract(&request.code).ok_or_else(|| {
            ClientError::EntryPointNotFound {
                language: language.name.clone(),
                what: entry_point.describe(),
            }
        })?),
        None => None,
    };

    let workspace = Workspace::create(&config.workspace_root())?;
    let id = Uuid::new_v4().to_string();
    let plan = language
        .plan(&id, class_name, workspace.path())
        .with_context(|| format!("Invalid command template for {}", language.name))?;
    workspace.write_source(&plan.source_file, &request.code)?;

    log::info!(
        "Executing {} submission {id} in {}",
        language.name,
        plan.working_dir.display()
    );
    let outcome = run_plan(&plan, request.stdin.as_deref(), &config.limits).await;
    log::info!(
        "Submission {id} finished: {:?}, exit code {}",
        outcome.status,
        outcome.exit_code
    );

    Ok(outcome)
}

/// Compile (when the plan has a compile command), then run.
pub async fn run_plan(plan: &CommandPlan, stdin: Option<&str>, limits: &Limits) -> ExecutionOutcome {
    if let Some(compile) = &plan.compile {
        let stage = run_stage(StageCommand {
            argv: compile,
            working_dir: &plan.working_dir,
            stdin: None,
            timeout: limits.compile_timeout.as_duration(),
        })
        .await;

        if stage.timed_out || stage.exit_code != 0 {
            log::debug!("Compile stage failed with exit code {}", stage.exit_code);
            return classify(Phase::Compile, stage, limits);
        }
    }

    let stage = run_stage(StageCommand {
        argv: &plan.run,
        working_dir: &plan.working_dir,
        stdin,
        timeout: limits.execution_timeout.as_duration(),
    })
    .await;
    classify(Phase::Run, stage, limits)
}

fn classify(phase: Phase, stage: StageResult, limits: &Limits) -> ExecutionOutcome {
    let status = if stage.timed_out {
        Status::TimeoutError
    } else if phase == Phase::Compile {
        Status::CompilationError
    } else if stage.exit_code != 0 {
        Status::RuntimeError
    } else {
        Status::Success
    };

    let streams = stage.capped(limits.max_output_size.as_usize());
    ExecutionOutcome {
        stdout: streams.stdout,
        stderr: streams.stderr,
        exit_code: stage.exit_code,
        status,
    }
}
