use std::io;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinError;
use tokio::time::timeout;

use super::{StageResult, TIMEOUT_EXIT_CODE};

/// How long the collector may keep draining pipes after the group was killed
const KILL_GRACE: Duration = Duration::from_secs(2);

/// One process to launch
#[derive(Debug, Clone, Copy)]
pub struct StageCommand<'a> {
    pub argv: &'a [String],
    pub working_dir: &'a Path,
    pub stdin: Option<&'a str>,
    pub timeout: Duration,
}

/// Runs one command as the leader of a fresh process group.
///
/// Never fails: launch problems, collection problems and timeouts are all
/// folded into the returned [`StageResult`]. On timeout the whole group is
/// sent SIGKILL, so helpers the program forked do not outlive the stage.
pub async fn run_stage(stage: StageCommand<'_>) -> StageResult {
    let Some((program, args)) = stage.argv.split_first() else {
        let err = io::Error::new(io::ErrorKind::InvalidInput, "empty command");
        return launch_failure("<empty>", &err);
    };
    let input = stage
        .stdin
        .filter(|s| !s.is_empty())
        .map(|s| s.as_bytes().to_vec());

    let mut std_cmd = std::process::Command::new(program);
    std_cmd
        .args(args)
        .current_dir(stage.working_dir)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);
    let mut cmd = Command::from(std_cmd);
    cmd.kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            log::warn!("Failed to launch {program}: {e}");
            return launch_failure(program, &e);
        }
    };

    // process_group(0) makes the leader's pid the group id
    let pgid = child.id();
    log::debug!("Launched {program} as process group {pgid:?}");

    let stdin_pipe = child.stdin.take();
    let mut collector = tokio::spawn(collect(child, stdin_pipe, input, pgid));

    match timeout(stage.timeout, &mut collector).await {
        Ok(joined) => finished(program, joined),
        Err(_) => {
            log::warn!(
                "{program} exceeded {}s, killing process group {pgid:?}",
                stage.timeout.as_secs_f64()
            );
            if let Some(pgid) = pgid {
                // The collector has not reaped the leader yet, so the id is still ours
                kill_process_group(pgid);
            }

            let output = match timeout(KILL_GRACE, &mut collector).await {
                Ok(Ok(Ok(output))) => Some(output),
                Ok(Ok(Err(e))) => {
                    log::warn!("Lost output of timed out {program}: {e}");
                    None
                }
                Ok(Err(e)) => {
                    log::error!("Collector of timed out {program} failed: {e}");
                    None
                }
                Err(_) => {
                    log::error!("Output pipes of {program} still open after kill, abandoning");
                    collector.abort();
                    None
                }
            };
            timed_out(output, stage.timeout)
        }
    }
}

/// Feeds stdin and gathers stdout/stderr until the process exits.
///
/// Once the leader has exited, but before it is reaped, the rest of its
/// group is killed. An unreaped leader keeps the group id reserved, so the
/// signal cannot reach a group that merely reuses the number.
async fn collect(
    mut child: Child,
    stdin: Option<ChildStdin>,
    input: Option<Vec<u8>>,
    pgid: Option<u32>,
) -> io::Result<Output> {
    let feed = async move {
        if let (Some(mut pipe), Some(input)) = (stdin, input) {
            pipe.write_all(&input).await?;
            pipe.shutdown().await?;
        }
        Ok::<(), io::Error>(())
    };
    let stdout = read_pipe(child.stdout.take());
    let stderr = read_pipe(child.stderr.take());
    let status = async {
        if let Some(pgid) = pgid {
            match wait_for_exit(pgid).await {
                // Stragglers may be holding the pipes open
                Ok(()) => kill_process_group(pgid),
                Err(e) => log::warn!("Could not observe exit of process group {pgid}: {e}"),
            }
        }
        child.wait().await
    };

    let (fed, status, stdout, stderr) = tokio::join!(feed, status, stdout, stderr);
    if let Err(e) = fed {
        // Usually a broken pipe: the program exited without reading everything
        log::debug!("stdin not fully delivered: {e}");
    }
    Ok(Output {
        status: status?,
        stdout: stdout?,
        stderr: stderr?,
    })
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Blocks until `pid` has exited, leaving it unreaped
async fn wait_for_exit(pid: u32) -> io::Result<()> {
    let id = libc::id_t::from(pid);
    tokio::task::spawn_blocking(move || {
        loop {
            // SAFETY: siginfo_t is plain data, zero is a valid bit pattern
            let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
            // SAFETY: WNOWAIT only observes the state change; `child.wait()` still reaps
            let rc = unsafe {
                libc::waitid(libc::P_PID, id, &mut info, libc::WEXITED | libc::WNOWAIT)
            };
            if rc == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    })
    .await
    .map_err(io::Error::other)?
}

fn finished(program: &str, joined: Result<io::Result<Output>, JoinError>) -> StageResult {
    match joined {
        Ok(Ok(output)) => StageResult {
            exit_code: exit_code(output.status),
            stdout: output.stdout,
            stderr: output.stderr,
            timed_out: false,
            notice: None,
        },
        Ok(Err(e)) => {
            log::error!("Failed to collect output of {program}: {e}");
            supervisor_failure(format!("Failed to collect output of {program}: {e}"))
        }
        Err(e) => {
            log::error!("Collector of {program} failed: {e}");
            supervisor_failure(format!("Failed to supervise {program}: {e}"))
        }
    }
}

fn timed_out(output: Option<Output>, limit: Duration) -> StageResult {
    let (stdout, stderr) = output
        .map(|o| (o.stdout, o.stderr))
        .unwrap_or_default();

    StageResult {
        exit_code: TIMEOUT_EXIT_CODE,
        stdout,
        stderr,
        timed_out: true,
        notice: Some(timeout_notice(limit)),
    }
}

fn timeout_notice(limit: Duration) -> String {
    format!("\nExecution timed out after {} seconds.", limit.as_secs_f64())
}

fn launch_failure(program: &str, err: &io::Error) -> StageResult {
    let exit_code = match err.kind() {
        io::ErrorKind::NotFound => 127,
        io::ErrorKind::PermissionDenied => 126,
        _ => 1,
    };
    StageResult {
        exit_code,
        stdout: Vec::new(),
        stderr: format!("Failed to launch {program}: {err}").into_bytes(),
        timed_out: false,
        notice: None,
    }
}

fn supervisor_failure(message: String) -> StageResult {
    StageResult {
        exit_code: 1,
        stdout: Vec::new(),
        stderr: message.into_bytes(),
        timed_out: false,
        notice: None,
    }
}

/// Real exit code, or the negated signal number if the process was killed
fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(1)
}

fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; pgid is the group created for this stage
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            log::warn!("Failed to kill process group {pgid}: {err}");
        }
    } else {
        log::debug!("Sent SIGKILL to process group {pgid}");
    }
}
