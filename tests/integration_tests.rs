mod common;

use std::fs;
use std::process::Command;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use coderun::config::{ByteSize, Limits, MilliSecond};
use coderun::sandbox::{
    ExecutionRequest, RunError, Status, TIMEOUT_EXIT_CODE, TRUNCATION_MARKER, execute,
};

use common::{leftover_entries, process_alive, test_config, test_limits, workspace_root};

fn request(language: &str, code: &str) -> ExecutionRequest {
    ExecutionRequest {
        code: code.to_string(),
        language: language.to_string(),
        stdin: None,
    }
}

#[tokio::test]
async fn test_timeout_reclaims_whole_process_group() {
    let root = workspace_root();
    let scratch = tempfile::tempdir().unwrap();
    let pid_file = scratch.path().join("pid");
    let config = test_config(root.path(), test_limits());

    // A background helper in the same group plus a busy leader
    let code = format!(
        "sleep 300 &\necho $! > '{}'\nwhile :; do :; done\n",
        pid_file.display()
    );
    let start = Instant::now();
    let outcome = execute(&request("shell", &code), &config).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(outcome.status, Status::TimeoutError);
    assert_eq!(outcome.exit_code, TIMEOUT_EXIT_CODE);
    assert!(outcome.stderr.contains("Execution timed out after 1 seconds."));
    assert!(elapsed >= Duration::from_millis(1000));
    assert!(elapsed < Duration::from_secs(4), "took {elapsed:?}");

    let pid: i32 = fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while process_alive(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!process_alive(pid), "background process {pid} survived");
    assert_eq!(leftover_entries(root.path()), 0);
}

#[tokio::test]
async fn test_background_helper_reaped_after_normal_exit() {
    let root = workspace_root();
    let scratch = tempfile::tempdir().unwrap();
    let pid_file = scratch.path().join("pid");
    let config = test_config(root.path(), test_limits());

    let code = format!(
        "sleep 300 > /dev/null 2>&1 &\necho $! > '{}'\necho done\n",
        pid_file.display()
    );
    let outcome = execute(&request("shell", &code), &config).await.unwrap();
    assert_eq!(outcome.status, Status::Success);
    assert_eq!(outcome.stdout, "done\n");

    let pid: i32 = fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while process_alive(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!process_alive(pid), "background process {pid} survived");
}

#[tokio::test]
async fn test_truncation_while_still_running() {
    let root = workspace_root();
    let config = test_config(root.path(), test_limits());

    let code = "head -c 5000 /dev/zero | tr '\\0' b\nwhile :; do :; done\n";
    let outcome = execute(&request("shell", code), &config).await.unwrap();

    assert_eq!(outcome.status, Status::TimeoutError);
    assert_eq!(outcome.stdout, format!("{}{TRUNCATION_MARKER}", "b".repeat(1024)));
}

#[tokio::test]
async fn test_stderr_is_capped_independently() {
    let root = workspace_root();
    let limits = Limits {
        max_output_size: ByteSize(16),
        ..test_limits()
    };
    let config = test_config(root.path(), limits);

    let code = "echo short\nhead -c 100 /dev/zero | tr '\\0' e >&2\nexit 1\n";
    let outcome = execute(&request("shell", code), &config).await.unwrap();

    assert_eq!(outcome.status, Status::RuntimeError);
    assert_eq!(outcome.stdout, "short\n");
    assert_eq!(outcome.stderr, format!("{}{TRUNCATION_MARKER}", "e".repeat(16)));
}

#[tokio::test]
async fn test_timeout_notice_survives_stderr_flood() {
    let root = workspace_root();
    let config = test_config(root.path(), test_limits());

    let code = "head -c 5000 /dev/zero | tr '\\0' e >&2\nwhile :; do :; done\n";
    let outcome = execute(&request("shell", code), &config).await.unwrap();

    assert_eq!(outcome.status, Status::TimeoutError);
    assert_eq!(
        outcome.stderr,
        format!(
            "{}{TRUNCATION_MARKER}\nExecution timed out after 1 seconds.",
            "e".repeat(1024)
        )
    );
}

#[tokio::test]
async fn test_cap_keeps_multibyte_characters_whole() {
    let root = workspace_root();
    let limits = Limits {
        max_output_size: ByteSize(5),
        ..test_limits()
    };
    let config = test_config(root.path(), limits);

    // "aaaa" followed by two e-acute, the first straddling the 5-byte limit
    let code = "printf 'aaaa\\303\\251\\303\\251'\n";
    let outcome = execute(&request("shell", code), &config).await.unwrap();

    assert_eq!(outcome.status, Status::Success);
    assert_eq!(outcome.stdout, format!("aaaa{TRUNCATION_MARKER}"));
    assert!(outcome.stdout.len() - TRUNCATION_MARKER.len() <= 5);
}

#[tokio::test]
async fn test_compile_error_never_runs() {
    let root = workspace_root();
    let scratch = tempfile::tempdir().unwrap();
    let marker = scratch.path().join("ran");
    let config = test_config(root.path(), test_limits());

    // The first line would leave a marker if the script were ever executed
    let code = format!("touch '{}'\nif then fi\n", marker.display());
    let outcome = execute(&request("fakec", &code), &config).await.unwrap();

    let script = scratch.path().join("script.sh");
    fs::write(&script, &code).unwrap();
    let compiler_code = Command::new("sh")
        .arg("-n")
        .arg(&script)
        .status()
        .unwrap()
        .code()
        .unwrap();

    assert_eq!(outcome.status, Status::CompilationError);
    assert_ne!(outcome.exit_code, 0);
    assert_eq!(outcome.exit_code, compiler_code);
    assert!(!outcome.stderr.is_empty());
    assert!(!marker.exists());
    assert_eq!(leftover_entries(root.path()), 0);
}

#[tokio::test]
async fn test_compile_timeout_is_reported() {
    let root = workspace_root();
    let limits = Limits {
        compile_timeout: MilliSecond(300),
        ..test_limits()
    };
    let mut config = test_config(root.path(), limits);
    config.languages = serde_json::from_value(serde_json::json!([
        {
            "name": "slowc",
            "extension": ".sh",
            "compile": ["sleep", "30"],
            "run": ["sh", "{filename}"]
        }
    ]))
    .unwrap();

    let outcome = execute(&request("slowc", "echo hi"), &config).await.unwrap();
    assert_eq!(outcome.status, Status::TimeoutError);
    assert_eq!(outcome.exit_code, TIMEOUT_EXIT_CODE);
    assert!(outcome.stderr.ends_with("Execution timed out after 0.3 seconds."));
}

#[tokio::test]
async fn test_missing_compiler_is_compilation_error() {
    let root = workspace_root();
    let mut config = test_config(root.path(), test_limits());
    config.languages = serde_json::from_value(serde_json::json!([
        {
            "name": "ghostc",
            "extension": ".g",
            "compile": ["ghost-compiler-that-does-not-exist", "{filename}"],
            "run": ["./{executable}"]
        }
    ]))
    .unwrap();

    let outcome = execute(&request("ghostc", "main"), &config).await.unwrap();
    assert_eq!(outcome.status, Status::CompilationError);
    assert_eq!(outcome.exit_code, 127);
    assert!(
        outcome
            .stderr
            .starts_with("Failed to launch ghost-compiler-that-does-not-exist")
    );
}

#[tokio::test]
async fn test_concurrent_requests_do_not_interfere() {
    let root = workspace_root();
    let config = test_config(root.path(), test_limits());

    let first = request("fakec", "sleep 0.2\necho first\nls\n");
    let second = request("fakec", "echo second\nls\nsleep 0.2\n");
    let (a, b) = tokio::join!(execute(&first, &config), execute(&second, &config));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.status, Status::Success);
    assert_eq!(b.status, Status::Success);

    let files = |stdout: &str, greeting: &str| -> Vec<String> {
        let mut lines = stdout.lines();
        assert_eq!(lines.next(), Some(greeting));
        lines.map(str::to_string).collect()
    };
    let a_files = files(&a.stdout, "first");
    let b_files = files(&b.stdout, "second");

    // Each workspace holds exactly its own source and executable
    assert_eq!(a_files.len(), 2);
    assert_eq!(b_files.len(), 2);
    assert!(a_files.iter().all(|f| !b_files.contains(f)));
    assert_eq!(leftover_entries(root.path()), 0);
}

#[tokio::test]
async fn test_client_errors_launch_nothing() {
    let root = workspace_root();
    let config = test_config(root.path(), test_limits());

    let err = execute(&request("shell", ""), &config).await.unwrap_err();
    assert!(matches!(err, RunError::Client(_)));
    assert_eq!(err.to_string(), "No code provided");

    let err = execute(&request("brainfuck", "+"), &config).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unsupported language: brainfuck. Supported languages: shell, fakec, fakejava"
    );
    assert_eq!(leftover_entries(root.path()), 0);
}
