#![allow(dead_code)]

use std::fs;
use std::path::Path;

use serde_json::json;
use tempfile::TempDir;

use coderun::config::{ByteSize, Config, Limits, MilliSecond, ServerConfig};
use coderun::languages::LanguageTable;

/// Languages that only need `sh`, so the tests run without real toolchains.
///
/// `fakec` "compiles" by syntax-checking the script and copying it to the
/// executable name; `fakejava` names its source after the public class.
pub fn test_languages() -> LanguageTable {
    serde_json::from_value(json!([
        {
            "name": "shell",
            "extension": ".sh",
            "run": ["sh", "{filename}"]
        },
        {
            "name": "fakec",
            "extension": ".sh",
            "compile": ["sh", "-c", "sh -n \"$0\" && cp \"$0\" \"$1\"", "{filename}", "{executable}"],
            "run": ["sh", "{executable}"]
        },
        {
            "name": "fakejava",
            "extension": ".sh",
            "source_file": "{classname}.sh",
            "entry_point": "public_class",
            "compile": ["sh", "-n", "{filename}"],
            "run": ["sh", "{classname}.sh"]
        }
    ]))
    .expect("test language table")
}

pub fn test_limits() -> Limits {
    Limits {
        execution_timeout: MilliSecond(1000),
        compile_timeout: MilliSecond(2000),
        max_output_size: ByteSize(1024),
    }
}

pub fn test_config(root: &Path, limits: Limits) -> Config {
    Config {
        server: ServerConfig::default(),
        limits,
        workspace_root: Some(root.to_path_buf()),
        languages: test_languages(),
    }
}

/// Workspace root that must be empty again once a request has finished
pub fn workspace_root() -> TempDir {
    tempfile::Builder::new()
        .prefix("coderun-test-")
        .tempdir()
        .expect("test workspace root")
}

pub fn leftover_entries(root: &Path) -> usize {
    fs::read_dir(root).map(|entries| entries.count()).unwrap_or(0)
}

/// True while `pid` exists and is not a zombie
pub fn process_alive(pid: i32) -> bool {
    let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    let state = stat
        .rsplit_once(')')
        .and_then(|(_, rest)| rest.trim_start().chars().next());
    !matches!(state, Some('Z') | Some('X') | None)
}
