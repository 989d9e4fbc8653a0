use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    workspace: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let workspace = base.join("my-app");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        for dir in [&home, &workspace, &xdg_data, &xdg_config, &xdg_state] {
            fs::create_dir_all(dir).expect("failed to create test directory");
        }

        Self {
            _temp_dir: temp_dir,
            home,
            workspace,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("copilot/store.db")
    }
}

/// Run the host with `input` on stdin and collect every pushed message.
fn run_host(env: &CliTestEnv, args: &[&str], input: &str) -> (Output, Vec<Value>) {
    let mut child = Command::new(assert_cmd::cargo::cargo_bin!("copilot-host"))
        .args(args)
        .arg("--workspace")
        .arg(&env.workspace)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("failed to execute copilot-host: {e}"));

    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(input.as_bytes())
        .expect("failed to write stdin");

    let output = child.wait_with_output().expect("failed to wait for copilot-host");
    assert!(
        output.status.success(),
        "copilot-host failed\nstatus: {}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );

    let messages = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| {
            serde_json::from_str(line).unwrap_or_else(|e| panic!("stdout line is not JSON ({e}): {line}"))
        })
        .collect();
    (output, messages)
}

fn find<'a>(messages: &'a [Value], kind: &str) -> &'a Value {
    messages
        .iter()
        .find(|m| m["type"] == kind)
        .unwrap_or_else(|| panic!("no {kind} message in {messages:?}"))
}

#[test]
fn answers_config_and_session_list_over_stdio() {
    let env = CliTestEnv::new();

    let (_, messages) = run_host(
        &env,
        &["--editor", "Cursor"],
        "{\"type\":\"getConfig\"}\n\n{\"type\":\"v2GetSessionList\"}\n{\"type\":\"detectEditor\"}\n",
    );

    let config = find(&messages, "config");
    assert_eq!(config["data"]["editor"], "Cursor");
    assert_eq!(config["data"]["autoAnalyze"], false);

    let list = find(&messages, "v2SessionList");
    assert!(list["data"].is_object());

    let editor = find(&messages, "editorDetected");
    assert_eq!(editor["data"]["platform"], "cursor");

    assert!(env.db_path().exists(), "store should exist at {}", env.db_path().display());
}

#[test]
fn settings_survive_a_restart() {
    let env = CliTestEnv::new();

    let (_, messages) = run_host(
        &env,
        &[],
        "{\"type\":\"setSidebarWidth\",\"data\":{\"width\":333}}\n",
    );
    assert_eq!(find(&messages, "config")["data"]["sidebarWidth"], 333);

    let (_, messages) = run_host(&env, &[], "{\"type\":\"getConfig\"}\n");
    assert_eq!(find(&messages, "config")["data"]["sidebarWidth"], 333);
}

#[test]
fn garbage_input_is_ignored() {
    let env = CliTestEnv::new();

    let (_, messages) = run_host(&env, &[], "not json\n{\"type\":\"launchRockets\"}\n");
    assert!(messages.is_empty(), "expected no pushes, got {messages:?}");
}
