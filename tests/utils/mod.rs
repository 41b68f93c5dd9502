use anyhow::Result;
use std::process::Command;

use super::common::TestEnvironment;

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

pub fn run_dshuffle_command(env: &TestEnvironment, args: &[&str]) -> Result<CommandOutput> {
    let config = env.config_file();
    let output = Command::new(env!("CARGO_BIN_EXE_dshuffle"))
        .arg("--config")
        .arg(&config)
        .arg("--no-color")
        .args(args)
        .env("HOME", env.fake_home())
        .env("XDG_CONFIG_HOME", env.fake_home().join(".config"))
        .env("XDG_DATA_HOME", env.fake_home().join(".local/share"))
        .current_dir(env.path())
        .output()?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Parse every stdout line as one JSON event.
pub fn json_events(output: &CommandOutput) -> Result<Vec<serde_json::Value>> {
    output
        .stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}
