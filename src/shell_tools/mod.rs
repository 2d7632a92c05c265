use std::process::{Command, Stdio};

struct RunDetails {
    stdout: String,
    stderr: String,
    exit_code: i32,
}

pub struct RunResult {
    result: Option<RunDetails>,
    command: String,
    shell: String,
}

impl RunResult {
    /// Returns true if the command could not be started at all
    pub fn not_found(&self) -> bool {
        self.result.is_none()
    }

    /// Returns true if the command returned a non-zero exit code
    pub fn non_zero_exit(&self) -> bool {
        self.result.as_ref().map(|r| r.exit_code != 0).unwrap_or(false)
    }

    pub fn stdout(&self) -> &str {
        self.result.as_ref().map(|r| r.stdout.as_str()).unwrap_or("")
    }

    #[allow(dead_code)]
    pub fn stderr(&self) -> &str {
        self.result.as_ref().map(|r| r.stderr.as_str()).unwrap_or("")
    }

    #[allow(dead_code)]
    pub fn exit_code(&self) -> Option<i32> {
        self.result.as_ref().map(|r| r.exit_code)
    }

    /// Human readable reason for a failed run, mostly for error messages
    pub fn describe_failure(&self) -> String {
        match &self.result {
            None => format!("could not run command '{}' with shell {}", self.command, self.shell),
            Some(r) => format!("command '{}' returned non-zero code ({}): {}", self.command, r.exit_code, r.stderr.trim()),
        }
    }
}

pub fn check_command_exist(command: &str) -> bool {
    if command.is_empty() || command.contains(' ') {
        return false;
    }
    Command::new(command)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

pub fn run_command(command: &str, shell: &str) -> RunResult {
    let output = Command::new(shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

    let result = match output {
        Ok(o) => Some(RunDetails {
            stdout: String::from_utf8_lossy(&o.stdout).to_string(),
            stderr: String::from_utf8_lossy(&o.stderr).to_string(),
            // killed by a signal
            exit_code: o.status.code().unwrap_or(-1),
        }),
        Err(_) => None,
    };
    RunResult {
        result,
        command: String::from(command),
        shell: String::from(shell),
    }
}
