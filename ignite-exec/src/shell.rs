use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{CommandLine, ExecError, Executor, Target};

/// The options every `ssh`/`scp` call is made with.
///
/// Batch mode makes the transport fail instead of prompting. Credentials and
/// known host keys are taken from the invoking user's ssh setup, so an
/// unknown host key fails the call.
static DEFAULT_SSH_OPTIONS: &[&str] = &["-o", "BatchMode=yes", "-o", "LogLevel=ERROR"];

#[derive(Debug, Clone)]
/// Runs commands through `sh` locally and through `ssh` on remote nodes.
pub struct ShellExecutor {
    ssh_program: String,
    scp_program: String,
    ssh_options: Vec<String>,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
            ssh_options: DEFAULT_SSH_OPTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ShellExecutor {
    /// Overrides the programs used for the remote transport.
    pub fn with_transport(
        mut self,
        ssh_program: impl Into<String>,
        scp_program: impl Into<String>,
    ) -> Self {
        self.ssh_program = ssh_program.into();
        self.scp_program = scp_program.into();
        self
    }

    /// Appends an extra option passed to both `ssh` and `scp`.
    pub fn with_ssh_option(mut self, option: impl Into<String>) -> Self {
        self.ssh_options.push(option.into());
        self
    }

    fn local_command(&self, command: &CommandLine) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command.to_shell());
        cmd
    }

    fn remote_command(&self, hostname: &str, command: &CommandLine) -> Command {
        let mut cmd = Command::new(&self.ssh_program);
        cmd.args(&self.ssh_options)
            .arg(hostname)
            .arg(command.to_shell());
        cmd
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn execute(
        &self,
        target: &Target,
        command: &CommandLine,
    ) -> Result<(), ExecError> {
        let cmd = match target {
            Target::Local(_) => self.local_command(command),
            Target::Remote(node) => self.remote_command(&node.hostname, command),
        };
        run_to_completion(cmd).await
    }

    async fn copy(
        &self,
        target: &Target,
        source: &Path,
        destination: &Path,
    ) -> Result<(), ExecError> {
        match target {
            Target::Local(_) => {
                if source != destination {
                    tokio::fs::copy(source, destination).await?;
                }
                Ok(())
            },
            Target::Remote(node) => {
                let mut cmd = Command::new(&self.scp_program);
                cmd.args(&self.ssh_options).arg(source).arg(format!(
                    "{}:{}",
                    node.hostname,
                    destination.display()
                ));
                run_to_completion(cmd).await
            },
        }
    }
}

async fn run_to_completion(mut cmd: Command) -> Result<(), ExecError> {
    let program = format!("{:?}", cmd.as_std().get_program());
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|error| ExecError::Spawn { program, error })?;

    if output.status.success() {
        return Ok(());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let output_text = if stderr.is_empty() {
        stdout.into_owned()
    } else {
        format!("{stdout}\nSTDERR:\n{stderr}")
    };

    Err(ExecError::Failed {
        status: output.status.code(),
        output: output_text,
    })
}

#[cfg(test)]
mod tests {
    use ignite_topology::{NodeDescriptor, Role};

    use super::*;

    fn local() -> Target {
        Target::Local(NodeDescriptor::new("srvnode-1", "127.0.0.1", Role::Server))
    }

    fn ssh_args(executor: &ShellExecutor) -> Vec<String> {
        let cmd = executor.remote_command("srvnode-2", &CommandLine::new("true"));
        cmd.as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_host_keys_are_verified_by_default() {
        let args = ssh_args(&ShellExecutor::default());
        assert!(args.iter().any(|arg| arg == "BatchMode=yes"));
        assert!(
            !args.iter().any(|arg| arg.starts_with("StrictHostKeyChecking")),
            "Host key checking follows the user's ssh config: {args:?}"
        );
        assert_eq!(args[args.len() - 2..], ["srvnode-2", "true"]);
    }

    #[test]
    fn test_extra_ssh_options_precede_the_host() {
        let executor = ShellExecutor::default()
            .with_ssh_option("-o")
            .with_ssh_option("StrictHostKeyChecking=accept-new");
        let args = ssh_args(&executor);
        assert_eq!(
            args[args.len() - 4..],
            ["-o", "StrictHostKeyChecking=accept-new", "srvnode-2", "true"]
        );
    }

    #[tokio::test]
    async fn test_local_success() {
        let executor = ShellExecutor::default();
        executor
            .execute(&local(), &CommandLine::new("true"))
            .await
            .expect("`true` exits cleanly.");
    }

    #[tokio::test]
    async fn test_local_failure_captures_output() {
        let executor = ShellExecutor::default();
        let command = CommandLine::new("sh")
            .arg("-c")
            .arg("echo broken >&2; exit 3");
        let err = executor
            .execute(&local(), &command)
            .await
            .expect_err("Command exits with 3.");

        match err {
            ExecError::Failed { status, output } => {
                assert_eq!(status, Some(3));
                assert!(output.contains("broken"));
            },
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_local_copy_onto_itself_is_noop() {
        let executor = ShellExecutor::default();
        let path = Path::new("/definitely/not/here.xc");
        executor
            .copy(&local(), path, path)
            .await
            .expect("Copying a file onto itself does nothing.");
    }
}
