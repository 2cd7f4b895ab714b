//! Production tool access over `std::process::Command`

use super::{DirectoryService, PathTools, ToolCommand};
use crate::directory::RecordCategory;
use crate::error::{ToolError, ToolResult};
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};
use tracing::trace;

/// Runs `dscl`, `ls`, `chown`, `chmod` and `chflags`
#[derive(Debug, Clone)]
pub struct SystemTools {
    /// Prefix mutations with `sudo`
    sudo: bool,
}

impl SystemTools {
    /// Create tool access; `sudo` prefixes every mutation
    pub fn new(sudo: bool) -> Self {
        Self { sudo }
    }

    fn privileged(&self, program: &str) -> Command {
        if self.sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(program);
            cmd
        } else {
            Command::new(program)
        }
    }
}

impl Default for SystemTools {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DirectoryService for SystemTools {
    fn search_policy(&self) -> ToolResult<String> {
        let mut cmd = Command::new("dscl");
        cmd.args(["/Search", "-read", "/"]);
        capture("dscl", cmd)
    }

    fn read_records(&self, node: &str, category: RecordCategory) -> ToolResult<String> {
        let mut cmd = Command::new("dscl");
        cmd.arg(node)
            .arg("-readall")
            .arg(category.record_path())
            .args(["RecordName", category.key_attribute(), "GeneratedUID"]);
        capture("dscl", cmd)
    }
}

impl PathTools for SystemTools {
    fn list(&self, path: &Path) -> ToolResult<String> {
        let mut cmd = Command::new("ls");
        cmd.arg("-aled").arg(path);
        capture("ls", cmd)
    }

    fn run(&self, command: &ToolCommand, path: &Path) -> ToolResult<()> {
        let mut cmd = self.privileged(command.program);
        cmd.args(&command.args).arg(path);
        status(command.program, cmd)
    }

    fn set_immutable(&self, path: &Path, immutable: bool) -> ToolResult<()> {
        let flag = if immutable { "uchg" } else { "nouchg" };
        let mut cmd = self.privileged("chflags");
        cmd.arg(flag).arg(path);
        status("chflags", cmd)
    }
}

/// Run a command and return its stdout
fn capture(program: &str, mut cmd: Command) -> ToolResult<String> {
    let output = spawn(program, &mut cmd)?;
    check(program, &output)?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command for its exit status only
fn status(program: &str, mut cmd: Command) -> ToolResult<()> {
    let output = spawn(program, &mut cmd)?;
    check(program, &output)
}

fn spawn(program: &str, cmd: &mut Command) -> ToolResult<Output> {
    trace!(
        program = program,
        args = ?cmd.get_args().map(OsStr::to_string_lossy).collect::<Vec<_>>(),
        "Spawning"
    );
    cmd.output().map_err(|e| ToolError::Spawn {
        program: program.to_string(),
        reason: e.to_string(),
    })
}

fn check(program: &str, output: &Output) -> ToolResult<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(ToolError::Failed {
        program: program.to_string(),
        status: output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string()),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
