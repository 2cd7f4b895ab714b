//! External tool access
//!
//! Everything the migration learns or changes goes through one of two
//! traits, so the engine can be driven by the real macOS tools or by an
//! in-memory fake in tests.
//!
//! ```text
//! ┌──────────────────────────┐      ┌──────────────────────────────┐
//! │    DirectoryService      │      │          PathTools           │
//! │  - search policy         │      │  - list (ownership + ACL)    │
//! │  - read all records      │      │  - run mutation command      │
//! └────────────┬─────────────┘      │  - set/clear immutable flag  │
//!              │                    └──────────────┬───────────────┘
//!              ▼                                   ▼
//!          dscl                          ls -aled, chown, chmod, chflags
//! ```

mod system;

pub use system::SystemTools;

use crate::directory::RecordCategory;
use crate::error::ToolResult;
use std::fmt;
use std::path::Path;

/// Read access to the identity providers
pub trait DirectoryService: Send + Sync {
    /// Raw output of the `/Search` node's search policy
    fn search_policy(&self) -> ToolResult<String>;

    /// Raw key/value dump of every record in `category` on `node`
    fn read_records(&self, node: &str, category: RecordCategory) -> ToolResult<String>;
}

/// Read and write access to filesystem paths
pub trait PathTools: Send + Sync {
    /// Long listing of a single path, including its ACL
    fn list(&self, path: &Path) -> ToolResult<String>;

    /// Run a privileged mutation against `path`
    fn run(&self, command: &ToolCommand, path: &Path) -> ToolResult<()>;

    /// Set (`true`) or clear (`false`) the user immutable flag
    fn set_immutable(&self, path: &Path, immutable: bool) -> ToolResult<()>;
}

/// A mutation command, minus the target path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Program name
    pub program: &'static str,

    /// Arguments preceding the path
    pub args: Vec<String>,
}

impl ToolCommand {
    /// `chown <spec>`
    pub fn chown(spec: String) -> Self {
        Self {
            program: "chown",
            args: vec![spec],
        }
    }

    /// `chmod <args...>`
    pub fn chmod(args: Vec<String>) -> Self {
        Self {
            program: "chmod",
            args,
        }
    }

    /// Render the full command line for logging
    pub fn display_with<'a>(&'a self, path: &'a Path) -> CommandLine<'a> {
        CommandLine {
            command: self,
            path,
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// A command together with its target path
pub struct CommandLine<'a> {
    command: &'a ToolCommand,
    path: &'a Path,
}

impl fmt::Display for CommandLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.command, self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display_quotes_spaced_args() {
        let cmd = ToolCommand::chmod(vec![
            "=a#".into(),
            "0".into(),
            "user:alice allow read".into(),
        ]);
        assert_eq!(cmd.to_string(), "chmod =a# 0 \"user:alice allow read\"");

        let line = cmd.display_with(Path::new("/Shares/My Docs"));
        assert_eq!(
            line.to_string(),
            "chmod =a# 0 \"user:alice allow read\" \"/Shares/My Docs\""
        );
    }

    #[test]
    fn test_chown_command() {
        let cmd = ToolCommand::chown("5001:6001".into());
        assert_eq!(cmd.program, "chown");
        assert_eq!(cmd.to_string(), "chown 5001:6001");
    }
}
