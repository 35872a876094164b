use std::borrow::Cow;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

use itertools::Itertools;
use shell_escape::escape;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
/// An opaque program invocation.
///
/// Arguments are kept separate until the command is rendered so they can be
/// quoted safely for the remote shell.
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Creates a command for a program living in the given directory.
    pub fn in_dir(dir: &Path, program: &str) -> Self {
        Self::new(dir.join(program).to_string_lossy().into_owned())
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// Adds the flag only if the condition holds.
    pub fn flag_if(self, condition: bool, flag: &str) -> Self {
        if condition {
            self.arg(flag)
        } else {
            self
        }
    }

    #[inline]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[inline]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns true if the program or any argument equals the given value.
    pub fn contains(&self, value: impl AsRef<OsStr>) -> bool {
        let value = value.as_ref();
        OsStr::new(&self.program) == value
            || self.args.iter().any(|arg| OsStr::new(arg) == value)
    }

    /// Renders the command as a single, safely quoted shell line.
    pub fn to_shell(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| escape(Cow::Borrowed(part.as_str())))
            .join(" ")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell())
    }
}
