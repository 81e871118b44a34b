use crate::{constants::CLEANUP_PROGRAM, error::CleanupError};

use std::{ffi::OsStr, io, path::Path, process::Command};

use tracing::{Level, event};

/// Rewrites a finished vector file in place to strip redundant markup.
pub trait CleanupTool: Sync {
    fn clean(&self, path: &Path) -> Result<(), CleanupError>;
}

impl<F> CleanupTool for F
where
    F: Fn(&Path) -> Result<(), CleanupError> + Sync,
{
    fn clean(&self, path: &Path) -> Result<(), CleanupError> {
        self(path)
    }
}

/// Leaves files untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCleanup;

impl CleanupTool for NoCleanup {
    fn clean(&self, _path: &Path) -> Result<(), CleanupError> {
        Ok(())
    }
}

/// The `svgo` command line optimizer.
#[derive(Debug, Clone)]
pub struct Svgo {
    program: String,
}

impl Default for Svgo {
    fn default() -> Self {
        Svgo {
            program: CLEANUP_PROGRAM.to_string(),
        }
    }
}

impl Svgo {
    pub fn with_program(program: &str) -> Self {
        Svgo {
            program: program.to_string(),
        }
    }
}

impl CleanupTool for Svgo {
    fn clean(&self, path: &Path) -> Result<(), CleanupError> {
        run_program(&self.program, [path.as_os_str()])?;

        event!(Level::DEBUG, "Cleaned: {}", path.display());

        Ok(())
    }
}

/// Runs an external program to completion, mapping a missing binary to
/// [`CleanupError::ToolUnavailable`].
pub(crate) fn run_program<I, S>(program: &str, args: I) -> Result<(), CleanupError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = match Command::new(program).args(args).output() {
        Ok(output) => output,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(CleanupError::ToolUnavailable(program.to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    if !output.status.success() {
        return Err(CleanupError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}
