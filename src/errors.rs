//! Error taxonomy for external-tool orchestration.
//!
//! Mapping guide:
//! - Map a missing executable (SpawnFailed with NotFound) to exit code 127; all others to 1.
//! - Keep the underlying tool's stderr text verbatim inside CommandFailed so callers
//!   can surface actionable diagnostics and tests can assert on it.
use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// The executable could not be started (missing or unrunnable).
    SpawnFailed { program: String, source: io::Error },
    /// The process ran and exited nonzero; stderr (or the exit-status text for
    /// streamed runs) is preserved verbatim.
    CommandFailed { program: String, stderr: String },
    /// Could not attach to a child's stdout/stderr pipes.
    StreamSetupFailed { program: String, stream: &'static str },
    /// No pull succeeded and no local copy of the image exists.
    ImageNotFound { image: String },
    /// The single-line commit record from git log did not parse.
    CommitParse { detail: String },
    /// Inspect output lacked the expected nested configuration object.
    UnexpectedInspectShape { detail: String },
    /// The directory has no project configuration file.
    NotAProject { dir: String },
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SpawnFailed { program, source } => {
                write!(f, "failed to start {program}: {source}")
            }
            Error::CommandFailed { program, stderr } => {
                let t = stderr.trim_end();
                if t.is_empty() {
                    write!(f, "{program} command failed")
                } else {
                    write!(f, "{program} command failed: {t}")
                }
            }
            Error::StreamSetupFailed { program, stream } => {
                write!(f, "failed to attach {stream} pipe for {program}")
            }
            Error::ImageNotFound { image } => {
                write!(
                    f,
                    "could not find the image either in the registry or locally: {image}"
                )
            }
            Error::CommitParse { detail } => write!(f, "could not parse commit record: {detail}"),
            Error::UnexpectedInspectShape { detail } => {
                write!(f, "unexpected inspect output shape: {detail}")
            }
            Error::NotAProject { dir } => {
                write!(
                    f,
                    "{dir} is not a devstack project (missing .devstack.yaml). Run `devstack doctor` for diagnostics."
                )
            }
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::SpawnFailed { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Map an error to a process exit code:
/// - 127 when the external binary was not found
/// - 1 for everything else
pub fn exit_code_for_error(e: &Error) -> u8 {
    match e {
        Error::SpawnFailed { source, .. } if source.kind() == io::ErrorKind::NotFound => 127,
        Error::Io(ioe) if ioe.kind() == io::ErrorKind::NotFound => 127,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_preserves_stderr() {
        let e = Error::CommandFailed {
            program: "kubectl".to_string(),
            stderr: "error: the server doesn't have a resource type \"foo\"\n".to_string(),
        };
        let s = e.to_string();
        assert!(s.contains("kubectl command failed"));
        assert!(s.contains("the server doesn't have a resource type"));
    }

    #[test]
    fn test_exit_code_127_for_missing_binary() {
        let e = Error::SpawnFailed {
            program: "docker".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file"),
        };
        assert_eq!(exit_code_for_error(&e), 127);
        let e2 = Error::ImageNotFound {
            image: "x".to_string(),
        };
        assert_eq!(exit_code_for_error(&e2), 1);
    }
}
