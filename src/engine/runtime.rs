#![allow(clippy::module_name_repetitions)]
//! Container runtime discovery.

use std::env;
use std::io;
use std::path::PathBuf;

use which::which;

/// Which engine executes image operations. Buildah emits a different
/// inspect shape than docker, so parsers need to know the producer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Engine {
    Docker,
    Buildah,
}

impl Engine {
    pub fn from_flags(buildah: bool) -> Engine {
        if buildah {
            Engine::Buildah
        } else {
            Engine::Docker
        }
    }

    pub fn binary(self) -> &'static str {
        match self {
            Engine::Docker => "docker",
            Engine::Buildah => "buildah",
        }
    }
}

pub fn container_runtime_path() -> io::Result<PathBuf> {
    // Allow tests or callers to explicitly disable detection to avoid hard failures
    if env::var("DEVSTACK_SKIP_DOCKER").ok().as_deref() == Some("1") {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "Docker disabled by environment override.",
        ));
    }
    if let Ok(p) = which("docker") {
        return Ok(p);
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        "Docker is required but was not found in PATH.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_binary_names() {
        assert_eq!(Engine::from_flags(false).binary(), "docker");
        assert_eq!(Engine::from_flags(true).binary(), "buildah");
    }
}
