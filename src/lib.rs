//! devstack: build, run and deploy stack-based applications by driving
//! docker/buildah, kubectl and git.

pub mod color;
pub mod config;
pub mod describe;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod git;
pub mod kube;
pub mod manifest;
pub mod util;

pub use color::{
    color_enabled_stderr, color_enabled_stdout, log_error_stderr, log_info_stderr,
    log_warn_stderr, paint, set_color_mode, ColorMode,
};
pub use errors::{exit_code_for_error, Error, Result};
pub use exec::{CommandSpec, CommandResult, LogSink, ProcessRunner, Runner, StreamKind};
