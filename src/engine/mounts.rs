#![allow(clippy::module_name_repetitions)]
//! Expansion of the stack's declared mount list into docker `-v` args.
//!
//! The stack image declares `DEVSTACK_MOUNTS` as a semicolon-delimited list
//! of `host:container` pairs. A leading `~` maps to the host home directory,
//! relative entries are joined to the project directory, and entries whose
//! host side does not exist are skipped with a warning unless the base
//! directory was explicitly overridden via env.

use std::env;
use std::path::{Path, PathBuf};

use crate::color::{color_enabled_stderr, log_warn_stderr};
use crate::config::RunConfig;
use crate::engine::inspect::stack_env_var;
use crate::errors::Result;
use crate::exec::Runner;

fn user_home_dir() -> PathBuf {
    home::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Map one mount entry to its effective `host:container` form.
fn map_mount(mount: &str, home_dir: &Path, project_dir: &Path) -> String {
    if let Some(rest) = mount.strip_prefix('~') {
        format!("{}{}", home_dir.display(), rest)
    } else {
        format!("{}/{}", project_dir.display(), mount.trim_start_matches('/'))
    }
}

/// Host side of a `host:container` pair.
fn mount_host_path(mapped: &str) -> &str {
    mapped.split(':').next().unwrap_or(mapped)
}

/// Build the `-v` argument list from the stack's mount declaration.
pub fn volume_args(runner: &dyn Runner, config: &mut RunConfig) -> Result<Vec<String>> {
    let use_err = color_enabled_stderr();
    let Some(mounts) = stack_env_var(runner, "DEVSTACK_MOUNTS", config)? else {
        log_warn_stderr(use_err, "devstack: stack image does not declare DEVSTACK_MOUNTS");
        return Ok(Vec::new());
    };
    if mounts.is_empty() {
        log_warn_stderr(use_err, "devstack: stack image does not declare DEVSTACK_MOUNTS");
        return Ok(Vec::new());
    }

    let mut home_dir = user_home_dir();
    let mut home_overridden = false;
    if let Ok(over) = env::var("DEVSTACK_MOUNT_HOME") {
        if !over.trim().is_empty() {
            home_dir = PathBuf::from(over);
            home_overridden = true;
        }
    }
    let mut project_dir = config.checked_project_dir()?.to_path_buf();
    let mut project_overridden = false;
    if let Ok(over) = env::var("DEVSTACK_MOUNT_PROJECT") {
        if !over.trim().is_empty() {
            project_dir = PathBuf::from(over);
            project_overridden = true;
        }
    }

    let mut args = Vec::new();
    for mount in mounts.split(';') {
        if mount.is_empty() {
            continue;
        }
        let overridden = if mount.starts_with('~') {
            home_overridden
        } else {
            project_overridden
        };
        let mapped = map_mount(mount, &home_dir, &project_dir);
        if !overridden && !Path::new(mount_host_path(&mapped)).exists() {
            log_warn_stderr(
                use_err,
                &format!("devstack: skipping mount {mapped}: local path not found"),
            );
            continue;
        }
        args.push("-v".to_string());
        args.push(mapped);
    }
    Ok(args)
}
