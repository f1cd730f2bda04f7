#![allow(clippy::module_name_repetitions)]
//! Image acquisition with a per-run memo and a pull policy.

use std::sync::Arc;

use crate::color::{color_enabled_stderr, log_info_stderr, log_warn_stderr};
use crate::config::{PullPolicy, RunConfig};
use crate::engine::runtime::Engine;
use crate::errors::{Error, Result};
use crate::exec::{CommandSpec, LogSink, Runner};

/// Make sure `image` is available, pulling it at most once per run.
///
/// The memo records "attempted", not "succeeded": a second call for the same
/// literal reference returns immediately whatever the first attempt did, and
/// the reference is marked before any I/O so a reentrant caller cannot
/// trigger a duplicate attempt. Under `IfNotPresent` a local copy short-
/// circuits the pull entirely; under `Always` a failed pull falls back to a
/// local copy when one exists.
pub fn ensure_image(runner: &dyn Runner, image: &str, config: &mut RunConfig) -> Result<()> {
    if config.pull_attempted(image) {
        return Ok(());
    }
    config.mark_pull_attempted(image);

    let use_err = color_enabled_stderr();
    let policy = config.pull_policy();
    let mut local_found = false;
    if policy == PullPolicy::IfNotPresent {
        local_found = image_present_locally(runner, image, config.dry_run);
    }

    if policy == PullPolicy::Always || !local_found {
        let engine = Engine::from_flags(config.buildah);
        if let Err(e) = pull(runner, engine, image, config.dry_run) {
            log_warn_stderr(use_err, &format!("devstack: image pull failed: {e}"));
            // A registry may be unreachable while a previously cached copy
            // still exists locally.
            if policy == PullPolicy::Always {
                local_found = image_present_locally(runner, image, config.dry_run);
            }
            if !local_found {
                return Err(Error::ImageNotFound {
                    image: image.to_string(),
                });
            }
        }
    }

    if local_found {
        log_info_stderr(
            use_err,
            &format!("devstack: using local cache for image {image}"),
        );
    }
    Ok(())
}

fn pull(runner: &dyn Runner, engine: Engine, image: &str, dry_run: bool) -> Result<()> {
    let spec = CommandSpec::new(engine.binary())
        .arg("pull")
        .arg(image)
        .dry_run(dry_run);
    runner.stream_to(&spec, Arc::new(LogSink))
}

/// List-by-reference presence check. Listing always goes through docker;
/// buildah shares the check in the original tool as well. Errors degrade to
/// "not present" with a warning so a broken engine does not abort callers
/// that have a pull fallback.
pub fn image_present_locally(runner: &dyn Runner, image: &str, dry_run: bool) -> bool {
    let spec = CommandSpec::new("docker")
        .args(["image", "ls", "-q"])
        .arg(image)
        .dry_run(dry_run);
    match runner.capture(&spec) {
        Ok(out) => !out.stdout.trim().is_empty(),
        Err(e) => {
            let use_err = color_enabled_stderr();
            log_warn_stderr(
                use_err,
                &format!("devstack: could not list local images for {image}: {e}"),
            );
            false
        }
    }
}

/// Tag an existing local image.
pub fn tag_image(runner: &dyn Runner, source: &str, tag: &str, dry_run: bool) -> Result<()> {
    let spec = CommandSpec::new("docker")
        .args(["image", "tag"])
        .arg(source)
        .arg(tag)
        .dry_run(dry_run);
    runner.capture(&spec).map(|_| ())
}

/// Push an image to its registry (assumes prior login).
pub fn push_image(runner: &dyn Runner, image: &str, dry_run: bool) -> Result<()> {
    let spec = CommandSpec::new("docker")
        .arg("push")
        .arg(image)
        .dry_run(dry_run);
    runner.stream_to(&spec, Arc::new(LogSink))
}
