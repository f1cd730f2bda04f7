//! Per-run configuration and state.
//!
//! All mutable run-scoped state (the image-pull memo, the cached stack env
//! vars, the lazily loaded project config) lives in [`RunConfig`], which is
//! passed by reference into every operation that needs it. Nothing here is a
//! process-wide singleton. Access is single-threaded per run; parallel image
//! resolution would need the memo behind a mutex to keep the one-attempt
//! invariant.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::errors::{Error, Result};

/// Project configuration file expected at the project root.
pub const CONFIG_FILE: &str = ".devstack.yaml";

/// Whether a stack image is always re-fetched or only fetched when absent
/// locally. Derived once per run from `DEVSTACK_PULL_POLICY`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PullPolicy {
    Always,
    IfNotPresent,
}

impl PullPolicy {
    /// Case-insensitive; anything other than "ifnotpresent" means Always.
    pub fn parse(s: &str) -> PullPolicy {
        if s.trim().eq_ignore_ascii_case("ifnotpresent") {
            PullPolicy::IfNotPresent
        } else {
            PullPolicy::Always
        }
    }

    fn from_env() -> PullPolicy {
        match env::var("DEVSTACK_PULL_POLICY") {
            Ok(v) => PullPolicy::parse(&v),
            Err(_) => PullPolicy::Always,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProjectFile {
    stack: String,
}

/// Parsed project configuration: the stack image the project builds on.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub stack_image: String,
}

/// State for one CLI invocation.
pub struct RunConfig {
    pub project_dir: PathBuf,
    pub dry_run: bool,
    pub verbose: bool,
    pub buildah: bool,
    pull_policy: OnceCell<PullPolicy>,
    // image ref -> pull attempted this run (not "succeeded")
    image_pulled: HashMap<String, bool>,
    // stack image env vars, filled on first inspect
    pub(crate) cached_env: Option<HashMap<String, String>>,
    project_config: Option<ProjectConfig>,
}

impl RunConfig {
    pub fn new(project_dir: PathBuf) -> Self {
        Self {
            project_dir,
            dry_run: false,
            verbose: false,
            buildah: false,
            pull_policy: OnceCell::new(),
            image_pulled: HashMap::new(),
            cached_env: None,
            project_config: None,
        }
    }

    pub fn pull_policy(&self) -> PullPolicy {
        *self.pull_policy.get_or_init(PullPolicy::from_env)
    }

    #[cfg(test)]
    pub(crate) fn set_pull_policy_for_tests(&mut self, policy: PullPolicy) {
        self.pull_policy = OnceCell::new();
        let _ = self.pull_policy.set(policy);
    }

    /// True when a pull has already been attempted for this exact image
    /// reference during this run, regardless of its outcome.
    pub fn pull_attempted(&self, image: &str) -> bool {
        self.image_pulled.get(image).copied().unwrap_or(false)
    }

    pub fn mark_pull_attempted(&mut self, image: &str) {
        self.image_pulled.insert(image.to_string(), true);
    }

    /// Project dir validated to actually contain a devstack project.
    pub fn checked_project_dir(&self) -> Result<&Path> {
        let cfg = self.project_dir.join(CONFIG_FILE);
        if cfg.is_file() {
            Ok(&self.project_dir)
        } else {
            Err(Error::NotAProject {
                dir: self.project_dir.display().to_string(),
            })
        }
    }

    /// Lazily read `.devstack.yaml` and resolve the stack image reference,
    /// prefixing the configured registry unless it is the default hub.
    pub fn project_config(&mut self) -> Result<&ProjectConfig> {
        let config = match self.project_config.take() {
            Some(config) => config,
            None => {
                let dir = self.checked_project_dir()?.to_path_buf();
                let path = dir.join(CONFIG_FILE);
                let raw = fs::read_to_string(&path)?;
                let parsed: ProjectFile = serde_yaml::from_str(&raw).map_err(|e| {
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("failed to parse {}: {e}", path.display()),
                    ))
                })?;
                ProjectConfig {
                    stack_image: resolve_stack_image(&parsed.stack),
                }
            }
        };
        Ok(self.project_config.insert(config))
    }

    /// Project name derived from the directory basename (lowercased,
    /// underscores mapped to hyphens so it is usable as a k8s label).
    pub fn project_name(&self) -> Result<String> {
        let dir = self.checked_project_dir()?;
        let base = dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "my-project".to_string());
        Ok(base.to_lowercase().replace('_', "-"))
    }
}

fn resolve_stack_image(stack: &str) -> String {
    let registry = env::var("DEVSTACK_IMAGE_REGISTRY").unwrap_or_default();
    let registry = registry.trim();
    if registry.is_empty() || registry == "index.docker.io" {
        stack.to_string()
    } else {
        format!("{}/{}", registry.trim_end_matches('/'), stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_policy_parse_case_insensitive() {
        assert_eq!(PullPolicy::parse("IfNotPresent"), PullPolicy::IfNotPresent);
        assert_eq!(PullPolicy::parse("IFNOTPRESENT"), PullPolicy::IfNotPresent);
        assert_eq!(PullPolicy::parse("always"), PullPolicy::Always);
        assert_eq!(PullPolicy::parse(""), PullPolicy::Always);
        assert_eq!(PullPolicy::parse("garbage"), PullPolicy::Always);
    }

    #[test]
    fn test_memo_records_attempts() {
        let mut cfg = RunConfig::new(PathBuf::from("/tmp"));
        assert!(!cfg.pull_attempted("img:1"));
        cfg.mark_pull_attempted("img:1");
        assert!(cfg.pull_attempted("img:1"));
        // literal string keying: a different-looking ref is distinct
        assert!(!cfg.pull_attempted("img"));
    }

    #[test]
    fn test_not_a_project_error() {
        let cfg = RunConfig::new(PathBuf::from("/definitely/absent/dir"));
        match cfg.checked_project_dir() {
            Err(Error::NotAProject { dir }) => assert!(dir.contains("absent")),
            other => panic!("expected NotAProject, got {other:?}"),
        }
    }

    #[test]
    fn test_project_name_normalized() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("My_App");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE), "stack: acme/java-stack:0.2\n").unwrap();
        let cfg = RunConfig::new(dir);
        assert_eq!(cfg.project_name().unwrap(), "my-app");
    }

    #[test]
    fn test_project_config_reads_stack() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "stack: acme/nodejs-express:0.4\n",
        )
        .unwrap();
        let mut cfg = RunConfig::new(tmp.path().to_path_buf());
        let pc = cfg.project_config().unwrap();
        assert!(pc.stack_image.ends_with("acme/nodejs-express:0.4"));
    }
}
