#![allow(clippy::module_name_repetitions)]
//! Image-inspect parsing.
//!
//! Docker and buildah emit different shapes for `inspect`: docker wraps the
//! record in a one-element array with a capitalized `Config`, buildah emits
//! a single object with a lowercase `config`. Both are resolved into the one
//! [`ImageDetails`] record at this boundary; nothing downstream branches on
//! the engine again.

use serde_json::Value;

use crate::config::RunConfig;
use crate::engine::images::ensure_image;
use crate::engine::runtime::Engine;
use crate::errors::{Error, Result};
use crate::exec::{CommandSpec, Runner};

/// Normalized image metadata: env pairs and exposed ports (protocol
/// suffixes stripped).
#[derive(Debug, Default, Clone)]
pub struct ImageDetails {
    pub env: Vec<(String, String)>,
    pub exposed_ports: Vec<String>,
}

/// Raw inspect output, tagged by producing engine.
enum InspectDoc {
    Docker(Vec<Value>),
    Buildah(Value),
}

impl InspectDoc {
    fn parse(text: &str, engine: Engine) -> Result<InspectDoc> {
        match engine {
            Engine::Docker => serde_json::from_str::<Vec<Value>>(text)
                .map(InspectDoc::Docker)
                .map_err(|e| Error::UnexpectedInspectShape {
                    detail: format!("docker inspect is not a JSON array: {e}"),
                }),
            Engine::Buildah => serde_json::from_str::<Value>(text)
                .map(InspectDoc::Buildah)
                .map_err(|e| Error::UnexpectedInspectShape {
                    detail: format!("buildah inspect is not a JSON object: {e}"),
                }),
        }
    }

    /// The nested configuration object; its absence is a structural failure.
    fn config(&self) -> Result<&Value> {
        let cfg = match self {
            InspectDoc::Docker(records) => records.first().and_then(|r| r.get("Config")),
            InspectDoc::Buildah(record) => record.get("config"),
        };
        cfg.filter(|v| v.is_object())
            .ok_or(Error::UnexpectedInspectShape {
                detail: "missing configuration object".to_string(),
            })
    }
}

/// Parse inspect output into normalized details.
pub fn parse_inspect(text: &str, engine: Engine) -> Result<ImageDetails> {
    let doc = InspectDoc::parse(text, engine)?;
    let config = doc.config()?;

    let mut details = ImageDetails::default();
    if let Some(env) = config.get("Env").and_then(Value::as_array) {
        for entry in env {
            if let Some(s) = entry.as_str() {
                match s.split_once('=') {
                    Some((name, value)) => {
                        details.env.push((name.to_string(), value.to_string()));
                    }
                    None => details.env.push((s.to_string(), String::new())),
                }
            }
        }
    }
    if let Some(ports) = config.get("ExposedPorts").and_then(Value::as_object) {
        for key in ports.keys() {
            match split_port_protocol(key) {
                Some((port, _proto)) => details.exposed_ports.push(port.to_string()),
                None => details.exposed_ports.push(key.clone()),
            }
        }
        // object key order is engine-dependent
        details.exposed_ports.sort();
    }
    Ok(details)
}

/// Split `8080/tcp` into `("8080", "tcp")`. `None` when there is no
/// protocol suffix, so malformed keys are detectable instead of silently
/// collapsing to empty strings.
pub fn split_port_protocol(s: &str) -> Option<(&str, &str)> {
    let (port, proto) = s.split_once('/')?;
    if port.is_empty() || proto.is_empty() {
        return None;
    }
    Some((port, proto))
}

/// Inspect the given image, pulling it first through the acquisition cache.
pub fn inspect_image(runner: &dyn Runner, image: &str, config: &mut RunConfig) -> Result<ImageDetails> {
    ensure_image(runner, image, config)?;
    let engine = Engine::from_flags(config.buildah);
    let spec = match engine {
        Engine::Docker => CommandSpec::new("docker").args(["image", "inspect"]).arg(image),
        Engine::Buildah => CommandSpec::new("buildah").arg("inspect").arg(image),
    };
    let out = runner.capture(&spec.dry_run(config.dry_run))?;
    parse_inspect(&out.stdout, engine)
}

/// Look up one env var declared by the project's stack image.
///
/// The first call inspects the image and caches every declared pair in the
/// run config; later lookups are answered from the cache. A name the image
/// does not declare yields `Ok(None)`.
pub fn stack_env_var(
    runner: &dyn Runner,
    name: &str,
    config: &mut RunConfig,
) -> Result<Option<String>> {
    if config.cached_env.is_none() {
        let image = config.project_config()?.stack_image.clone();
        let details = inspect_image(runner, &image, config)?;
        config.cached_env = Some(details.env.into_iter().collect());
    }
    Ok(config
        .cached_env
        .as_ref()
        .and_then(|m| m.get(name))
        .cloned())
}

/// Exposed ports of the project's stack image.
pub fn exposed_ports(runner: &dyn Runner, config: &mut RunConfig) -> Result<Vec<String>> {
    let image = config.project_config()?.stack_image.clone();
    let details = inspect_image(runner, &image, config)?;
    Ok(details.exposed_ports)
}

/// In-image project directory declared by the stack (`DEVSTACK_PROJECT_DIR`),
/// falling back to `/project` with a warning.
pub fn stack_project_dir(runner: &dyn Runner, config: &mut RunConfig) -> Result<String> {
    match stack_env_var(runner, "DEVSTACK_PROJECT_DIR", config)? {
        Some(dir) if !dir.is_empty() => Ok(dir),
        _ => {
            let use_err = crate::color::color_enabled_stderr();
            crate::color::log_warn_stderr(
                use_err,
                "devstack: stack image does not declare DEVSTACK_PROJECT_DIR; using /project",
            );
            Ok("/project".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCKER_INSPECT: &str = r#"[
      {
        "Id": "sha256:abcd",
        "Config": {
          "Env": ["PATH=/usr/bin", "DEVSTACK_PROJECT_DIR=/project", "EMPTYOK"],
          "ExposedPorts": {"8080/tcp": {}, "9999/udp": {}}
        }
      }
    ]"#;

    const BUILDAH_INSPECT: &str = r#"{
      "config": {
        "Env": ["DEVSTACK_MOUNTS=~/.m2:/root/.m2;src:/project/src"],
        "ExposedPorts": {"3000/tcp": {}}
      }
    }"#;

    #[test]
    fn test_parse_docker_array_shape() {
        let d = parse_inspect(DOCKER_INSPECT, Engine::Docker).unwrap();
        assert!(d
            .env
            .contains(&("DEVSTACK_PROJECT_DIR".to_string(), "/project".to_string())));
        assert!(d.env.contains(&("EMPTYOK".to_string(), String::new())));
        assert_eq!(d.exposed_ports, vec!["8080".to_string(), "9999".to_string()]);
    }

    #[test]
    fn test_parse_buildah_object_shape() {
        let d = parse_inspect(BUILDAH_INSPECT, Engine::Buildah).unwrap();
        assert_eq!(d.exposed_ports, vec!["3000".to_string()]);
        assert_eq!(d.env.len(), 1);
        assert_eq!(d.env[0].0, "DEVSTACK_MOUNTS");
    }

    #[test]
    fn test_missing_config_object_is_structural_error() {
        let err = parse_inspect(r#"[{"Id": "x"}]"#, Engine::Docker).unwrap_err();
        match err {
            Error::UnexpectedInspectShape { detail } => {
                assert!(detail.contains("configuration object"));
            }
            other => panic!("expected UnexpectedInspectShape, got {other}"),
        }
    }

    #[test]
    fn test_wrong_top_level_shape() {
        assert!(matches!(
            parse_inspect("{}", Engine::Docker),
            Err(Error::UnexpectedInspectShape { .. })
        ));
        assert!(matches!(
            parse_inspect("[]", Engine::Buildah),
            Err(Error::UnexpectedInspectShape { .. })
        ));
    }

    #[test]
    fn test_split_port_protocol() {
        assert_eq!(split_port_protocol("8080/tcp"), Some(("8080", "tcp")));
        assert_eq!(split_port_protocol("8080"), None);
        assert_eq!(split_port_protocol("/tcp"), None);
        assert_eq!(split_port_protocol("8080/"), None);
    }
}
