#![allow(clippy::module_name_repetitions)]
//! Application description: stack, deployment and container attributes of
//! the running pod, assembled from kubectl output.
//!
//! Every field defaults to "unknown" and is overwritten only when the
//! corresponding piece of pod YAML is present, so a partially broken
//! cluster answer still yields a useful report.

use serde::Serialize;
use serde_yaml::Value;

use crate::errors::{Error, Result};
use crate::exec::Runner;
use crate::kube::kube_get;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    pub node_name: String,
    pub pod_name: String,
    pub phase: String,
    pub host_ip: String,
    pub start_time: String,
    pub liveness_probe: String,
    pub readiness_probe: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub stack_info: StackInfo,
    pub deployment_info: DeploymentInfo,
}

impl Default for AppInfo {
    fn default() -> Self {
        AppInfo {
            stack_info: StackInfo {
                name: UNKNOWN.to_string(),
                version: UNKNOWN.to_string(),
            },
            deployment_info: DeploymentInfo {
                node_name: UNKNOWN.to_string(),
                pod_name: UNKNOWN.to_string(),
                phase: UNKNOWN.to_string(),
                host_ip: UNKNOWN.to_string(),
                start_time: UNKNOWN.to_string(),
                liveness_probe: UNKNOWN.to_string(),
                readiness_probe: UNKNOWN.to_string(),
            },
        }
    }
}

/// Output rendering for the describe command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum DescribeFormat {
    Yaml,
    Json,
}

fn yaml_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = value;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_str()
}

/// Fill an [`AppInfo`] from the pod's `kubectl get -o yaml` document.
pub fn populate_from_pod_yaml(info: &mut AppInfo, pod_yaml: &str) -> Result<()> {
    let data: Value = serde_yaml::from_str(pod_yaml).map_err(|e| Error::UnexpectedInspectShape {
        detail: format!("pod YAML did not parse: {e}"),
    })?;

    if let Some(name) = yaml_str(&data, &["metadata", "labels", "devstack.dev/stack"]) {
        info.stack_info.name = name.to_string();
    }
    if let Some(version) = yaml_str(&data, &["metadata", "labels", "app.kubernetes.io/version"]) {
        info.stack_info.version = version.to_string();
    }
    if let Some(name) = yaml_str(&data, &["metadata", "name"]) {
        info.deployment_info.pod_name = name.to_string();
    }
    if let Some(node) = yaml_str(&data, &["spec", "nodeName"]) {
        info.deployment_info.node_name = node.to_string();
    }
    if let Some(phase) = yaml_str(&data, &["status", "phase"]) {
        info.deployment_info.phase = phase.to_string();
    }
    if let Some(ip) = yaml_str(&data, &["status", "hostIP"]) {
        info.deployment_info.host_ip = ip.to_string();
    }
    if let Some(start) = yaml_str(&data, &["status", "startTime"]) {
        info.deployment_info.start_time = start.to_string();
    }
    Ok(())
}

/// Scrape the probe lines out of `kubectl describe pod` text.
pub fn parse_probes(describe_output: &str) -> (String, String) {
    let mut liveness = UNKNOWN.to_string();
    let mut readiness = UNKNOWN.to_string();
    for line in describe_output.lines() {
        if let Some((_, rest)) = line.split_once("Liveness:") {
            liveness = rest.trim().to_string();
        }
        if let Some((_, rest)) = line.split_once("Readiness:") {
            readiness = rest.trim().to_string();
        }
    }
    (liveness, readiness)
}

/// Name of the running pod carrying the app label, if any.
pub fn running_pod(
    runner: &dyn Runner,
    app_name: &str,
    namespace: &str,
    dry_run: bool,
) -> Result<String> {
    let selector = format!("app.kubernetes.io/name={app_name}");
    let out = kube_get(
        runner,
        &["pods", "-l", &selector, "-o", "name"],
        namespace,
        dry_run,
    )?;
    // several replicas may match; the first is representative
    Ok(out.lines().next().unwrap_or("").trim().to_string())
}

/// Assemble the full description of the deployed application.
pub fn describe_app(
    runner: &dyn Runner,
    app_name: &str,
    namespace: &str,
    dry_run: bool,
) -> Result<AppInfo> {
    let mut info = AppInfo::default();

    let pod = running_pod(runner, app_name, namespace, dry_run)?;
    if pod.is_empty() {
        return Ok(info);
    }

    if let Ok(pod_yaml) = kube_get(runner, &[&pod, "-o", "yaml"], namespace, dry_run) {
        // tolerate partial data; fields keep their defaults
        let _ = populate_from_pod_yaml(&mut info, &pod_yaml);
    }

    let spec = crate::exec::CommandSpec::new("kubectl")
        .arg("describe")
        .arg(&pod)
        .args(if namespace.is_empty() {
            Vec::new()
        } else {
            vec!["--namespace".to_string(), namespace.to_string()]
        })
        .dry_run(dry_run);
    if let Ok(out) = runner.capture(&spec) {
        let (liveness, readiness) = parse_probes(&out.stdout);
        info.deployment_info.liveness_probe = liveness;
        info.deployment_info.readiness_probe = readiness;
    }

    Ok(info)
}

/// Render an [`AppInfo`] in the requested format.
pub fn render(info: &AppInfo, format: DescribeFormat) -> Result<String> {
    match format {
        DescribeFormat::Yaml => serde_yaml::to_string(info).map_err(|e| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("could not render description: {e}"),
            ))
        }),
        DescribeFormat::Json => serde_json::to_string_pretty(info).map_err(|e| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("could not render description: {e}"),
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POD_YAML: &str = r#"
metadata:
  name: my-app-6d4f
  labels:
    devstack.dev/stack: nodejs-express
    app.kubernetes.io/version: "0.4.1"
spec:
  nodeName: worker-2
status:
  phase: Running
  hostIP: 10.0.0.7
  startTime: "2026-08-29T10:00:00Z"
"#;

    #[test]
    fn test_populate_from_pod_yaml() {
        let mut info = AppInfo::default();
        populate_from_pod_yaml(&mut info, POD_YAML).unwrap();
        assert_eq!(info.stack_info.name, "nodejs-express");
        assert_eq!(info.stack_info.version, "0.4.1");
        assert_eq!(info.deployment_info.pod_name, "my-app-6d4f");
        assert_eq!(info.deployment_info.node_name, "worker-2");
        assert_eq!(info.deployment_info.phase, "Running");
        assert_eq!(info.deployment_info.host_ip, "10.0.0.7");
    }

    #[test]
    fn test_populate_partial_yaml_keeps_defaults() {
        let mut info = AppInfo::default();
        populate_from_pod_yaml(&mut info, "metadata:\n  name: only-name\n").unwrap();
        assert_eq!(info.deployment_info.pod_name, "only-name");
        assert_eq!(info.deployment_info.phase, "unknown");
        assert_eq!(info.stack_info.name, "unknown");
    }

    #[test]
    fn test_parse_probes() {
        let text = "    Liveness:   http-get http://:8080/live delay=5s\n    Readiness:  http-get http://:8080/ready delay=3s\n";
        let (l, r) = parse_probes(text);
        assert!(l.starts_with("http-get http://:8080/live"));
        assert!(r.starts_with("http-get http://:8080/ready"));
    }

    #[test]
    fn test_render_json_and_yaml() {
        let info = AppInfo::default();
        let yaml = render(&info, DescribeFormat::Yaml).unwrap();
        assert!(yaml.contains("stackInfo"));
        let json = render(&info, DescribeFormat::Json).unwrap();
        assert!(json.contains("\"deploymentInfo\""));
    }
}
