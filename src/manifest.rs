#![allow(clippy::module_name_repetitions)]
//! Kubernetes/Knative manifest synthesis.
//!
//! Typed records in, YAML files out. The structs carry only the fields the
//! generated manifests actually populate; schema completeness is not a goal.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::color::{color_enabled_stderr, log_info_stderr};
use crate::errors::{Error, Result};
use crate::git::GitInfo;

fn parse_port(port: &str) -> Result<u16> {
    port.trim().parse::<u16>().map_err(|e| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid container port {port:?}: {e}"),
        ))
    })
}

#[derive(Debug, Serialize)]
struct Metadata {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, String>,
}

impl Metadata {
    fn named(name: &str) -> Metadata {
        Metadata {
            name: name.to_string(),
            namespace: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContainerPort {
    container_port: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Container {
    name: String,
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_pull_policy: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<ContainerPort>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PodSpec {
    containers: Vec<Container>,
}

#[derive(Debug, Serialize)]
struct PodTemplate {
    metadata: Metadata,
    spec: PodSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Selector {
    match_labels: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct DeploymentSpec {
    selector: Selector,
    replicas: u32,
    template: PodTemplate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Deployment {
    api_version: String,
    kind: String,
    metadata: Metadata,
    spec: DeploymentSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServicePort {
    name: String,
    port: u16,
    target_port: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceSpec {
    selector: BTreeMap<String, String>,
    #[serde(rename = "type")]
    service_type: String,
    ports: Vec<ServicePort>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Service {
    api_version: String,
    kind: String,
    metadata: Metadata,
    spec: ServiceSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngressBackend {
    service_name: String,
    service_port: u16,
}

#[derive(Debug, Serialize)]
struct IngressPath {
    path: String,
    backend: IngressBackend,
}

#[derive(Debug, Serialize)]
struct IngressHttp {
    paths: Vec<IngressPath>,
}

#[derive(Debug, Serialize)]
struct IngressRule {
    host: String,
    http: IngressHttp,
}

#[derive(Debug, Serialize)]
struct IngressSpec {
    rules: Vec<IngressRule>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Ingress {
    api_version: String,
    kind: String,
    metadata: Metadata,
    spec: IngressSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KnativeContainer {
    image: String,
    image_pull_policy: String,
    ports: Vec<ContainerPort>,
}

#[derive(Debug, Serialize)]
struct KnativeRevisionSpec {
    container: KnativeContainer,
}

#[derive(Debug, Serialize)]
struct KnativeRevisionTemplate {
    spec: KnativeRevisionSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KnativeConfiguration {
    revision_template: KnativeRevisionTemplate,
}

#[derive(Debug, Serialize)]
struct KnativeRunLatest {
    configuration: KnativeConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KnativeSpec {
    run_latest: KnativeRunLatest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KnativeService {
    api_version: String,
    kind: String,
    metadata: Metadata,
    spec: KnativeSpec,
}

fn write_manifest<T: Serialize>(doc: &T, path: &Path, dry_run: bool) -> Result<PathBuf> {
    let yaml = serde_yaml::to_string(doc).map_err(|e| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("could not render manifest: {e}"),
        ))
    })?;
    let use_err = color_enabled_stderr();
    if dry_run {
        log_info_stderr(
            use_err,
            &format!("devstack: dry-run, skipping write of {}", path.display()),
        );
        return Ok(path.to_path_buf());
    }
    fs::write(path, yaml)?;
    log_info_stderr(use_err, &format!("devstack: wrote {}", path.display()));
    Ok(path.to_path_buf())
}

fn git_annotations(git: &GitInfo) -> BTreeMap<String, String> {
    let mut ann = BTreeMap::new();
    if !git.branch.is_empty() {
        ann.insert("devstack.dev/vcs-branch".to_string(), git.branch.clone());
    }
    if !git.commit.sha.is_empty() {
        ann.insert("devstack.dev/vcs-commit".to_string(), git.commit.sha.clone());
    }
    if !git.commit.url.is_empty() {
        ann.insert("devstack.dev/vcs-commit-url".to_string(), git.commit.url.clone());
    }
    if git.changes_made {
        ann.insert("devstack.dev/vcs-dirty".to_string(), "true".to_string());
    }
    ann
}

/// Generate `app-deploy.yaml` for a plain Deployment.
pub fn gen_deployment_yaml(
    app_name: &str,
    image: &str,
    ports: &[String],
    project_dir: &Path,
    git: Option<&GitInfo>,
    dry_run: bool,
) -> Result<PathBuf> {
    let mut container_ports = Vec::with_capacity(ports.len());
    for p in ports {
        container_ports.push(ContainerPort {
            container_port: parse_port(p)?,
        });
    }
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), app_name.to_string());
    labels.insert("app.kubernetes.io/name".to_string(), app_name.to_string());

    let mut metadata = Metadata::named(app_name);
    metadata.labels = labels.clone();
    if let Some(git) = git {
        metadata.annotations = git_annotations(git);
    }

    let doc = Deployment {
        api_version: "apps/v1".to_string(),
        kind: "Deployment".to_string(),
        metadata,
        spec: DeploymentSpec {
            selector: Selector {
                match_labels: labels.clone(),
            },
            replicas: 1,
            template: PodTemplate {
                metadata: Metadata {
                    name: app_name.to_string(),
                    namespace: None,
                    labels,
                    annotations: BTreeMap::new(),
                },
                spec: PodSpec {
                    containers: vec![Container {
                        name: app_name.to_string(),
                        image: image.to_string(),
                        image_pull_policy: Some("Always".to_string()),
                        ports: container_ports,
                    }],
                },
            },
        },
    };
    write_manifest(&doc, &project_dir.join("app-deploy.yaml"), dry_run)
}

/// Generate `app-service.yaml`: a NodePort service exposing every port.
pub fn gen_service_yaml(
    app_name: &str,
    ports: &[String],
    project_dir: &Path,
    dry_run: bool,
) -> Result<PathBuf> {
    let mut service_ports = Vec::with_capacity(ports.len());
    for (i, p) in ports.iter().enumerate() {
        let port = parse_port(p)?;
        service_ports.push(ServicePort {
            name: format!("port-{i}"),
            port,
            target_port: port,
        });
    }
    let mut selector = BTreeMap::new();
    selector.insert("app".to_string(), app_name.to_string());

    let doc = Service {
        api_version: "v1".to_string(),
        kind: "Service".to_string(),
        metadata: Metadata::named(&format!("{app_name}-service")),
        spec: ServiceSpec {
            selector,
            service_type: "NodePort".to_string(),
            ports: service_ports,
        },
    };
    write_manifest(&doc, &project_dir.join("app-service.yaml"), dry_run)
}

/// Generate `app-ingress.yaml` routing `<app>.<master-ip>.nip.io` to the
/// app's service.
pub fn gen_ingress_yaml(
    app_name: &str,
    host_ip: &str,
    port: u16,
    project_dir: &Path,
    dry_run: bool,
) -> Result<PathBuf> {
    let doc = Ingress {
        api_version: "extensions/v1beta1".to_string(),
        kind: "Ingress".to_string(),
        metadata: Metadata::named(&format!("{app_name}-ingress")),
        spec: IngressSpec {
            rules: vec![IngressRule {
                host: format!("{app_name}.{host_ip}.nip.io"),
                http: IngressHttp {
                    paths: vec![IngressPath {
                        path: "/".to_string(),
                        backend: IngressBackend {
                            service_name: format!("{app_name}-service"),
                            service_port: port,
                        },
                    }],
                },
            }],
        },
    };
    write_manifest(&doc, &project_dir.join("app-ingress.yaml"), dry_run)
}

/// Generate `app-knative.yaml` for Knative serving. Knative allows a single
/// port; the pull policy is `Never` when the image is only available
/// locally.
pub fn gen_knative_yaml(
    service_name: &str,
    image: &str,
    port: u16,
    pull_from_registry: bool,
    project_dir: &Path,
    dry_run: bool,
) -> Result<PathBuf> {
    let doc = KnativeService {
        api_version: "serving.knative.dev/v1alpha1".to_string(),
        kind: "Service".to_string(),
        metadata: Metadata::named(service_name),
        spec: KnativeSpec {
            run_latest: KnativeRunLatest {
                configuration: KnativeConfiguration {
                    revision_template: KnativeRevisionTemplate {
                        spec: KnativeRevisionSpec {
                            container: KnativeContainer {
                                image: image.to_string(),
                                image_pull_policy: if pull_from_registry {
                                    "Always".to_string()
                                } else {
                                    "Never".to_string()
                                },
                                ports: vec![ContainerPort {
                                    container_port: port,
                                }],
                            },
                        },
                    },
                },
            },
        },
    };
    write_manifest(&doc, &project_dir.join("app-knative.yaml"), dry_run)
}

/// Known HTTP ports picked first when selecting the ingress port.
const KNOWN_HTTP_PORTS: &[&str] = &["80", "8080", "8008", "3000", "9080"];

/// Choose the port an ingress should target: a well-known HTTP port when
/// the image exposes one, otherwise the first exposed port. `None` when
/// nothing is exposed or the candidate does not parse.
pub fn select_ingress_port(ports: &[String]) -> Option<u16> {
    for p in ports {
        if KNOWN_HTTP_PORTS.contains(&p.trim()) {
            if let Ok(n) = p.trim().parse::<u16>() {
                return Some(n);
            }
        }
    }
    ports.first().and_then(|p| p.trim().parse::<u16>().ok())
}
