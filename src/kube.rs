#![allow(clippy::module_name_repetitions)]
//! kubectl wrappers: get/apply/delete plus deployed-URL discovery.

use crate::color::{color_enabled_stderr, log_info_stderr, log_warn_stderr};
use crate::errors::Result;
use crate::exec::{CommandSpec, Runner};

fn kubectl_spec(args: Vec<String>, namespace: &str, dry_run: bool) -> CommandSpec {
    let mut spec = CommandSpec::new("kubectl").args(args);
    if !namespace.is_empty() {
        spec = spec.arg("--namespace").arg(namespace);
    }
    spec.dry_run(dry_run)
}

/// `kubectl get <args...>`, capturing stdout.
pub fn kube_get(
    runner: &dyn Runner,
    args: &[&str],
    namespace: &str,
    dry_run: bool,
) -> Result<String> {
    let mut argv = vec!["get".to_string()];
    argv.extend(args.iter().map(|s| s.to_string()));
    let out = runner.capture(&kubectl_spec(argv, namespace, dry_run))?;
    Ok(out.stdout)
}

/// `kubectl apply -f <file>`.
pub fn kube_apply(runner: &dyn Runner, file: &str, namespace: &str, dry_run: bool) -> Result<()> {
    let use_err = color_enabled_stderr();
    log_info_stderr(use_err, &format!("devstack: applying {file}"));
    let argv = vec!["apply".to_string(), "-f".to_string(), file.to_string()];
    runner.capture(&kubectl_spec(argv, namespace, dry_run)).map(|_| ())
}

/// `kubectl delete -f <file>`. Stderr of a failed delete reaches the caller
/// verbatim inside the error.
pub fn kube_delete(runner: &dyn Runner, file: &str, namespace: &str, dry_run: bool) -> Result<()> {
    let use_err = color_enabled_stderr();
    log_info_stderr(use_err, &format!("devstack: deleting {file}"));
    let argv = vec!["delete".to_string(), "-f".to_string(), file.to_string()];
    runner.capture(&kubectl_spec(argv, namespace, dry_run)).map(|_| ())
}

/// NodePort URL of a deployed service.
pub fn node_port_url(
    runner: &dyn Runner,
    service: &str,
    namespace: &str,
    dry_run: bool,
) -> Result<String> {
    let svc = format!("{service}-service");
    kube_get(
        runner,
        &[
            "svc",
            &svc,
            "-o",
            "jsonpath=http://{.status.loadBalancer.ingress[0].hostname}:{.spec.ports[0].nodePort}",
        ],
        namespace,
        dry_run,
    )
}

/// OpenShift route host of a deployed service.
pub fn route_url(
    runner: &dyn Runner,
    service: &str,
    namespace: &str,
    dry_run: bool,
) -> Result<String> {
    kube_get(
        runner,
        &["route", service, "-o", "jsonpath={.status.ingress[0].host}"],
        namespace,
        dry_run,
    )
}

/// Knative route URL of a deployed service.
pub fn knative_url(
    runner: &dyn Runner,
    service: &str,
    namespace: &str,
    dry_run: bool,
) -> Result<String> {
    kube_get(
        runner,
        &["rt", service, "-o", "jsonpath={.status.url}"],
        namespace,
        dry_run,
    )
}

/// Search for an exposed hostname/port of the deployed service: Knative
/// route first, then OpenShift route, then NodePort.
pub fn deployment_url(
    runner: &dyn Runner,
    service: &str,
    namespace: &str,
    dry_run: bool,
) -> Result<String> {
    if let Ok(url) = knative_url(runner, service, namespace, dry_run) {
        return Ok(url);
    }
    if let Ok(url) = route_url(runner, service, namespace, dry_run) {
        return Ok(url);
    }
    node_port_url(runner, service, namespace, dry_run)
}

/// Internal IP of the master node; `x.x.x.x` when unresolvable.
pub fn master_ip(runner: &dyn Runner, dry_run: bool) -> String {
    let res = kube_get(
        runner,
        &[
            "node",
            "--selector",
            "node-role.kubernetes.io/master",
            "-o",
            "jsonpath={.items[0].status.addresses[?(.type==\"InternalIP\")].address}",
        ],
        "",
        dry_run,
    );
    match res {
        Ok(ip) if !ip.trim().is_empty() => ip.trim().to_string(),
        _ => {
            let use_err = color_enabled_stderr();
            log_warn_stderr(
                use_err,
                "devstack: could not resolve the master node IP; using x.x.x.x",
            );
            "x.x.x.x".to_string()
        }
    }
}
