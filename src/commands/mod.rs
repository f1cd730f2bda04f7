use std::path::Path;

use anyhow::{Context, Result};

use devstack::config::RunConfig;
use devstack::describe::{describe_app, render, DescribeFormat};
use devstack::engine::{
    ensure_image, exposed_ports, push_image, stack_project_dir, tag_image, volume_args, Engine,
};
use devstack::exec::{CommandSpec, LogSink, ProcessRunner, Runner};
use devstack::git::git_info;
use devstack::kube::{deployment_url, kube_apply, kube_delete, master_ip};
use devstack::manifest::{
    gen_deployment_yaml, gen_ingress_yaml, gen_knative_yaml, gen_service_yaml, select_ingress_port,
};
use devstack::{color_enabled_stderr, log_info_stderr, log_warn_stderr};

const MANIFEST_FILES: &[&str] = &[
    "app-knative.yaml",
    "app-ingress.yaml",
    "app-service.yaml",
    "app-deploy.yaml",
];

fn engine_binary(config: &RunConfig) -> &'static str {
    Engine::from_flags(config.buildah).binary()
}

/// Build the application image, tagged with `tag` (default: project name).
/// Returns the tag the image was built under.
pub fn run_build(
    runner: &ProcessRunner,
    config: &mut RunConfig,
    tag: Option<&str>,
) -> Result<String> {
    let project_dir = config.checked_project_dir()?.to_path_buf();
    let name = config.project_name()?;
    let tag = tag.map_or(name, str::to_string);

    let stack_image = config.project_config()?.stack_image.clone();
    if config.verbose {
        let use_err = color_enabled_stderr();
        log_info_stderr(use_err, &format!("devstack: stack image: {stack_image}"));
        log_info_stderr(use_err, &format!("devstack: build tag: {tag}"));
    }
    ensure_image(runner, &stack_image, config)
        .with_context(|| format!("could not acquire stack image {stack_image}"))?;

    let spec = CommandSpec::new(engine_binary(config))
        .arg("build")
        .arg("-t")
        .arg(&tag)
        .arg(project_dir.display().to_string())
        .dry_run(config.dry_run);
    runner
        .stream_to(&spec, std::sync::Arc::new(LogSink))
        .with_context(|| format!("image build failed for {tag}"))?;

    let use_err = color_enabled_stderr();
    log_info_stderr(use_err, &format!("devstack: built image {tag}"));
    Ok(tag)
}

fn default_container_name(config: &RunConfig) -> Result<String> {
    Ok(format!("{}-dev", config.project_name()?))
}

/// Run the application container with stack mounts, the project directory
/// mounted at the stack's project dir, and every exposed port published.
pub fn run_run(
    runner: &ProcessRunner,
    config: &mut RunConfig,
    name: Option<&str>,
    publish: &[String],
) -> Result<()> {
    let project_dir = config.checked_project_dir()?.to_path_buf();
    let stack_image = config.project_config()?.stack_image.clone();
    ensure_image(runner, &stack_image, config)
        .with_context(|| format!("could not acquire stack image {stack_image}"))?;

    let container_name = match name {
        Some(n) => n.to_string(),
        None => default_container_name(config)?,
    };

    let mut spec = CommandSpec::new(engine_binary(config))
        .arg("run")
        .arg("--rm")
        .arg("--name")
        .arg(&container_name)
        .dry_run(config.dry_run);

    let mounts = volume_args(runner, config)?;
    spec = spec.args(mounts);

    let in_image_dir = stack_project_dir(runner, config)?;
    spec = spec
        .arg("-v")
        .arg(format!("{}:{in_image_dir}", project_dir.display()));

    match exposed_ports(runner, config) {
        Ok(ports) => {
            for p in &ports {
                spec = spec.arg("-p").arg(format!("{p}:{p}"));
            }
        }
        Err(e) => {
            let use_err = color_enabled_stderr();
            log_warn_stderr(
                use_err,
                &format!("devstack: could not determine exposed ports: {e}"),
            );
        }
    }
    for p in publish {
        spec = spec.arg("-p").arg(p);
    }
    spec = spec.arg(&stack_image);

    runner
        .stream_to(&spec, std::sync::Arc::new(LogSink))
        .with_context(|| format!("container {container_name} exited with an error"))?;
    Ok(())
}

/// Stop the locally running application container.
pub fn run_stop(runner: &ProcessRunner, config: &mut RunConfig, name: Option<&str>) -> Result<()> {
    let container_name = match name {
        Some(n) => n.to_string(),
        None => default_container_name(config)?,
    };
    let use_err = color_enabled_stderr();
    log_info_stderr(
        use_err,
        &format!("devstack: stopping container {container_name}"),
    );
    let spec = CommandSpec::new(engine_binary(config))
        .arg("stop")
        .arg(&container_name)
        .dry_run(config.dry_run);
    runner
        .capture(&spec)
        .with_context(|| format!("could not stop container {container_name}"))?;
    Ok(())
}

pub struct DeployOptions<'a> {
    pub tag: Option<&'a str>,
    pub namespace: &'a str,
    pub push: bool,
    pub knative: bool,
    pub generate_only: bool,
}

/// Build the image, synthesize Kubernetes manifests and apply them.
pub fn run_deploy(runner: &ProcessRunner, config: &mut RunConfig, opts: &DeployOptions) -> Result<()> {
    let use_err = color_enabled_stderr();
    let project_dir = config.checked_project_dir()?.to_path_buf();
    let name = config.project_name()?;

    let tag = run_build(runner, config, opts.tag)?;

    // The image reference the cluster will pull, when pushing to a registry.
    let deploy_image = if opts.push {
        let registry = std::env::var("DEVSTACK_IMAGE_REGISTRY").unwrap_or_default();
        let remote = if registry.is_empty() {
            tag.clone()
        } else {
            format!("{}/{tag}", registry.trim_end_matches('/'))
        };
        if remote != tag {
            tag_image(runner, &tag, &remote, config.dry_run)?;
        }
        push_image(runner, &remote, config.dry_run)?;
        remote
    } else {
        tag.clone()
    };

    let ports = match exposed_ports(runner, config) {
        Ok(ports) => ports,
        Err(e) => {
            log_warn_stderr(
                use_err,
                &format!("devstack: could not determine exposed ports: {e}"),
            );
            Vec::new()
        }
    };

    let git = match git_info(runner, config.dry_run) {
        Ok(info) => Some(info),
        Err(e) => {
            log_warn_stderr(
                use_err,
                &format!("devstack: git details unavailable, deploying without annotations: {e}"),
            );
            None
        }
    };

    let mut generated = Vec::new();
    if opts.knative {
        let port = select_ingress_port(&ports).unwrap_or(8080);
        generated.push(gen_knative_yaml(
            &name,
            &deploy_image,
            port,
            opts.push,
            &project_dir,
            config.dry_run,
        )?);
    } else {
        generated.push(gen_deployment_yaml(
            &name,
            &deploy_image,
            &ports,
            &project_dir,
            git.as_ref(),
            config.dry_run,
        )?);
        generated.push(gen_service_yaml(&name, &ports, &project_dir, config.dry_run)?);
        if let Some(port) = select_ingress_port(&ports) {
            let ip = master_ip(runner, config.dry_run);
            generated.push(gen_ingress_yaml(&name, &ip, port, &project_dir, config.dry_run)?);
        }
    }

    if opts.generate_only {
        log_info_stderr(use_err, "devstack: manifests generated; not applying");
        return Ok(());
    }

    for file in &generated {
        kube_apply(
            runner,
            &file.display().to_string(),
            opts.namespace,
            config.dry_run,
        )?;
    }

    match deployment_url(runner, &name, opts.namespace, config.dry_run) {
        Ok(url) if !url.is_empty() => println!("Deployed project will be available at {url}"),
        _ => log_warn_stderr(
            use_err,
            "devstack: deployed, but no exposed URL was found yet",
        ),
    }
    Ok(())
}

/// Delete the deployed application by removing every generated manifest
/// that is present in the project directory.
pub fn run_delete(runner: &ProcessRunner, config: &mut RunConfig, namespace: &str) -> Result<()> {
    let project_dir = config.checked_project_dir()?.to_path_buf();
    let mut removed_any = false;
    for file in MANIFEST_FILES {
        let path = project_dir.join(file);
        if path.exists() {
            kube_delete(runner, &path.display().to_string(), namespace, config.dry_run)?;
            removed_any = true;
        }
    }
    if !removed_any {
        let use_err = color_enabled_stderr();
        log_warn_stderr(use_err, "devstack: no generated manifests found to delete");
    }
    Ok(())
}

/// Describe the deployed application, rendered as YAML or JSON on stdout.
pub fn run_describe(
    runner: &ProcessRunner,
    config: &mut RunConfig,
    namespace: &str,
    output: DescribeFormat,
) -> Result<()> {
    let name = config.project_name()?;
    let info = describe_app(runner, &name, namespace, config.dry_run)?;
    print!("{}", render(&info, output)?);
    Ok(())
}

fn doctor_tool(runner: &ProcessRunner, tool: &str, version_args: &[&str]) {
    match which::which(tool) {
        Ok(path) => {
            eprintln!("  {tool}: {}", path.display());
            let spec = CommandSpec::new(tool).args(version_args.iter().copied());
            if let Ok(out) = runner.capture(&spec) {
                let first = out.stdout.lines().next().unwrap_or("").trim();
                if !first.is_empty() {
                    eprintln!("  {tool} version: {first}");
                }
            }
        }
        Err(_) => eprintln!("  {tool}: not found"),
    }
}

/// Check that every external tool is present and the project layout is sane.
pub fn run_doctor(runner: &ProcessRunner, config: &RunConfig) -> Result<()> {
    eprintln!("devstack doctor");
    eprintln!("  version: v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "  built: {} ({}, {})",
        env!("DEVSTACK_BUILD_DATE"),
        env!("DEVSTACK_BUILD_TARGET"),
        env!("DEVSTACK_BUILD_PROFILE")
    );
    eprintln!("  rustc: {}", env!("DEVSTACK_BUILD_RUSTC"));
    eprintln!(
        "  host: {} / {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    match devstack::engine::container_runtime_path() {
        Ok(path) => {
            eprintln!("  docker: {}", path.display());
            let spec = CommandSpec::new("docker").arg("--version");
            if let Ok(out) = runner.capture(&spec) {
                let first = out.stdout.lines().next().unwrap_or("").trim();
                if !first.is_empty() {
                    eprintln!("  docker version: {first}");
                }
            }
        }
        Err(e) => eprintln!("  docker: not found ({e})"),
    }
    doctor_tool(runner, "buildah", &["--version"]);
    doctor_tool(runner, "kubectl", &["version", "--client"]);
    doctor_tool(runner, "git", &["--version"]);

    let registry = std::env::var("DEVSTACK_IMAGE_REGISTRY").unwrap_or_default();
    if registry.is_empty() {
        eprintln!("  registry: Docker Hub (no prefix)");
    } else {
        eprintln!("  registry: {registry}");
    }

    match config.checked_project_dir() {
        Ok(dir) => eprintln!("  project: {}", dir.display()),
        Err(e) => eprintln!("  project: {e}"),
    }
    let config_path: &Path = &config.project_dir.join(devstack::config::CONFIG_FILE);
    if config_path.exists() {
        eprintln!("  config: {}", config_path.display());
    } else {
        eprintln!("  config: {} not found", config_path.display());
    }

    eprintln!("doctor: completed diagnostics.");
    Ok(())
}
