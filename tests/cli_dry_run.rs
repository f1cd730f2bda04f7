use std::fs;
use std::process::Command;

#[test]
fn test_cli_dry_run_build_previews_commands() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join(".devstack.yaml"),
        "stack: devstack/nodejs-express:0.4\n",
    )
    .expect("write project config");

    let bin = env!("CARGO_BIN_EXE_devstack");
    let out = Command::new(bin)
        .current_dir(dir.path())
        .env("DEVSTACK_PULL_POLICY", "Always")
        .env_remove("DEVSTACK_IMAGE_REGISTRY")
        .args(["--dry-run", "build"])
        .output()
        .expect("failed to run devstack --dry-run build");

    assert!(
        out.status.success(),
        "devstack --dry-run build exited non-zero: {:?}\nstdout:\n{}\nstderr:\n{}",
        out.status.code(),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    let err = String::from_utf8_lossy(&out.stderr);
    assert!(
        err.contains("dry-run, skipping:"),
        "expected dry-run previews in stderr, got:\n{err}"
    );
    assert!(
        err.contains("docker pull devstack/nodejs-express:0.4"),
        "expected a stack image pull preview, got:\n{err}"
    );
    assert!(
        err.contains("docker build -t"),
        "expected a build preview, got:\n{err}"
    );
}

#[test]
fn test_cli_build_outside_project_fails_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");

    let bin = env!("CARGO_BIN_EXE_devstack");
    let out = Command::new(bin)
        .current_dir(dir.path())
        .args(["--dry-run", "build"])
        .output()
        .expect("failed to run devstack build");

    assert!(!out.status.success());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(
        err.contains(".devstack.yaml"),
        "expected a missing-config explanation, got:\n{err}"
    );
}

#[test]
fn test_cli_dry_run_deploy_generates_no_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join(".devstack.yaml"),
        "stack: devstack/nodejs-express:0.4\n",
    )
    .expect("write project config");

    let bin = env!("CARGO_BIN_EXE_devstack");
    let out = Command::new(bin)
        .current_dir(dir.path())
        .env("DEVSTACK_PULL_POLICY", "Always")
        .env_remove("DEVSTACK_IMAGE_REGISTRY")
        .args(["--dry-run", "deploy", "--generate-only"])
        .output()
        .expect("failed to run devstack --dry-run deploy");

    assert!(
        out.status.success(),
        "devstack --dry-run deploy exited non-zero:\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    for f in ["app-deploy.yaml", "app-service.yaml", "app-ingress.yaml"] {
        assert!(
            !dir.path().join(f).exists(),
            "dry-run must not write {f}"
        );
    }
}
