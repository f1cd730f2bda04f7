use std::process::ExitCode;

use clap::Parser;

use devstack::{exit_code_for_error, log_error_stderr, ProcessRunner};

mod cli;
mod commands;

use cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(mode) = cli.color {
        devstack::set_color_mode(mode);
    }

    let cwd = match std::env::current_dir() {
        Ok(d) => d,
        Err(e) => {
            let use_err = devstack::color_enabled_stderr();
            log_error_stderr(use_err, &format!("devstack: cannot determine cwd: {e}"));
            return ExitCode::from(1);
        }
    };

    let mut config = devstack::config::RunConfig::new(cwd);
    config.dry_run = cli.dry_run;
    config.verbose = cli.verbose;
    config.buildah = cli.buildah;

    let runner = ProcessRunner;

    let result = match &cli.command {
        Command::Build { tag } => {
            commands::run_build(&runner, &mut config, tag.as_deref()).map(|_| ())
        }
        Command::Run { name, publish } => {
            commands::run_run(&runner, &mut config, name.as_deref(), publish)
        }
        Command::Stop { name } => commands::run_stop(&runner, &mut config, name.as_deref()),
        Command::Deploy {
            tag,
            namespace,
            push,
            knative,
            generate_only,
        } => commands::run_deploy(
            &runner,
            &mut config,
            &commands::DeployOptions {
                tag: tag.as_deref(),
                namespace,
                push: *push,
                knative: *knative,
                generate_only: *generate_only,
            },
        ),
        Command::Delete { namespace } => commands::run_delete(&runner, &mut config, namespace),
        Command::Describe { namespace, output } => {
            commands::run_describe(&runner, &mut config, namespace, *output)
        }
        Command::Doctor => commands::run_doctor(&runner, &config),
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            let use_err = devstack::color_enabled_stderr();
            log_error_stderr(use_err, &format!("devstack: {e:#}"));
            let code = match e.downcast_ref::<devstack::Error>() {
                Some(err) => exit_code_for_error(err),
                None => 1,
            };
            ExitCode::from(code)
        }
    }
}
