use clap::{Parser, Subcommand};

use devstack::describe::DescribeFormat;
use devstack::ColorMode;

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Build the application image from the project directory
    Build {
        /// Tag for the built image (default: project name)
        #[arg(long = "tag", short = 't')]
        tag: Option<String>,
    },

    /// Run the application container locally with stack mounts and ports
    Run {
        /// Override the container name (default: <project>-dev)
        #[arg(long = "name")]
        name: Option<String>,

        /// Publish additional ports (repeatable, host:container)
        #[arg(long = "publish", short = 'p')]
        publish: Vec<String>,
    },

    /// Stop the locally running application container
    Stop {
        /// Override the container name (default: <project>-dev)
        #[arg(long = "name")]
        name: Option<String>,
    },

    /// Build, generate manifests and deploy the application to Kubernetes
    Deploy {
        /// Tag for the deployed image (default: project name)
        #[arg(long = "tag", short = 't')]
        tag: Option<String>,

        /// Target namespace
        #[arg(long = "namespace", short = 'n', default_value = "")]
        namespace: String,

        /// Push the image to DEVSTACK_IMAGE_REGISTRY before deploying
        #[arg(long = "push")]
        push: bool,

        /// Generate a Knative service instead of Deployment + Service
        #[arg(long = "knative")]
        knative: bool,

        /// Generate the manifests but do not apply them
        #[arg(long = "generate-only")]
        generate_only: bool,
    },

    /// Remove the deployed application from Kubernetes
    Delete {
        /// Target namespace
        #[arg(long = "namespace", short = 'n', default_value = "")]
        namespace: String,
    },

    /// Show stack, deployment and container details of the running app
    Describe {
        /// Target namespace
        #[arg(long = "namespace", short = 'n', default_value = "")]
        namespace: String,

        /// Output format: yaml or json
        #[arg(long = "output", short = 'o', value_enum, default_value = "yaml")]
        output: DescribeFormat,
    },

    /// Run diagnostics to check required tools and project layout
    Doctor,
}

#[derive(Parser, Debug)]
#[command(
    name = "devstack",
    version,
    about = "Build, run and deploy stack-based applications with Docker and Kubernetes.",
    after_help = "\n"
)]
pub(crate) struct Cli {
    /// Print detailed execution info
    #[arg(long, global = true)]
    pub(crate) verbose: bool,

    /// Prepare and print what would run, but do not execute
    #[arg(long, global = true)]
    pub(crate) dry_run: bool,

    /// Use buildah instead of docker for image operations
    #[arg(long, global = true)]
    pub(crate) buildah: bool,

    /// Colorize output: auto|always|never
    #[arg(long = "color", value_enum, global = true)]
    pub(crate) color: Option<ColorMode>,

    #[command(subcommand)]
    pub(crate) command: Command,
}
