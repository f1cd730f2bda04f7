#![allow(clippy::module_name_repetitions)]
//! Container-engine orchestration: runtime discovery, image acquisition,
//! image inspection, mount expansion.

pub mod images;
pub mod inspect;
pub mod mounts;
pub mod runtime;

pub use images::{ensure_image, image_present_locally, push_image, tag_image};
pub use inspect::{exposed_ports, inspect_image, stack_env_var, stack_project_dir, ImageDetails};
pub use mounts::volume_args;
pub use runtime::{container_runtime_path, Engine};
