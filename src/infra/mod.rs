pub mod compose_adapter;
pub mod config;

pub use compose_adapter::{ComposeOptions, DockerCompose, DockerContainer, Engine, ImageRemoval};
pub use config::{HooksConfig, load_hooks_config};
