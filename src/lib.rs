pub mod archive;
pub mod docker;
pub mod entrypoint;
pub mod filesystem;
pub mod git;
pub mod image_name;
pub(crate) mod process;
pub mod strategy;
pub(crate) mod temp_path;

pub mod cli;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = BoxError> = std::result::Result<T, E>;
