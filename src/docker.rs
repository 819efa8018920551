use std::io::{Read, Write};

use log::{debug, info};

use crate::{process, Result};

pub struct BuildImageOptions<'a> {
    /// Name assigned to the built image.
    pub name: &'a str,
    /// Build context as a tar stream.
    pub stdin: &'a mut (dyn Read + Send),
    /// Receives the build output.
    pub stdout: &'a mut dyn Write,
}

/// The container engine operations needed to build from a context stream.
pub trait Engine {
    /// Pulls the image unconditionally.
    fn pull_image(&self, name: &str) -> Result<()>;

    /// Pulls the image only if it is not available locally.
    fn check_and_pull(&self, name: &str) -> Result<()>;

    fn build_image(&self, opts: BuildImageOptions<'_>) -> Result<()>;
}

/// [`Engine`] backed by the `docker` command line.
#[derive(Debug, Default)]
pub struct DockerCli {
    host: Option<String>,
}

impl DockerCli {
    pub fn new(host: Option<String>) -> Self {
        Self { host }
    }

    fn docker(&self) -> process::Command {
        let command = process::Command::new("docker");
        match &self.host {
            Some(host) => process::args!(command, "--host", host),
            None => command,
        }
    }

    fn image_exists(&self, name: &str) -> Result<bool> {
        let output = process::args!(
            self.docker(),
            "image",
            "inspect",
            "--format",
            "{{.Id}}",
            name
        )
        .try_output()?;
        Ok(output.status.success())
    }
}

impl Engine for DockerCli {
    fn pull_image(&self, name: &str) -> Result<()> {
        info!("Pulling image {name:?}...");
        process::args!(self.docker(), "pull", name).status()?;
        Ok(())
    }

    fn check_and_pull(&self, name: &str) -> Result<()> {
        if self.image_exists(name)? {
            debug!("image {name:?} is available locally");
            return Ok(());
        }
        self.pull_image(name)
    }

    fn build_image(&self, opts: BuildImageOptions<'_>) -> Result<()> {
        let BuildImageOptions { name, stdin, stdout } = opts;
        process::args!(self.docker(), "build", "--tag", name, "-").pipe(stdin, stdout)?;
        Ok(())
    }
}
