mod build;

use clap::{Parser, Subcommand};

use crate::Result;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build an image from source by extending a base image that carries ONBUILD instructions
    #[command(arg_required_else_help = true)]
    Build(build::BuildArgs),
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Build(args) => {
                build::build(args)?;
            }
        }

        Ok(())
    }
}
