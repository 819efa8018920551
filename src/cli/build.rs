use std::io::{self, Write};

use clap::Args;
use constcat::concat;
use regex::Regex;

use crate::{
    archive::{self, TarArchiver},
    docker::DockerCli,
    entrypoint,
    filesystem::LocalFileSystem,
    git::GitCli,
    strategy::{BuildRequest, BuildResult, OnBuild},
    Result,
};

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// A local directory, a single file or a git clone URL.
    pub source: String,

    /// The image whose ONBUILD instructions build the source.
    pub base_image: String,

    /// The name of the image to produce.
    pub tag: String,

    /// The branch, tag or commit to check out after cloning. Ignored for local sources.
    #[arg(long = "ref")]
    pub git_ref: Option<String>,

    /// Always pull the base image, falling back to a local copy if the pull fails.
    #[arg(long = "force-pull", default_value_t)]
    pub force_pull: bool,

    /// Keep the working directory after the build for inspection.
    #[arg(long = "preserve-working-dir", default_value_t)]
    pub preserve_working_dir: bool,

    #[arg(
        long = "exclude",
        value_name = "REGEX",
        value_parser = parse_exclude,
        default_value = archive::DEFAULT_EXCLUDE,
        hide_default_value = true,
        help = concat!("Leave out source paths matching this regex from the build context. Paths are relative to the source and separated by \"/\". Defaults to \"", archive::DEFAULT_EXCLUDE, "\", which leaves out \".git\" directories. An empty pattern includes everything.")
    )]
    pub exclude: Regex,

    /// The docker daemon to build with.
    #[arg(long = "docker-host", env = "DOCKER_HOST")]
    pub docker_host: Option<String>,

    /// Print the build result as JSON.
    #[arg(long = "json", default_value_t)]
    pub json: bool,
}

fn parse_exclude(value: &str) -> Result<Regex, regex::Error> {
    Regex::new(value)
}

impl BuildArgs {
    pub fn request(&self) -> BuildRequest {
        BuildRequest {
            source: self.source.clone(),
            git_ref: self.git_ref.clone(),
            base_image: self.base_image.clone(),
            tag: self.tag.clone(),
            force_pull: self.force_pull,
            preserve_working_dir: self.preserve_working_dir,
        }
    }
}

pub fn build(args: BuildArgs) -> Result<()> {
    let request = args.request();
    let BuildArgs {
        exclude,
        docker_host,
        json,
        ..
    } = args;

    let engine = DockerCli::new(docker_host);
    let fs = LocalFileSystem::default();
    let archiver = if exclude.as_str().is_empty() {
        TarArchiver::default()
    } else {
        TarArchiver::with_exclude(exclude)
    };
    let strategy = OnBuild {
        engine: &engine,
        vcs: &GitCli,
        fs: &fs,
        archiver: &archiver,
        guess_entrypoint: entrypoint::guess_entrypoint,
    };

    run(
        &strategy,
        &request,
        json,
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    )
}

/// Runs the build and reports the result on `stdout`. With `json`, the engine's build output goes
/// to `stderr` so that `stdout` carries only the result.
fn run(
    strategy: &OnBuild<'_>,
    request: &BuildRequest,
    json: bool,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    if json {
        let result = strategy.build_with_output(request, stderr)?;
        writeln!(stdout, "{}", serde_json::to_string_pretty(&result)?)?;
    } else {
        let result = strategy.build_with_output(request, stdout)?;
        print_summary(request, &result, stdout)?;
    }
    Ok(())
}

fn print_summary(
    request: &BuildRequest,
    result: &BuildResult,
    out: &mut dyn Write,
) -> Result<()> {
    if request.preserve_working_dir {
        writeln!(out, "Working directory: {}", result.working_dir.display())?;
    }
    writeln!(out, "Built image {:?}", result.image_id)?;
    Ok(())
}
