use std::{
    io::{self, Read, Write},
    path::Path,
};

use log::{debug, info, warn};

use super::{BuildRequest, BuildResult, Error, Phase, ResultExt, Strategy, Workspace};
use crate::{
    archive::Archiver,
    docker::{BuildImageOptions, Engine},
    filesystem::FileSystem,
    git::Vcs,
    Result,
};

pub const DOCKERFILE_NAME: &str = "Dockerfile";

/// Infers the command that starts the application in a source directory.
pub type GuessEntrypoint = fn(&Path) -> Result<String>;

/// Builds an image by extending a base image that carries ONBUILD instructions. The source is
/// staged next to a generated `Dockerfile` and sent to the engine as the build context.
pub struct OnBuild<'a> {
    pub engine: &'a dyn Engine,
    pub vcs: &'a dyn Vcs,
    pub fs: &'a dyn FileSystem,
    pub archiver: &'a dyn Archiver,
    pub guess_entrypoint: GuessEntrypoint,
}

/// Returns the contents of a `Dockerfile` deriving from `base_image` and running `entrypoint`.
pub fn dockerfile(base_image: &str, entrypoint: &str) -> String {
    let cmd = serde_json::json!([entrypoint]);
    format!("FROM {base_image}\nCMD {cmd}\n")
}

impl Strategy for OnBuild<'_> {
    fn build(&self, request: &BuildRequest) -> Result<BuildResult, Error> {
        self.build_with_output(request, &mut io::stdout().lock())
    }
}

impl OnBuild<'_> {
    /// Like [`Strategy::build`], relaying the engine's build output to `output`.
    pub fn build_with_output(
        &self,
        request: &BuildRequest,
        output: &mut dyn Write,
    ) -> Result<BuildResult, Error> {
        request.validate()?;

        debug!("Preparing the source code for build");
        let workspace = self.prepare(request)?;

        let built = self.build_prepared(request, &workspace, output);

        debug!("Cleaning up the working directory");
        self.cleanup(request, &workspace);

        built?;
        Ok(BuildResult {
            success: true,
            working_dir: workspace.dir().to_owned(),
            image_id: request.tag.clone(),
            messages: workspace.messages().to_vec(),
        })
    }

    fn build_prepared(
        &self,
        request: &BuildRequest,
        workspace: &Workspace,
        output: &mut dyn Write,
    ) -> Result<(), Error> {
        debug!("Creating application Dockerfile");
        self.create_dockerfile(request, workspace)?;

        debug!("Creating application source archive");
        let mut tar_stream = self.source_tar(workspace)?;

        info!(
            "Building {tag:?} from {base_image:?}...",
            tag = request.tag,
            base_image = request.base_image
        );
        self.engine
            .build_image(BuildImageOptions {
                name: &request.tag,
                stdin: &mut *tar_stream,
                stdout: output,
            })
            .phase(Phase::Build)
    }

    /// Makes the base image available and stages the source in a new [`Workspace`]. The
    /// workspace is cleaned up again if staging the source fails.
    pub fn prepare(&self, request: &BuildRequest) -> Result<Workspace, Error> {
        let mut pull_warning = None;
        if request.force_pull {
            if let Err(error) = self.engine.pull_image(&request.base_image) {
                let message = format!(
                    "failed to pull {base_image:?}, using the local image if present: {error}",
                    base_image = request.base_image
                );
                warn!("{message}");
                pull_warning = Some(message);
            }
        } else {
            self.engine
                .check_and_pull(&request.base_image)
                .phase(Phase::PullImage)?;
        }

        let dir = self
            .fs
            .create_working_directory()
            .phase(Phase::WorkingDir)?;
        let mut workspace = Workspace::new(dir);
        workspace.messages.extend(pull_warning);

        if let Err(error) = self.fetch_source(request, &workspace) {
            self.cleanup(request, &workspace);
            return Err(error);
        }

        Ok(workspace)
    }

    fn fetch_source(&self, request: &BuildRequest, workspace: &Workspace) -> Result<(), Error> {
        let target_dir = workspace.upload_dir();

        if !self.vcs.valid_clone_spec(&request.source) {
            if let Some(git_ref) = &request.git_ref {
                warn!(
                    "Ignoring ref {git_ref:?} because {source:?} is not a git repository",
                    source = request.source
                );
            }
            return self
                .fs
                .copy(Path::new(&request.source), &target_dir)
                .phase(Phase::Copy);
        }

        self.vcs
            .clone(&request.source, &target_dir)
            .phase(Phase::Clone)?;

        let Some(git_ref) = request.git_ref.as_deref().filter(|r| !r.is_empty()) else {
            return Ok(());
        };

        self.vcs
            .checkout(&target_dir, git_ref)
            .phase(Phase::Checkout)
    }

    /// Writes the `Dockerfile` into the staged source, replacing any existing one.
    pub fn create_dockerfile(
        &self,
        request: &BuildRequest,
        workspace: &Workspace,
    ) -> Result<(), Error> {
        let upload_dir = workspace.upload_dir();
        let entrypoint = (self.guess_entrypoint)(&upload_dir).phase(Phase::Entrypoint)?;
        debug!("entrypoint: {entrypoint:?}");

        self.fs
            .write_file(
                &upload_dir.join(DOCKERFILE_NAME),
                dockerfile(&request.base_image, &entrypoint).as_bytes(),
            )
            .phase(Phase::Dockerfile)
    }

    /// Archives the staged source and opens the archive for reading.
    pub fn source_tar(&self, workspace: &Workspace) -> Result<Box<dyn Read + Send>, Error> {
        let tar_file = self
            .archiver
            .create_tar_file(workspace.dir(), &workspace.upload_dir())
            .phase(Phase::Archive)?;
        self.fs.open(&tar_file).phase(Phase::Archive)
    }

    /// Removes the working directory unless the request asks to keep it. Failures are logged.
    pub fn cleanup(&self, request: &BuildRequest, workspace: &Workspace) {
        if request.preserve_working_dir {
            info!("Preserving working directory {:?}", workspace.dir());
            return;
        }
        if let Err(error) = self.fs.remove_directory(workspace.dir()) {
            warn!(
                "Failed to remove working directory {:?}: {error}",
                workspace.dir()
            );
        }
    }
}
