mod onbuild;

pub use onbuild::*;

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::image_name;

#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// A filesystem path or a clone spec. The [`crate::git::Vcs`] decides which.
    pub source: String,
    /// Revision to check out after cloning. Ignored for filesystem sources.
    pub git_ref: Option<String>,
    /// Image providing the ONBUILD instructions.
    pub base_image: String,
    /// Name of the produced image.
    pub tag: String,
    pub force_pull: bool,
    pub preserve_working_dir: bool,
}

impl BuildRequest {
    pub fn validate(&self) -> Result<(), Error> {
        if self.source.trim().is_empty() {
            return Err(Error::new(Phase::Validation, "source must not be empty"));
        }
        image_name::validate(&self.base_image)
            .map_err(|error| Error::new(Phase::Validation, format!("base image: {error}")))?;
        image_name::validate(&self.tag)
            .map_err(|error| Error::new(Phase::Validation, format!("tag: {error}")))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BuildResult {
    pub success: bool,
    pub working_dir: PathBuf,
    pub image_id: String,
    /// Non-fatal problems encountered during the build.
    pub messages: Vec<String>,
}

/// The per-build working tree. Source lives under `<dir>/upload/src`.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    messages: Vec<String>,
}

impl Workspace {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            messages: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.dir.join("upload").join("src")
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

/// Turns source plus a base image into a runnable image.
pub trait Strategy {
    fn build(&self, request: &BuildRequest) -> Result<BuildResult, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validation,
    PullImage,
    WorkingDir,
    Copy,
    Clone,
    Checkout,
    Entrypoint,
    Dockerfile,
    Archive,
    Build,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Validation,
    Acquisition,
    Inference,
    DescriptorWrite,
    Packaging,
    Engine,
}

impl Phase {
    pub const fn category(self) -> Category {
        match self {
            Phase::Validation => Category::Validation,
            Phase::WorkingDir | Phase::Copy | Phase::Clone | Phase::Checkout => {
                Category::Acquisition
            }
            Phase::Entrypoint => Category::Inference,
            Phase::Dockerfile => Category::DescriptorWrite,
            Phase::Archive => Category::Packaging,
            Phase::PullImage | Phase::Build => Category::Engine,
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Phase::Validation => "invalid build request",
            Phase::PullImage => "failed to pull the base image",
            Phase::WorkingDir => "failed to create the working directory",
            Phase::Copy => "failed to copy the source",
            Phase::Clone => "failed to clone the source",
            Phase::Checkout => "failed to check out the requested ref",
            Phase::Entrypoint => "failed to determine the entrypoint",
            Phase::Dockerfile => "failed to write the Dockerfile",
            Phase::Archive => "failed to archive the source",
            Phase::Build => "failed to build the image",
        }
    }
}

#[derive(Debug)]
pub struct Error {
    phase: Phase,
    source: crate::BoxError,
}

impl Error {
    pub fn new(phase: Phase, source: impl Into<crate::BoxError>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The error reported by the collaborator, unchanged.
    pub fn into_source(self) -> crate::BoxError {
        self.source
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.phase.description(), self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

/// Attaches a [`Phase`] to a collaborator result.
trait ResultExt<T> {
    fn phase(self, phase: Phase) -> Result<T, Error>;
}

impl<T> ResultExt<T> for crate::Result<T> {
    fn phase(self, phase: Phase) -> Result<T, Error> {
        self.map_err(|source| Error { phase, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BuildRequest {
        BuildRequest {
            source: "/tmp/app".to_owned(),
            base_image: "base:latest".to_owned(),
            tag: "out:1".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn empty_source_is_invalid() {
        let error = BuildRequest {
            source: " ".to_owned(),
            ..request()
        }
        .validate()
        .unwrap_err();
        assert_eq!(error.phase(), Phase::Validation);
    }

    #[test]
    fn malformed_images_are_invalid() {
        let error = BuildRequest {
            base_image: "Base Image".to_owned(),
            ..request()
        }
        .validate()
        .unwrap_err();
        assert!(error
            .to_string()
            .starts_with("invalid build request: base image:"));

        let error = BuildRequest {
            tag: String::new(),
            ..request()
        }
        .validate()
        .unwrap_err();
        assert!(error.to_string().starts_with("invalid build request: tag:"));
    }

    #[test]
    fn error_exposes_phase_and_source() {
        let error = Error::new(Phase::Checkout, "unknown revision");
        assert_eq!(error.phase().category(), Category::Acquisition);
        assert_eq!(
            error.to_string(),
            "failed to check out the requested ref: unknown revision"
        );
        assert_eq!(
            std::error::Error::source(&error).unwrap().to_string(),
            "unknown revision"
        );
        assert_eq!(error.into_source().to_string(), "unknown revision");
    }

    #[test]
    fn workspace_layout() {
        let workspace = Workspace::new(PathBuf::from("/tmp/onbuild123"));
        assert_eq!(
            workspace.upload_dir(),
            PathBuf::from("/tmp/onbuild123/upload/src")
        );
        assert!(workspace.messages().is_empty());
    }
}
