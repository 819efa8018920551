use std::{
    ffi::OsStr,
    fmt,
    io::{self, Read, Write},
    num::NonZeroI32,
    process,
};

use log::debug;

pub struct Command(process::Command);

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Command {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self(process::Command::new(program))
    }

    pub fn args<'a, I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = &'a OsStr>,
    {
        self.0.args(args);
        self
    }

    pub fn try_status(mut self) -> Result<ExitStatus, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("running `{command:?}`...", command = &self.0);
        }

        match self.0.status() {
            Ok(status) => Ok(ExitStatus {
                command: self,
                status,
            }),
            Err(error) => Err(Error {
                command: self,
                kind: error.into(),
            }),
        }
    }

    pub fn status(self) -> Result<(), Error> {
        self.try_status().and_then(ExitStatus::require_success)
    }

    pub fn try_output(mut self) -> Result<Output, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("capturing `{command:?}`...", command = &self.0);
        }

        match self.0.output() {
            Ok(output) => Ok(Output {
                command: self,
                output,
            }),
            Err(error) => Err(Error {
                command: self,
                kind: error.into(),
            }),
        }
    }

    pub fn output(self) -> Result<Output, Error> {
        self.try_output().and_then(Output::require_success)
    }

    /// Runs the command with `input` copied into its stdin and its stdout relayed to `output`.
    /// Stderr is inherited. Stdin is closed once `input` is exhausted.
    pub fn pipe(
        mut self,
        input: &mut (dyn Read + Send),
        output: &mut dyn Write,
    ) -> Result<(), Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("piping through `{command:?}`...", command = &self.0);
        }

        let mut child = match self
            .0
            .stdin(process::Stdio::piped())
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::inherit())
            .spawn()
        {
            Ok(child) => child,
            Err(error) => {
                return Err(Error {
                    command: self,
                    kind: error.into(),
                })
            }
        };

        let (Some(mut stdin), Some(mut stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(Error {
                command: self,
                kind: ErrorKind::Io(io::Error::other("child stdio was not captured")),
            });
        };

        let relayed = std::thread::scope(|scope| {
            let writer = scope.spawn(move || -> io::Result<()> {
                io::copy(input, &mut stdin)?;
                // Dropping stdin signals end of input.
                drop(stdin);
                Ok(())
            });
            let read = io::copy(&mut stdout, output).and_then(|_| output.flush());
            if read.is_err() {
                // The child blocks on a full stdout pipe unless someone keeps reading it.
                let _ = io::copy(&mut stdout, &mut io::sink());
            }
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
            // A child that exits early closes its stdin, its exit status is more telling.
            match written {
                Err(error) if error.kind() != io::ErrorKind::BrokenPipe => Err(error),
                _ => read,
            }
        });

        let status = match child.wait() {
            Ok(status) => status,
            Err(error) => {
                return Err(Error {
                    command: self,
                    kind: ErrorKind::Io(error),
                })
            }
        };

        if !status.success() {
            return ExitStatus {
                command: self,
                status,
            }
            .require_success();
        }

        relayed.map_err(|error| Error {
            command: self,
            kind: ErrorKind::Io(error),
        })
    }
}

#[derive(Debug)]
pub struct ExitStatus {
    command: Command,
    status: process::ExitStatus,
}

impl ExitStatus {
    pub fn require_success(self) -> Result<(), Error> {
        let ExitStatus { command, status } = self;
        if status.success() {
            Ok(())
        } else {
            Err(Error {
                command,
                kind: ErrorKind::NonZeroExitStatus(status.code().and_then(NonZeroI32::new)),
            })
        }
    }
}

#[derive(Debug)]
pub struct Output {
    pub command: Command,
    pub output: process::Output,
}

impl Output {
    pub fn require_success(self) -> Result<Output, Error> {
        let Output { command, output } = self;
        if output.status.success() {
            Ok(Output { command, output })
        } else {
            Err(Error {
                command,
                kind: ErrorKind::NonZeroExitStatus(output.status.code().and_then(NonZeroI32::new)),
            })
        }
    }
}

impl std::ops::Deref for Output {
    type Target = process::Output;

    fn deref(&self) -> &Self::Target {
        &self.output
    }
}

#[derive(Debug)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    NonZeroExitStatus(Option<NonZeroI32>),
    Io(io::Error),
}

impl From<io::Error> for ErrorKind {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Io(value),
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub command: Command,
    pub kind: ErrorKind,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to run `{command:?}`: ",
            command = &self.command.0
        )?;
        match &self.kind {
            ErrorKind::NotFound => {
                let program = self.command.0.get_program().to_string_lossy();
                write!(f, "the `{program}` command is required but not available on your system, please install it")
            }
            ErrorKind::PermissionDenied => {
                let program = self.command.0.get_program().to_string_lossy();
                write!(f, "the `{program}` command is available but does not have the right permissions, please make sure the binary is executable")
            }
            ErrorKind::NonZeroExitStatus(code) => {
                if let Some(code) = code {
                    write!(f, "exited with non-zero exit code `{code}`")
                } else {
                    write!(f, "did not run successfully")
                }
            }
            ErrorKind::Io(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(error) => Some(error),
            _ => None,
        }
    }
}

/// Creates a new [`Command`] and supplies the provided arguments, if any, while calling
/// [`std::convert::AsRef::as_ref`] on each.
macro_rules! command {
    ($program:expr, $($arg:expr),* $(,)?) => {
        $crate::process::args!($crate::process::Command::new($program), $($arg,)*)
    };
}

/// Calls [`Command::args`] on the provided [`Command`] while calling [`std::convert::AsRef::as_ref`]
/// on each argument.
macro_rules! args {
    ($program:expr, $($arg:expr),+ $(,)?) => {
        $program.args([
            $(::std::convert::AsRef::<::std::ffi::OsStr>::as_ref(&$arg),)*
        ])
    }
}

pub(crate) use args;
pub(crate) use command;

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn pipe_relays_stdin_to_stdout() {
        let mut input: &[u8] = b"hello through cat\n";
        let mut output = Vec::new();
        command!("cat", "-").pipe(&mut input, &mut output).unwrap();
        assert_eq!(output, b"hello through cat\n");
    }

    #[test]
    fn pipe_reports_non_zero_exit() {
        let mut input: &[u8] = b"";
        let mut output = Vec::new();
        let error = command!("sh", "-c", "exit 3")
            .pipe(&mut input, &mut output)
            .unwrap_err();
        assert!(matches!(
            error.kind,
            ErrorKind::NonZeroExitStatus(Some(code)) if code.get() == 3
        ));
    }

    struct ClosedOutput;

    impl Write for ClosedOutput {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn pipe_fails_when_output_is_closed() {
        let data = vec![b'x'; 4 * 1024 * 1024];
        let mut input: &[u8] = &data;
        let error = command!("cat", "-")
            .pipe(&mut input, &mut ClosedOutput)
            .unwrap_err();
        assert!(matches!(
            error.kind,
            ErrorKind::Io(ref error) if error.kind() == io::ErrorKind::BrokenPipe
        ));
    }

    #[test]
    fn missing_program_is_not_found() {
        let error = command!("onbuild-no-such-program", "--version")
            .status()
            .unwrap_err();
        assert!(matches!(error.kind, ErrorKind::NotFound));
        assert!(error.to_string().contains("not available on your system"));
    }

    #[test]
    fn exit_without_code_is_described() {
        let error = Error {
            command: Command::new("docker"),
            kind: ErrorKind::NonZeroExitStatus(None),
        };
        assert_eq!(
            error.to_string(),
            "failed to run `\"docker\"`: did not run successfully"
        );
    }

    #[test]
    fn output_captures_stdout() {
        let output = command!("echo", "captured").output().unwrap();
        assert_eq!(output.stdout, b"captured\n");
    }
}
