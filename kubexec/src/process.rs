use std::{
    ffi::OsStr,
    fmt,
    io::{self, Read, Write},
    num::NonZeroI32,
    process, thread,
    time::{Duration, Instant},
};

use log::debug;

use crate::cancel::Cancellation;

/// How often a bounded child is checked for exit, timeout and cancellation.
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

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

    pub fn try_output(mut self) -> Result<Output, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("capturing `{command:?}`...", command = &self.0);
        }

        match self.0.output() {
            Ok(output) => Ok(Output {
                command: self,
                output,
            }),
            Err(error) => Err(Error::new(self, error.into())),
        }
    }

    pub fn output(self) -> Result<Output, Error> {
        self.try_output().and_then(Output::require_success)
    }

    /// Writes `input` to the stdin of the child and captures its output. Does not check the exit status.
    pub fn output_with_input(self, input: Vec<u8>) -> Result<Output, Error> {
        self.spawn_captured(Some(input), None)
    }

    /// Captures the output of the child, killing it once `timeout` elapses or `cancellation` fires. Does not check the
    /// exit status.
    pub fn output_bounded(
        self,
        timeout: Duration,
        cancellation: &Cancellation,
    ) -> Result<Output, Error> {
        self.spawn_captured(None, Some((Instant::now() + timeout, cancellation)))
    }

    fn spawn_captured(
        mut self,
        input: Option<Vec<u8>>,
        bound: Option<(Instant, &Cancellation)>,
    ) -> Result<Output, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("capturing `{command:?}`...", command = &self.0);
        }

        let spawned = self
            .0
            .stdin(if input.is_some() {
                process::Stdio::piped()
            } else {
                process::Stdio::null()
            })
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(error) => return Err(Error::new(self, error.into())),
        };

        let stdin_thread = match (input, child.stdin.take()) {
            (Some(input), Some(mut stdin)) => {
                Some(thread::spawn(move || stdin.write_all(&input)))
            }
            _ => None,
        };
        let stdout_thread = child.stdout.take().map(drain);
        let stderr_thread = child.stderr.take().map(drain);

        let status = match bound {
            None => child.wait(),
            Some((deadline, cancellation)) => loop {
                match child.try_wait() {
                    Ok(Some(status)) => break Ok(status),
                    Ok(None) => {}
                    Err(error) => break Err(error),
                }
                let kind = if cancellation.is_cancelled() {
                    Some(ErrorKind::Interrupted)
                } else if Instant::now() >= deadline {
                    Some(ErrorKind::Timeout)
                } else {
                    None
                };
                if let Some(kind) = kind {
                    // The child may have exited in the meantime, in which case kill fails harmlessly.
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::new(self, kind));
                }
                thread::sleep(CHILD_POLL_INTERVAL);
            },
        };
        let status = match status {
            Ok(status) => status,
            Err(error) => return Err(Error::new(self, error.into())),
        };

        if let Some(stdin_thread) = stdin_thread {
            match stdin_thread.join() {
                // A child that exits without reading all of its input is reported through its exit status.
                Ok(Ok(())) | Ok(Err(_)) => {}
                Err(_) => {
                    let error = io::Error::new(io::ErrorKind::Other, "stdin writer panicked");
                    return Err(Error::new(self, error.into()));
                }
            }
        }

        let collect = |handle: Option<thread::JoinHandle<io::Result<Vec<u8>>>>| match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "output reader panicked"))
                .and_then(|result| result),
            None => Ok(Vec::new()),
        };
        let stdout = collect(stdout_thread);
        let stderr = collect(stderr_thread);
        match (stdout, stderr) {
            (Ok(stdout), Ok(stderr)) => Ok(Output {
                command: self,
                output: process::Output {
                    status,
                    stdout,
                    stderr,
                },
            }),
            (Err(error), _) | (_, Err(error)) => Err(Error::new(self, error.into())),
        }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
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
            let mut error = Error::new(
                command,
                ErrorKind::NonZeroExitStatus(output.status.code().and_then(NonZeroI32::new)),
            );
            error.stderr = Some(String::from_utf8_lossy(&output.stderr).trim().to_owned())
                .filter(|stderr| !stderr.is_empty());
            Err(error)
        }
    }

    /// Exit code of the child, with death by signal reported as 1.
    pub fn exit_code(&self) -> i32 {
        self.output.status.code().unwrap_or(1)
    }

    /// Stdout followed by stderr, decoded lossily.
    pub fn combined(&self) -> String {
        let mut combined = String::from_utf8_lossy(&self.output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&self.output.stderr));
        combined
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
    Timeout,
    Interrupted,
    Other(io::Error),
}

impl From<io::Error> for ErrorKind {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Other(value),
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub command: Command,
    pub kind: ErrorKind,
    /// Trimmed stderr of a child that exited unsuccessfully.
    pub stderr: Option<String>,
}

impl Error {
    fn new(command: Command, kind: ErrorKind) -> Self {
        Self {
            command,
            kind,
            stderr: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to run `{command:?}`: ",
            command = &self.command.0
        )?;
        let program = self.command.0.get_program().to_string_lossy();
        match &self.kind {
            ErrorKind::NotFound => {
                write!(f, "the `{program}` command is required but not available on your system, please install it")?
            }
            ErrorKind::PermissionDenied => {
                write!(f, "the `{program}` command is available but does not have the right permissions, please make sure the binary is executable")?
            }
            ErrorKind::NonZeroExitStatus(code) => {
                if let Some(code) = code {
                    write!(f, "exited with non-zero exit code `{code}`")?
                } else {
                    write!(f, "did not run successfully")?
                }
            }
            ErrorKind::Timeout => write!(f, "timed out")?,
            ErrorKind::Interrupted => write!(f, "interrupted")?,
            ErrorKind::Other(error) => write!(f, "{error}")?,
        }
        if let Some(stderr) = &self.stderr {
            write!(f, ": {stderr}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Other(error) => Some(error),
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
