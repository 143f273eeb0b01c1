use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::process;

/// Which resource a quantity was given for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Memory,
    Cpu,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Memory => "memory",
            ResourceKind::Cpu => "CPU",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{message}")]
    ClusterClient {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{message}")]
    JobExecution {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("pod {pod} not found in namespace {namespace}")]
    PodNotFound { pod: String, namespace: String },

    #[error("invalid {kind} spec: {value:?}")]
    InvalidResourceSpec { kind: ResourceKind, value: String },

    #[error("invalid volume spec: {0:?}, expected format: host_path:pod_path[:ro]")]
    InvalidVolumeSpec(String),

    #[error("failed to read script file {}: {source}", path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("interrupted by user")]
    Interrupted,
}

impl Error {
    pub fn cluster(message: impl Into<String>) -> Self {
        Error::ClusterClient {
            message: message.into(),
            source: None,
        }
    }

    pub fn cluster_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::ClusterClient {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn job(message: impl Into<String>) -> Self {
        Error::JobExecution {
            message: message.into(),
            source: None,
        }
    }

    /// Exit code the command line tools report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Interrupted => 130,
            _ => 1,
        }
    }
}

/// The message carries the failed command and its stderr, so RBAC and admission denials show without `--verbose`.
impl From<process::Error> for Error {
    fn from(error: process::Error) -> Self {
        let message = error.to_string();
        match error.kind {
            process::ErrorKind::Interrupted => Error::Interrupted,
            process::ErrorKind::Other(source) => Error::cluster_with(message, source),
            _ => Error::cluster(message),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::cluster_with("unexpected response from the cluster", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(Error::Interrupted.exit_code(), 130);
        assert_eq!(Error::job("boom").exit_code(), 1);
        assert_eq!(Error::Configuration("bad".into()).exit_code(), 1);
    }

    #[test]
    fn failed_command_keeps_stderr_in_message() {
        let error: Error = process::command!("sh", "-c", "echo 'forbidden: User cannot create jobs' >&2; exit 1")
            .output()
            .unwrap_err()
            .into();
        assert!(matches!(error, Error::ClusterClient { .. }));
        assert!(
            error.to_string().ends_with(": forbidden: User cannot create jobs"),
            "{error}"
        );
    }

    #[test]
    fn resource_spec_message() {
        let error = Error::InvalidResourceSpec {
            kind: ResourceKind::Memory,
            value: "lots".to_owned(),
        };
        assert_eq!(error.to_string(), "invalid memory spec: \"lots\"");
    }
}
