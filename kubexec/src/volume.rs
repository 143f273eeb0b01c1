use std::{fmt, str::FromStr};

use crate::Error;

/// A user supplied `host_path:pod_path[:ro]` mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMountSpec {
    pub host_path: String,
    pub pod_path: String,
    pub read_only: bool,
}

impl FromStr for VolumeMountSpec {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split(':');
        let (Some(host_path), Some(pod_path)) = (parts.next(), parts.next()) else {
            return Err(Error::InvalidVolumeSpec(value.to_owned()));
        };
        if host_path.is_empty() || pod_path.is_empty() {
            return Err(Error::InvalidVolumeSpec(value.to_owned()));
        }
        Ok(Self {
            host_path: host_path.to_owned(),
            pod_path: pod_path.to_owned(),
            read_only: parts.next() == Some("ro"),
        })
    }
}

impl fmt::Display for VolumeMountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_path, self.pod_path)?;
        if self.read_only {
            f.write_str(":ro")?;
        }
        Ok(())
    }
}
