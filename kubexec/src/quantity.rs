//! Validation of the memory and CPU quantities passed to the cluster.

use crate::{error::ResourceKind, Error, Result};

/// Suffixes accepted for memory quantities, matched against the end of the value.
const MEMORY_UNITS: [&str; 8] = ["Mi", "Gi", "Ti", "m", "k", "M", "G", "T"];

/// Returns the memory quantity unchanged if it carries a recognized unit. A bare integer is read as mebibytes.
pub fn memory(value: &str) -> Result<String> {
    if MEMORY_UNITS.iter().any(|unit| value.ends_with(unit)) {
        return Ok(value.to_owned());
    }
    if !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Ok(format!("{value}Mi"));
    }
    Err(Error::InvalidResourceSpec {
        kind: ResourceKind::Memory,
        value: value.to_owned(),
    })
}

/// Returns the CPU quantity unchanged if it is a number of cores (`"0.5"`, `"2"`) or millicores (`"500m"`).
pub fn cpu(value: &str) -> Result<String> {
    if value.trim().parse::<f64>().is_ok() || value.ends_with('m') {
        return Ok(value.to_owned());
    }
    Err(Error::InvalidResourceSpec {
        kind: ResourceKind::Cpu,
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_with_unit_is_unchanged() {
        for value in ["512Mi", "4Gi", "1Ti", "100m", "64k", "500M", "2G", "1T"] {
            assert_eq!(memory(value).unwrap(), value);
        }
    }

    #[test]
    fn bare_memory_is_mebibytes() {
        assert_eq!(memory("512").unwrap(), "512Mi");
    }

    #[test]
    fn invalid_memory_is_rejected() {
        for value in ["", "lots", "4Gb", "1.5", "-1"] {
            assert!(
                matches!(
                    memory(value),
                    Err(Error::InvalidResourceSpec {
                        kind: ResourceKind::Memory,
                        ..
                    })
                ),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn cpu_is_validated() {
        for value in ["1", "0.5", "2.25", "500m"] {
            assert_eq!(cpu(value).unwrap(), value);
        }
        for value in ["", "one", "2cores"] {
            assert!(
                matches!(
                    cpu(value),
                    Err(Error::InvalidResourceSpec {
                        kind: ResourceKind::Cpu,
                        ..
                    })
                ),
                "{value:?} should be rejected"
            );
        }
    }
}
