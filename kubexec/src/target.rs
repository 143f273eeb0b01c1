//! Telling scripts apart from command strings.

use std::{fs, path::Path};

use crate::{Error, Result};

const SCRIPT_EXTENSIONS: [&str; 6] = [".sh", ".py", ".pl", ".R", ".rb", ".js"];

/// What the user asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A shell command line, run as is.
    Command(String),
    /// A local script whose contents are shipped inline with the command.
    Script { file_name: String, contents: String },
}

impl Target {
    /// Reads the script if `target` names one, otherwise treats it as a command line.
    pub fn resolve(target: &str) -> Result<Self> {
        if !is_script_file(target) {
            return Ok(Target::Command(target.to_owned()));
        }
        let path = Path::new(target);
        let contents = fs::read_to_string(path).map_err(|source| Error::Script {
            path: path.to_owned(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script".to_owned());
        Ok(Target::Script {
            file_name,
            contents,
        })
    }
}

/// Returns true if `target` is an existing file that either has a known script extension or is executable.
pub fn is_script_file(target: &str) -> bool {
    let Ok(metadata) = fs::metadata(target) else {
        return false;
    };
    SCRIPT_EXTENSIONS
        .iter()
        .any(|extension| target.ends_with(extension))
        || (metadata.is_file() && is_executable(&metadata))
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn command_strings_are_not_scripts() {
        assert!(!is_script_file("echo hi"));
        assert_eq!(
            Target::resolve("echo hi").unwrap(),
            Target::Command("echo hi".to_owned())
        );
    }

    #[test]
    fn missing_script_is_a_command() {
        assert!(!is_script_file("/definitely/not/here.sh"));
    }

    #[test]
    fn shell_script_is_detected_and_read() {
        let mut file = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
        writeln!(file, "#!/bin/bash\necho from script").unwrap();
        let path = file.path().to_str().unwrap();

        assert!(is_script_file(path));
        let Target::Script {
            file_name,
            contents,
        } = Target::resolve(path).unwrap()
        else {
            panic!("expected a script");
        };
        assert!(file_name.ends_with(".sh"));
        assert_eq!(contents, "#!/bin/bash\necho from script\n");
    }

    #[cfg(unix)]
    #[test]
    fn executable_without_extension_is_a_script() {
        use std::os::unix::fs::PermissionsExt;

        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert!(!is_script_file(path));

        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_script_file(path));
    }

    #[test]
    fn directories_are_not_scripts() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_script_file(dir.path().to_str().unwrap()));
    }
}
