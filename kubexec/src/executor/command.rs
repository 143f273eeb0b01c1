//! The `bash -c` command lines run in pods.

use std::path::Path;

use crate::{
    name::{make_unique_filename, random_token},
    shell::quote,
    target::Target,
    template::{SHARED_PUBLIC_MOUNT, SHARED_TEAM_MOUNT},
};

pub const SHELL: &str = "/bin/bash";

/// Prefix of the word terminating the here-document that carries a script's contents.
pub const SCRIPT_DELIMITER: &str = "KUBEXEC_SCRIPT_EOF";

/// A here-document delimiter that no line of `contents` can end early.
fn script_delimiter(contents: &str) -> String {
    loop {
        let delimiter = format!("{SCRIPT_DELIMITER}_{}", random_token(8));
        if !contents.lines().any(|line| line == delimiter) {
            return delimiter;
        }
    }
}

/// Directory a job starts in: the caller's working directory when it lies on a shared volume, since those are mounted
/// at the same paths inside the job, and the team volume otherwise.
pub fn entry_path(current_dir: &Path) -> String {
    [SHARED_TEAM_MOUNT, SHARED_PUBLIC_MOUNT]
        .into_iter()
        .find(|mount| current_dir.starts_with(mount))
        .map_or_else(
            || SHARED_TEAM_MOUNT.to_owned(),
            |_| current_dir.to_string_lossy().into_owned(),
        )
}

/// Builds `[SHELL, "-c", script]` for `target`, changing into `entry` first if given.
///
/// Scripts are written to a uniquely named file under `/tmp`, made executable and run, so that concurrent runs in the
/// same pod do not overwrite each other's files.
pub fn shell_command(target: &Target, entry: Option<&str>) -> Vec<String> {
    let body = match target {
        Target::Command(command) => command.clone(),
        Target::Script {
            file_name,
            contents,
        } => {
            let path = format!("/tmp/{}", make_unique_filename(file_name));
            let path = quote(&path);
            let newline = if contents.ends_with('\n') { "" } else { "\n" };
            let delimiter = script_delimiter(contents);
            format!(
                "cat << '{delimiter}' > {path}\n{contents}{newline}{delimiter}\nchmod +x {path} && {path}"
            )
        }
    };
    let script = match entry {
        Some(entry) => format!("cd {} && {body}", quote(entry)),
        None => body,
    };
    vec![SHELL.to_owned(), "-c".to_owned(), script]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(contents: &str) -> Target {
        Target::Script {
            file_name: "train.py".to_owned(),
            contents: contents.to_owned(),
        }
    }

    #[test]
    fn entry_path_follows_shared_volumes() {
        assert_eq!(
            entry_path(Path::new("/shared/team/alice/project")),
            "/shared/team/alice/project"
        );
        assert_eq!(entry_path(Path::new("/shared/public")), "/shared/public");
        assert_eq!(entry_path(Path::new("/home/alice")), "/shared/team");
        // Component-wise, not a string prefix.
        assert_eq!(entry_path(Path::new("/shared/teammates")), "/shared/team");
    }

    #[test]
    fn command_runs_in_entry_directory() {
        let command = shell_command(
            &Target::Command("python train.py --epochs 3".to_owned()),
            Some("/shared/team/my project"),
        );
        assert_eq!(
            command,
            [
                "/bin/bash",
                "-c",
                "cd '/shared/team/my project' && python train.py --epochs 3"
            ]
        );
    }

    #[test]
    fn command_without_entry_is_verbatim() {
        let command = shell_command(&Target::Command("ls -la".to_owned()), None);
        assert_eq!(command, ["/bin/bash", "-c", "ls -la"]);
    }

    #[test]
    fn script_is_written_made_executable_and_run() {
        let command = shell_command(&script("print('hi')\n"), Some("/shared/team"));
        let text = &command[2];
        assert!(
            text.starts_with("cd /shared/team && cat << 'KUBEXEC_SCRIPT_EOF_"),
            "{text}"
        );
        assert!(
            text.contains(".py\nprint('hi')\nKUBEXEC_SCRIPT_EOF_"),
            "{text}"
        );

        let path = text
            .lines()
            .last()
            .and_then(|line| line.rsplit(" && ").next())
            .unwrap();
        assert!(path.starts_with("/tmp/train-") && path.ends_with(".py"), "{path}");
        assert_eq!(text.matches(path).count(), 3, "{text}");
    }

    #[test]
    fn script_without_trailing_newline_still_terminates() {
        let command = shell_command(&script("echo done"), None);
        assert!(
            command[2].contains("echo done\nKUBEXEC_SCRIPT_EOF_"),
            "{}",
            command[2]
        );
    }

    #[test]
    fn script_mentioning_the_delimiter_prefix_is_not_cut_short() {
        let contents = "echo before\nKUBEXEC_SCRIPT_EOF\necho after\n";
        let command = shell_command(&script(contents), None);
        let text = &command[2];

        let delimiter = text
            .split('\'')
            .nth(1)
            .unwrap();
        assert!(delimiter.starts_with("KUBEXEC_SCRIPT_EOF_"), "{text}");
        assert_eq!(text.lines().filter(|line| *line == delimiter).count(), 1, "{text}");
        assert!(
            text.contains(&format!("\n{contents}{delimiter}\nchmod +x ")),
            "{text}"
        );
    }

    #[test]
    fn script_file_names_differ_between_runs() {
        let a = shell_command(&script("x"), None);
        let b = shell_command(&script("x"), None);
        assert_ne!(a, b);
    }
}
