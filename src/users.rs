//! Who might be behind a detected change.
//!
//! Audit lines record every user logged on when the change was seen. The
//! lookup sits behind [`SessionUsers`] so the engine can be driven with a
//! fixed list in tests.

use std::path::PathBuf;
use std::process::Command;

/// Source of the users currently logged on
pub trait SessionUsers {
    /// Logged-on user names, deduplicated, in first-seen order. Empty when
    /// the lookup is unavailable.
    fn logged_on(&self) -> Vec<String>;
}

/// Queries `who` and takes the first column of its output
#[derive(Debug, Clone, Default)]
pub struct WhoCommand {
    /// Resolved `who` binary, if one was found on `PATH`
    program: Option<PathBuf>,
}

impl WhoCommand {
    /// Look up `who` on `PATH`
    #[must_use]
    pub fn locate() -> Self {
        let program = which::which("who").ok();
        if program.is_none() {
            tracing::warn!("`who` not found on PATH, audit lines will list no users");
        }
        Self { program }
    }
}

impl SessionUsers for WhoCommand {
    fn logged_on(&self) -> Vec<String> {
        let Some(program) = &self.program else {
            return Vec::new();
        };

        match Command::new(program).output() {
            Ok(output) if output.status.success() => {
                parse_who_output(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                tracing::warn!(status = %output.status, "`who` failed");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("failed to run `who`: {e}");
                Vec::new()
            }
        }
    }
}

/// A fixed user list
#[derive(Debug, Clone, Default)]
pub struct FixedUsers(pub Vec<String>);

impl SessionUsers for FixedUsers {
    fn logged_on(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// First whitespace-separated column of each line, deduplicated
#[must_use]
pub fn parse_who_output(output: &str) -> Vec<String> {
    let mut users: Vec<String> = Vec::new();
    for user in output.lines().filter_map(|line| line.split_whitespace().next()) {
        if !users.iter().any(|seen| seen == user) {
            users.push(user.to_string());
        }
    }
    users
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_who_output() {
        let output = "\
alice    tty1         2024-05-01 08:00
bob      pts/0        2024-05-01 08:05 (10.0.0.2)
alice    pts/1        2024-05-01 09:00 (10.0.0.3)

";
        assert_eq!(parse_who_output(output), vec!["alice", "bob"]);
        assert!(parse_who_output("").is_empty());
    }

    #[test]
    fn test_missing_program_yields_nobody() {
        assert!(WhoCommand::default().logged_on().is_empty());
    }

    #[test]
    fn test_fixed_users() {
        let users = FixedUsers(vec!["carol".to_string()]);
        assert_eq!(users.logged_on(), vec!["carol"]);
    }
}
