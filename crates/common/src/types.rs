//! Core types shared across the harness

use serde::{Deserialize, Serialize};

/// Captured result of one remote command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout with trailing newline removed, as most probes want it
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim_end_matches('\n')
    }
}

/// OS family of a host or guest context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Suse,
    RedHat,
    Debian,
    Unknown(String),
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsFamily::Suse => write!(f, "suse"),
            OsFamily::RedHat => write!(f, "redhat"),
            OsFamily::Debian => write!(f, "debian"),
            OsFamily::Unknown(id) => write!(f, "{}", id),
        }
    }
}

/// OS identification probed from a host, one per execution context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsRelease {
    pub family: OsFamily,
    pub version: String,
}

impl OsRelease {
    /// Parse the `ID=` and `VERSION_ID=` fields of an os-release file.
    ///
    /// Unknown or missing fields degrade to `Unknown`/empty rather than
    /// failing: OS identity is advisory, not load-bearing.
    pub fn parse(content: &str) -> Self {
        let mut id = String::new();
        let mut version = String::new();

        for line in content.lines() {
            if let Some(value) = line.strip_prefix("ID=") {
                id = value.trim_matches('"').to_string();
            } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
                version = value.trim_matches('"').to_string();
            }
        }

        let family = match id.as_str() {
            "sles" | "sled" | "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" => {
                OsFamily::Suse
            }
            "rhel" | "centos" | "fedora" | "rocky" | "almalinux" => OsFamily::RedHat,
            "debian" | "ubuntu" => OsFamily::Debian,
            other => OsFamily::Unknown(other.to_string()),
        };

        Self { family, version }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_os_release_suse() {
        let content = r#"NAME="SLES"
ID="sles"
VERSION_ID="15.6"
PRETTY_NAME="SUSE Linux Enterprise Server 15 SP6"
"#;
        let os = OsRelease::parse(content);
        assert_eq!(os.family, OsFamily::Suse);
        assert_eq!(os.version, "15.6");
    }

    #[test]
    fn test_parse_os_release_unquoted() {
        let content = "ID=ubuntu\nVERSION_ID=\"24.04\"\n";
        let os = OsRelease::parse(content);
        assert_eq!(os.family, OsFamily::Debian);
        assert_eq!(os.version, "24.04");
    }

    #[test]
    fn test_parse_os_release_unknown() {
        let os = OsRelease::parse("ID=plan9\n");
        assert_eq!(os.family, OsFamily::Unknown("plan9".to_string()));
        assert_eq!(os.version, "");
    }

    #[test]
    fn test_command_output_success() {
        let out = CommandOutput {
            stdout: "ok\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert!(out.is_success());
        assert_eq!(out.stdout_trimmed(), "ok");
    }
}
