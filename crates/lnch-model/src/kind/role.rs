use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Role of a machine inside one launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// The single coordinating process of the cluster job.
    Scheduler,
    /// A process performing the distributed computation.
    Worker,
}

impl Role {
    /// Returns a short symbolic identifier for the role.
    ///
    /// Used in log file names, hostfile annotations and the dry-run output:
    /// - `"scheduler"`
    /// - `"worker"`
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Scheduler => "scheduler",
            Role::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduler" => Ok(Role::Scheduler),
            "worker" => Ok(Role::Worker),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Scheduler".parse::<Role>(), Ok(Role::Scheduler));
        assert_eq!(" worker ".parse::<Role>(), Ok(Role::Worker));
        assert!("master".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_camel_case() {
        let json = serde_json::to_string(&Role::Scheduler).unwrap();
        assert_eq!(json, r#""scheduler""#);
    }
}
