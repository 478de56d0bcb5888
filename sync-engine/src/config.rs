//! Engine configuration.

use std::fmt;
use std::str::FromStr;

/// What `refresh` does with records the server has not confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Replace only `Sent` records; `Sending` and `Failed` ones stay visible.
    #[default]
    PreservePending,
    /// Delete the whole conversation, then write the fetched history.
    Overwrite,
}

impl RefreshPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshPolicy::PreservePending => "preserve_pending",
            RefreshPolicy::Overwrite => "overwrite",
        }
    }
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve_pending" | "preserve-pending" => Ok(RefreshPolicy::PreservePending),
            "overwrite" => Ok(RefreshPolicy::Overwrite),
            other => Err(format!("unknown refresh policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub refresh_policy: RefreshPolicy,
}

impl EngineConfig {
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }
}
