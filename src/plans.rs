//! Subscription plans and the limits they grant.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const GB: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    #[default]
    Free,
    Smart,
    Pro,
    Team,
}

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Smart, Plan::Pro, Plan::Team];

    /// Monthly download quota in bytes.
    pub fn quota_bytes(&self) -> u64 {
        match self {
            Plan::Free => 2 * GB,
            Plan::Smart => 25 * GB,
            Plan::Pro => 100 * GB,
            Plan::Team => 500 * GB,
        }
    }

    /// Maximum number of downloads running at once, `None` means unlimited.
    pub fn max_concurrent_downloads(&self) -> Option<usize> {
        match self {
            Plan::Free => Some(1),
            Plan::Smart => Some(3),
            Plan::Pro => Some(10),
            Plan::Team => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Smart => "smart",
            Plan::Pro => "pro",
            Plan::Team => "team",
        }
    }
}

impl FromStr for Plan {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "smart" => Ok(Plan::Smart),
            "pro" => Ok(Plan::Pro),
            "team" => Ok(Plan::Team),
            _ => bail!("Unknown plan {}", s),
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
