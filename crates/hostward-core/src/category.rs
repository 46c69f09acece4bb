//! Assessment categories.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::scoring::ScorePolicy;

/// One family of security probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Verified boot and bootloader lock state
    Bootloader,
    /// Trusted execution environment and hardware key storage
    Tee,
    /// Mandatory access control (SELinux / AppArmor)
    Selinux,
    /// System file and partition integrity
    Integrity,
    /// Network configuration
    Network,
    /// Known dangerous tooling (signature matching)
    Tooling,
}

impl Category {
    /// Every category, in reporting order.
    pub const ALL: [Self; 6] = [
        Self::Bootloader,
        Self::Tee,
        Self::Selinux,
        Self::Integrity,
        Self::Network,
        Self::Tooling,
    ];

    /// Stable lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bootloader => "bootloader",
            Self::Tee => "tee",
            Self::Selinux => "selinux",
            Self::Integrity => "integrity",
            Self::Network => "network",
            Self::Tooling => "tooling",
        }
    }

    /// Human-readable title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Bootloader => "Bootloader",
            Self::Tee => "TEE",
            Self::Selinux => "SELinux",
            Self::Integrity => "Integrity",
            Self::Network => "Network",
            Self::Tooling => "Dangerous tooling",
        }
    }

    /// Classification thresholds, fixed per category.
    ///
    /// Integrity tolerates one supplementary miss; network signals are
    /// noisy on ordinary hosts and get wider bands.
    #[must_use]
    pub const fn policy(self) -> ScorePolicy {
        match self {
            Self::Bootloader | Self::Tee | Self::Selinux | Self::Tooling => ScorePolicy::DEFAULT,
            Self::Integrity => ScorePolicy {
                pass_threshold: 80,
                fail_threshold: 50,
            },
            Self::Network => ScorePolicy {
                pass_threshold: 70,
                fail_threshold: 40,
            },
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category `{0}` (expected one of: bootloader, tee, selinux, integrity, network, tooling)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bootloader" | "boot" => Ok(Self::Bootloader),
            "tee" | "keystore" => Ok(Self::Tee),
            "selinux" | "mac" => Ok(Self::Selinux),
            "integrity" | "root" => Ok(Self::Integrity),
            "network" | "net" => Ok(Self::Network),
            "tooling" | "signatures" => Ok(Self::Tooling),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
        assert_eq!("MAC".parse::<Category>(), Ok(Category::Selinux));
        assert!("firmware".parse::<Category>().is_err());
    }

    #[test]
    fn policies_are_valid() {
        for category in Category::ALL {
            assert!(category.policy().validate().is_ok(), "{category}");
        }
    }
}
