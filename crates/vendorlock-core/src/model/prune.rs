//! Prune options: which parts of an exported project are dropped.
//!
//! In the lock file a project's options are a letter string, one letter per
//! enabled flag, always in `NUST` order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::str::FromStr;

/// Bit set of prune flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PruneOptions(u8);

impl PruneOptions {
    pub const NONE: PruneOptions = PruneOptions(0);
    /// Drop `vendor` directories nested inside an exported project
    pub const NESTED_VENDOR_DIRS: PruneOptions = PruneOptions(1 << 0);
    /// Drop files of packages the lock does not require from the project
    pub const UNUSED_PACKAGES: PruneOptions = PruneOptions(1 << 1);
    /// Drop files that are neither source nor legal notices
    pub const NON_SOURCE_FILES: PruneOptions = PruneOptions(1 << 2);
    /// Drop test-only files
    pub const TEST_FILES: PruneOptions = PruneOptions(1 << 3);

    const LETTERS: [(PruneOptions, char); 4] = [
        (PruneOptions::NESTED_VENDOR_DIRS, 'N'),
        (PruneOptions::UNUSED_PACKAGES, 'U'),
        (PruneOptions::NON_SOURCE_FILES, 'S'),
        (PruneOptions::TEST_FILES, 'T'),
    ];

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every flag in `other` is set in `self`
    pub fn contains(self, other: PruneOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: PruneOptions, on: bool) {
        if on {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl BitOr for PruneOptions {
    type Output = PruneOptions;

    fn bitor(self, rhs: Self) -> Self::Output {
        PruneOptions(self.0 | rhs.0)
    }
}

impl BitAnd for PruneOptions {
    type Output = PruneOptions;

    fn bitand(self, rhs: Self) -> Self::Output {
        PruneOptions(self.0 & rhs.0)
    }
}

impl Not for PruneOptions {
    type Output = PruneOptions;

    fn not(self) -> Self::Output {
        PruneOptions(!self.0 & 0b1111)
    }
}

impl fmt::Display for PruneOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, letter) in Self::LETTERS {
            if self.contains(flag) {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

impl FromStr for PruneOptions {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut opts = PruneOptions::NONE;
        for c in s.chars() {
            let flag = Self::LETTERS
                .iter()
                .find(|(_, letter)| *letter == c)
                .map(|(flag, _)| *flag)
                .ok_or_else(|| format!("unknown prune option {:?} in {:?}", c, s))?;
            opts = opts | flag;
        }
        Ok(opts)
    }
}

impl TryFrom<String> for PruneOptions {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PruneOptions> for String {
    fn from(value: PruneOptions) -> Self {
        value.to_string()
    }
}

/// Per-project overrides; `None` defers to the project-wide default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PruneOptionSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unused_packages: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_source_files: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_files: Option<bool>,
}

/// Project-wide prune default with per-project overrides
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CascadingPruneOptions {
    pub default_options: PruneOptions,
    pub per_project: BTreeMap<String, PruneOptionSet>,
}

impl CascadingPruneOptions {
    pub fn new(default_options: PruneOptions) -> Self {
        Self {
            default_options,
            per_project: BTreeMap::new(),
        }
    }

    /// Effective options for one project root
    ///
    /// Nested vendor directories are always pruned from exports.
    pub fn options_for(&self, project_root: &str) -> PruneOptions {
        let mut opts = self.default_options | PruneOptions::NESTED_VENDOR_DIRS;
        if let Some(set) = self.per_project.get(project_root) {
            if let Some(on) = set.unused_packages {
                opts.set(PruneOptions::UNUSED_PACKAGES, on);
            }
            if let Some(on) = set.non_source_files {
                opts.set(PruneOptions::NON_SOURCE_FILES, on);
            }
            if let Some(on) = set.test_files {
                opts.set(PruneOptions::TEST_FILES, on);
            }
        }
        opts
    }
}
