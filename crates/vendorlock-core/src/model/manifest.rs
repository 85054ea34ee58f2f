//! User-authored constraint file.

use crate::errors::Result;
use crate::model::prune::{CascadingPruneOptions, PruneOptionSet, PruneOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File name of the manifest, a direct child of the project root
pub const MANIFEST_NAME: &str = "Vendor.toml";

/// Commented example block optionally written above a fresh manifest
pub const EXAMPLE_MANIFEST: &str = r#"# Vendor.toml example
#
# Lists the constraints the resolver must honor. Everything below is
# commented out; uncomment and edit what applies.
#
# required = ["example.com/user/thing/cmd/thing"]
# ignored = ["example.com/user/project/pkgX", "example.org/user/project/pkgA/pkgY"]
#
# [[constraint]]
#   name = "example.com/user/project"
#   version = "1.0.0"
#
# [[constraint]]
#   name = "example.com/user/project2"
#   branch = "dev"
#   source = "example.com/myfork/project2"
#
# [[override]]
#   name = "example.com/x/y"
#   version = "2.4.0"
#
# [prune]
#   non-source-files = false
#   test-files = true
#   unused-packages = true

"#;

/// One `[[constraint]]` or `[[override]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectConstraint {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ProjectConstraint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawPruneProject {
    name: String,
    #[serde(flatten)]
    options: PruneOptionSet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawPrune {
    #[serde(default, skip_serializing_if = "is_false")]
    unused_packages: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    non_source_files: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    test_files: bool,
    #[serde(default, rename = "project", skip_serializing_if = "Vec::is_empty")]
    projects: Vec<RawPruneProject>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

// Plain arrays come before the table arrays so TOML output stays valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawManifest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    required: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ignored: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    noverify: Vec<String>,
    #[serde(default, rename = "constraint", skip_serializing_if = "Vec::is_empty")]
    constraints: Vec<ProjectConstraint>,
    #[serde(default, rename = "override", skip_serializing_if = "Vec::is_empty")]
    overrides: Vec<ProjectConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prune: Option<RawPrune>,
}

/// Required and ignored packages, constraints, overrides, prune policy and
/// verification opt-outs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    pub required: Vec<String>,
    pub ignored: Vec<String>,
    pub constraints: Vec<ProjectConstraint>,
    pub overrides: Vec<ProjectConstraint>,
    pub prune: CascadingPruneOptions,
    /// Project roots whose vendored trees are not verified against the lock
    pub noverify: Vec<String>,
}

impl Manifest {
    /// Effective prune policy for exports
    pub fn prune_options(&self) -> CascadingPruneOptions {
        self.prune.clone()
    }

    pub fn to_toml(&self) -> Result<String> {
        let defaults = self.prune.default_options;
        let prune = RawPrune {
            unused_packages: defaults.contains(PruneOptions::UNUSED_PACKAGES),
            non_source_files: defaults.contains(PruneOptions::NON_SOURCE_FILES),
            test_files: defaults.contains(PruneOptions::TEST_FILES),
            projects: self
                .prune
                .per_project
                .iter()
                .map(|(name, options)| RawPruneProject {
                    name: name.clone(),
                    options: *options,
                })
                .collect(),
        };
        let has_prune = prune.unused_packages
            || prune.non_source_files
            || prune.test_files
            || !prune.projects.is_empty();

        let raw = RawManifest {
            required: self.required.clone(),
            ignored: self.ignored.clone(),
            noverify: self.noverify.clone(),
            constraints: self.constraints.clone(),
            overrides: self.overrides.clone(),
            prune: has_prune.then_some(prune),
        };
        Ok(toml::to_string_pretty(&raw)?)
    }

    /// Bytes of the manifest file as written to disk
    ///
    /// With `examples` set, the commented example block is prepended unless
    /// the body already carries it.
    pub fn render(&self, examples: bool) -> Result<Vec<u8>> {
        let body = self.to_toml()?;
        let mut out = Vec::new();
        if examples && !body.starts_with(EXAMPLE_MANIFEST) {
            out.extend_from_slice(EXAMPLE_MANIFEST.as_bytes());
        }
        out.extend_from_slice(body.as_bytes());
        Ok(out)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: RawManifest = toml::from_str(s)?;
        let mut prune = CascadingPruneOptions::default();
        if let Some(p) = raw.prune {
            let mut defaults = PruneOptions::NONE;
            defaults.set(PruneOptions::UNUSED_PACKAGES, p.unused_packages);
            defaults.set(PruneOptions::NON_SOURCE_FILES, p.non_source_files);
            defaults.set(PruneOptions::TEST_FILES, p.test_files);
            prune.default_options = defaults;
            prune.per_project = p
                .projects
                .into_iter()
                .map(|rp| (rp.name, rp.options))
                .collect::<BTreeMap<_, _>>();
        }
        Ok(Self {
            required: raw.required,
            ignored: raw.ignored,
            constraints: raw.constraints,
            overrides: raw.overrides,
            prune,
            noverify: raw.noverify,
        })
    }
}
