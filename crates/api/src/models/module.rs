use serde::{Deserialize, Serialize};
use std::fmt;

/// Module partition of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Standard library, reachable as `/std` and `/x/std`
    Std,
    /// Third-party modules under `/x/`
    X,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Std => f.write_str("std"),
            Namespace::X => f.write_str("x"),
        }
    }
}

/// A parsed registry request path.
///
/// `path` never starts with `/`. For the standard library `name` is always
/// `"std"`, whichever of the two public prefixes was requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleIdentifier {
    pub namespace: Namespace,
    pub name: String,
    pub version: Option<String>,
    pub path: String,
}

impl ModuleIdentifier {
    /// Public prefix without version, e.g. `/std` or `/x/oak`.
    pub fn base(&self) -> String {
        match self.namespace {
            Namespace::Std => "/std".to_string(),
            Namespace::X => format!("/x/{}", self.name),
        }
    }

    /// Canonical public path, e.g. `/x/oak@v6.5.0/mod.ts`.
    pub fn public_path(&self) -> String {
        let mut out = self.base();
        if let Some(version) = &self.version {
            out.push('@');
            out.push_str(version);
        }
        if !self.path.is_empty() {
            out.push('/');
            out.push_str(&self.path);
        }
        out
    }

    pub fn is_pinned(&self) -> bool {
        self.version.is_some()
    }

    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..self.clone()
        }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        let namespace = if name == "std" {
            Namespace::Std
        } else {
            Namespace::X
        };
        Self {
            namespace,
            name,
            ..self.clone()
        }
    }
}

impl fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.public_path())
    }
}

/// Trailing `:<line>:<col>` permalink suffix. The column is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFragment {
    pub rest: String,
    pub line: u32,
}

impl LineFragment {
    /// Location of the line anchor, e.g. `/a/b.ts#L5`.
    pub fn anchor(&self) -> String {
        format!("{}#L{}", self.rest, self.line)
    }
}
