//! Authorization guardrails evaluated before a handler runs.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::config::PolicySettings;
use crate::error::{CoreError, CoreResult};

/// Stateless rule evaluator over externally-supplied policy configuration.
/// Empty allowlists and empty path-root sets mean unrestricted.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    policy: PolicySettings,
}

impl PolicyEngine {
    pub fn new(policy: PolicySettings) -> Self {
        Self { policy }
    }

    /// A non-empty allowlist must contain the tool name.
    pub fn check_tool_allowed(&self, tool_name: &str) -> CoreResult<()> {
        let allowlist = &self.policy.tool_allowlist;
        if !allowlist.is_empty() && !allowlist.iter().any(|name| name == tool_name) {
            return Err(CoreError::PolicyDenied(format!(
                "tool '{tool_name}' is not in the allowlist"
            )));
        }
        Ok(())
    }

    /// Destructive tools require the global allow-destructive flag.
    pub fn check_destructive_allowed(&self, tool_name: &str, destructive: bool) -> CoreResult<()> {
        if destructive && !self.policy.allow_destructive {
            return Err(CoreError::PolicyDenied(format!(
                "tool '{tool_name}' is destructive and allow_destructive is disabled"
            )));
        }
        Ok(())
    }

    /// The canonicalized target must descend from at least one allowed root.
    /// `..` segments and symlinks are resolved before the containment check,
    /// so `root/../other/file` cannot escape an allowed root undetected.
    pub fn check_path_allowed(&self, path: &Path) -> CoreResult<()> {
        if self.policy.allowed_paths.is_empty() {
            return Ok(());
        }

        let target = canonicalize_target(path);
        for root in &self.policy.allowed_paths {
            if target.starts_with(canonicalize_target(root)) {
                return Ok(());
            }
        }
        Err(CoreError::PolicyDenied(format!(
            "path '{}' is outside the allowed roots",
            path.display()
        )))
    }
}

/// Resolve a path for containment checks: make it absolute, collapse `.`
/// and `..` lexically, then resolve symlinks for the longest existing
/// prefix. Works for targets that do not exist yet.
fn canonicalize_target(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let lexical = resolve_dots(&absolute);

    match std::fs::canonicalize(&lexical) {
        Ok(resolved) => resolved,
        Err(_) => {
            let mut prefix = lexical.clone();
            let mut remainder: Vec<OsString> = Vec::new();
            while std::fs::canonicalize(&prefix).is_err() {
                match prefix.file_name() {
                    Some(name) => remainder.push(name.to_os_string()),
                    None => break,
                }
                if !prefix.pop() {
                    break;
                }
            }
            let mut resolved = std::fs::canonicalize(&prefix).unwrap_or(prefix);
            for part in remainder.iter().rev() {
                resolved.push(part);
            }
            resolved
        }
    }
}

fn resolve_dots(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}
