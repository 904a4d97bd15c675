//! Conversion between absolute paths and project-relative, portable forms.
//!
//! Records store paths relative to the project root (posix separators) or
//! prefixed with a root token such as `$PROJECT_ROOT`, so they stay valid
//! when a project is relocated or mounted elsewhere on another machine.
//! Nothing here touches the filesystem.

use crate::error::{LineageError, Result};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Token standing for the project root unless configured otherwise
pub const DEFAULT_ROOT_TOKEN: &str = "$PROJECT_ROOT";

/// Resolves paths against one project root and a set of named tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root: PathBuf,
    root_token: String,
    tokens: BTreeMap<String, PathBuf>,
}

impl PathResolver {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self::with_root_token(project_root, DEFAULT_ROOT_TOKEN)
    }

    pub fn with_root_token(project_root: impl AsRef<Path>, root_token: impl Into<String>) -> Self {
        Self {
            root: normalize(project_root.as_ref()),
            root_token: root_token.into(),
            tokens: BTreeMap::new(),
        }
    }

    /// Register an additional token, e.g. `$TEXTURES` for a shared library
    pub fn with_token(mut self, token: impl Into<String>, path: impl AsRef<Path>) -> Self {
        self.tokens.insert(token.into(), normalize(path.as_ref()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_token(&self) -> &str {
        &self.root_token
    }

    /// Whether the path lives inside the managed project tree
    pub fn is_managed(&self, path: impl AsRef<Path>) -> bool {
        normalize(path.as_ref()).starts_with(&self.root)
    }

    /// Relative posix form of a path under the root.
    ///
    /// Paths outside the root come back unchanged so that records pointing
    /// at external references stay usable.
    pub fn to_relative(&self, absolute_path: impl AsRef<Path>) -> String {
        let original = absolute_path.as_ref();
        let normalized = normalize(original);
        match normalized.strip_prefix(&self.root) {
            Ok(relative) => to_posix(relative),
            Err(_) => original.to_string_lossy().into_owned(),
        }
    }

    /// Portable form: `$PROJECT_ROOT/<relative>` under the root, unchanged otherwise
    pub fn to_portable(&self, absolute_path: impl AsRef<Path>) -> String {
        let normalized = normalize(absolute_path.as_ref());
        match normalized.strip_prefix(&self.root) {
            Ok(relative) if relative.as_os_str().is_empty() => self.root_token.clone(),
            Ok(relative) => format!("{}/{}", self.root_token, to_posix(relative)),
            Err(_) => absolute_path.as_ref().to_string_lossy().into_owned(),
        }
    }

    /// Absolute form of a relative, tokenized or already absolute path
    pub fn to_absolute(&self, path: &str) -> Result<PathBuf> {
        if let Some((token, rest)) = split_token(path) {
            let base = if token == self.root_token {
                &self.root
            } else {
                self.tokens
                    .get(&token)
                    .ok_or_else(|| LineageError::UnresolvedPath {
                        path: path.to_string(),
                        token: token.clone(),
                    })?
            };
            return Ok(join_posix(base, rest));
        }

        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return Ok(candidate.to_path_buf());
        }
        Ok(join_posix(&self.root, path))
    }

    /// Like [`to_absolute`](Self::to_absolute) but falls back to the input
    /// path when a token cannot be substituted
    pub fn to_absolute_lossy(&self, path: &str) -> PathBuf {
        self.to_absolute(path).unwrap_or_else(|_| PathBuf::from(path))
    }
}

/// Split `$NAME/rest` or `${NAME}/rest` into the token (in `$NAME` form) and rest
fn split_token(path: &str) -> Option<(String, &str)> {
    let body = path.strip_prefix('$')?;
    let (name, rest) = match body.strip_prefix('{') {
        Some(braced) => {
            let close = braced.find('}')?;
            (&braced[..close], &braced[close + 1..])
        }
        None => {
            let end = body.find(['/', '\\']).unwrap_or(body.len());
            (&body[..end], &body[end..])
        }
    };
    if name.is_empty() {
        return None;
    }
    Some((format!("${name}"), rest.trim_start_matches(['/', '\\'])))
}

fn join_posix(base: &Path, relative: &str) -> PathBuf {
    let mut joined = base.to_path_buf();
    for segment in relative.split(['/', '\\']).filter(|s| !s.is_empty()) {
        joined.push(segment);
    }
    normalize(&joined)
}

fn to_posix(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Lexically fold `.` and `..` components without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
