/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */


//! The target manifest: a JSON file declaring the toolchain and the targets to generate rules
//! for.
//!
//! ```json
//! {
//!     "toolchain": { "flags": ["-w"] },
//!     "targets": [
//!         { "name": "io", "kind": "library", "globs": ["source/io/**/*.d"] },
//!         { "name": "app", "kind": "binary", "deps": ["io"], "srcs": ["source/app.d"] }
//!     ]
//! }
//! ```

use bb_targets::{Target, Toolchain};
use globwalk::{FileType, GlobWalkerBuilder};
use serde::Deserialize;
use std::{
    collections::BTreeSet,
    io::Read,
    path::{Component, Path},
};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    IoError(#[from] std::io::Error),
    #[error("invalid glob for target '{target}': {source}")]
    Glob {
        target: String,
        #[source]
        source: globwalk::GlobError,
    },
    #[error("while globbing for target '{target}': {message}")]
    Walk { target: String, message: String },
}

#[derive(Debug, Deserialize)]
struct TargetDecl {
    /// Patterns whose matches are appended to `srcs` when the manifest is loaded.
    #[serde(default)]
    globs: Vec<String>,
    #[serde(flatten)]
    target: Target,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    toolchain: Toolchain,
    targets: Vec<TargetDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub toolchain: Toolchain,
    pub targets: Vec<Target>,
}

impl Manifest {
    /// Reads a manifest, expanding globs relative to `base`.
    pub fn load<R: Read>(reader: R, base: &Path) -> Result<Manifest, ManifestError> {
        let raw: RawManifest = serde_json::from_reader(reader)?;
        let targets = raw
            .targets
            .into_iter()
            .map(|decl| {
                let mut target = decl.target;
                if !decl.globs.is_empty() {
                    let found = glob(base, &decl.globs, &target.name)?;
                    debug!(name = %target.name, matches = found.len(), "globbed");
                    for path in found {
                        if !target.srcs.contains(&path) {
                            target.srcs.push(path);
                        }
                    }
                }
                Ok(target)
            })
            .collect::<Result<Vec<Target>, ManifestError>>()?;
        Ok(Manifest {
            toolchain: raw.toolchain,
            targets,
        })
    }
}

/// Paths of the files under `base` matching any of `patterns`, `/`-separated and relative to
/// `base`, sorted so the generated document doesn't depend on directory iteration order.
pub fn glob(base: &Path, patterns: &[String], target: &str) -> Result<Vec<String>, ManifestError> {
    let walker = GlobWalkerBuilder::from_patterns(base, patterns)
        .file_type(FileType::FILE)
        .build()
        .map_err(|source| ManifestError::Glob {
            target: target.to_owned(),
            source,
        })?;

    // The walker may hand back canonical paths, so strip whichever prefix matches.
    let canonical = base.canonicalize().ok();
    let mut found = BTreeSet::new();
    for entry in walker {
        let entry = entry.map_err(|e| ManifestError::Walk {
            target: target.to_owned(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        let relative = path
            .strip_prefix(base)
            .ok()
            .or_else(|| canonical.as_ref().and_then(|c| path.strip_prefix(c).ok()))
            .unwrap_or(path);
        let joined = relative
            .components()
            .filter_map(|c| match c {
                Component::CurDir => None,
                c => Some(c.as_os_str().to_string_lossy().into_owned()),
            })
            .collect::<Vec<String>>()
            .join("/");
        found.insert(joined);
    }
    Ok(found.into_iter().collect())
}
