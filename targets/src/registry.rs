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


use bb_rules::Rule;
use std::collections::{hash_map::Entry, HashMap};
use thiserror::Error;
use tracing::debug;

use crate::{Target, Toolchain};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("target name \"{0}\" is not unique")]
    DuplicateTargetName(String),
    #[error("dependency '{dependency}' does not exist for target '{target}'")]
    MissingDependency { dependency: String, target: String },
}

/// A target with its dependency names replaced by the targets they name, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    pub target: &'a Target,
    pub deps: Vec<&'a Target>,
}

impl<'a> Resolved<'a> {
    pub fn rules(&self, toolchain: &'a Toolchain) -> impl Iterator<Item = Rule> + 'a {
        self.target.rules(&self.deps, toolchain)
    }
}

/// Name index over one set of targets.
///
/// Every name must be unique. Dependencies are looked up only after all names are known, so a
/// target may depend on one declared after it. Nothing walks the dependency graph, so cycles are
/// not detected here; lowering only ever looks one hop away.
#[derive(Debug)]
pub struct Registry<'a> {
    targets: &'a [Target],
    index: HashMap<&'a str, &'a Target>,
}

impl<'a> Registry<'a> {
    pub fn new(targets: &'a [Target]) -> Result<Registry<'a>, ResolveError> {
        let mut index = HashMap::with_capacity(targets.len());
        for target in targets {
            match index.entry(target.name.as_str()) {
                Entry::Occupied(_) => {
                    return Err(ResolveError::DuplicateTargetName(target.name.clone()));
                }
                Entry::Vacant(e) => {
                    e.insert(target);
                }
            }
        }
        Ok(Registry { targets, index })
    }

    pub fn get(&self, name: &str) -> Option<&'a Target> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Resolves every target's dependencies, failing on the first name that isn't registered.
    pub fn resolve(&self) -> Result<Vec<Resolved<'a>>, ResolveError> {
        self.targets
            .iter()
            .map(|target| {
                let deps = target
                    .deps
                    .iter()
                    .map(|name| {
                        self.get(name)
                            .ok_or_else(|| ResolveError::MissingDependency {
                                dependency: name.clone(),
                                target: target.name.clone(),
                            })
                    })
                    .collect::<Result<Vec<&Target>, ResolveError>>()?;
                debug!(name = %target.name, deps = deps.len(), "resolved");
                Ok(Resolved { target, deps })
            })
            .collect()
    }
}

pub fn resolve(targets: &[Target]) -> Result<Vec<Resolved<'_>>, ResolveError> {
    Registry::new(targets)?.resolve()
}

/// Resolves `targets` and returns the rules for all of them, grouped by target in declaration
/// order.
///
/// All resolution errors surface here, before the first rule is produced; lowering itself
/// cannot fail.
pub fn rules<'a>(
    targets: &'a [Target],
    toolchain: &'a Toolchain,
) -> Result<impl Iterator<Item = Rule> + 'a, ResolveError> {
    let resolved = resolve(targets)?;
    Ok(resolved
        .into_iter()
        .flat_map(move |resolved| resolved.rules(toolchain)))
}
