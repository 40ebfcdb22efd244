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


//! Targets are what users declare: named libraries, binaries and tests with their sources and
//! the names of the targets they depend on. This crate validates a set of targets and lowers
//! each one into the rules the executor runs.

use serde::{Deserialize, Serialize};

mod lower;
mod registry;
mod toolchain;

pub use registry::{resolve, rules, Registry, Resolved, ResolveError};
pub use toolchain::Toolchain;

/// Configuration shared by every kind of target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Module search paths.
    pub includes: Vec<String>,
    /// String import paths.
    pub imports: Vec<String>,
    /// Version identifiers to define.
    pub versions: Vec<String>,
    pub compiler_flags: Vec<String>,
    pub linker_flags: Vec<String>,
    /// Where object files go. Defaults to `obj/<name>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objdir: Option<String>,
    /// Where the linked artifact goes. Defaults to the working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    Static,
    Shared,
}

impl Default for Linkage {
    fn default() -> Self {
        Linkage::Static
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    #[serde(flatten)]
    pub config: Config,
    #[serde(default)]
    pub linkage: Linkage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Kind {
    Library(Library),
    Binary(Config),
    /// A binary built with unit tests compiled in, which is run once linked.
    Test(Config),
}

impl Kind {
    pub fn config(&self) -> &Config {
        match self {
            Kind::Library(lib) => &lib.config,
            Kind::Binary(config) | Kind::Test(config) => config,
        }
    }

    pub fn config_mut(&mut self) -> &mut Config {
        match self {
            Kind::Library(lib) => &mut lib.config,
            Kind::Binary(config) | Kind::Test(config) => config,
        }
    }

    pub fn is_library(&self) -> bool {
        matches!(self, Kind::Library(_))
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Kind::Test(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default)]
    pub srcs: Vec<String>,
    #[serde(flatten)]
    pub kind: Kind,
}

impl Target {
    pub fn new<S: Into<String>>(name: S, kind: Kind) -> Target {
        Target {
            name: name.into(),
            deps: vec![],
            srcs: vec![],
            kind,
        }
    }

    pub fn library<S: Into<String>>(name: S, linkage: Linkage) -> Target {
        Target::new(
            name,
            Kind::Library(Library {
                config: Config::default(),
                linkage,
            }),
        )
    }

    pub fn binary<S: Into<String>>(name: S) -> Target {
        Target::new(name, Kind::Binary(Config::default()))
    }

    pub fn test<S: Into<String>>(name: S) -> Target {
        Target::new(name, Kind::Test(Config::default()))
    }

    pub fn with_srcs<I, S>(mut self, srcs: I) -> Target
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.srcs = srcs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_deps<I, S>(mut self, deps: I) -> Target
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_config(mut self, config: Config) -> Target {
        *self.kind.config_mut() = config;
        self
    }

    pub fn config(&self) -> &Config {
        self.kind.config()
    }

    pub fn config_mut(&mut self) -> &mut Config {
        self.kind.config_mut()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_survives_kind() {
        let config = Config {
            includes: vec!["source".to_owned()],
            ..Default::default()
        };
        for target in vec![
            Target::library("a", Linkage::Shared),
            Target::binary("a"),
            Target::test("a"),
        ] {
            let target = target.with_config(config.clone());
            assert_eq!(target.config(), &config);
        }
    }

    #[test]
    fn deserialize_flattened() {
        let target: Target = serde_json::from_str(
            r#"{
                "name": "io",
                "kind": "library",
                "linkage": "shared",
                "srcs": ["a.d"],
                "includes": ["source"]
            }"#,
        )
        .expect("valid target");
        assert_eq!(target.name, "io");
        assert!(target.deps.is_empty());
        assert_eq!(target.srcs, vec!["a.d"]);
        match &target.kind {
            Kind::Library(lib) => {
                assert_eq!(lib.linkage, Linkage::Shared);
                assert_eq!(lib.config.includes, vec!["source"]);
                assert_eq!(lib.config.objdir, None);
            }
            k => panic!("Unexpected kind {:?}", k),
        }
    }

    #[test]
    fn deserialize_defaults() {
        let target: Target =
            serde_json::from_str(r#"{"name": "t", "kind": "test"}"#).expect("valid target");
        assert_eq!(target, Target::test("t"));

        let target: Target =
            serde_json::from_str(r#"{"name": "l", "kind": "library"}"#).expect("valid target");
        assert_eq!(target, Target::library("l", Linkage::Static));
    }

    #[test]
    fn deserialize_unknown_kind() {
        let result: Result<Target, _> = serde_json::from_str(r#"{"name": "x", "kind": "docs"}"#);
        assert!(result.is_err());
    }
}
