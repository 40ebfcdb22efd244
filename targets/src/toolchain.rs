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


use serde::{Deserialize, Serialize};

/// Everything lowering needs to know about the compiler it is emitting commands for.
///
/// Flags that take a value (`output_flag`, `include_flag`, ...) are prefixes; the value is
/// appended with no separator, matching how `dmd` spells them (`-ofapp`, `-Isource`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    /// Prepended to every compile and link command. Usually a dependency discovery wrapper.
    pub wrapper: Vec<String>,
    pub compiler: String,
    /// Only sources with this extension are compiled.
    pub source_extension: String,
    /// Appended to a source path to name its object file.
    pub object_suffix: String,
    /// Passed to every compile and link command, before any target flags.
    pub flags: Vec<String>,
    pub compile_only: String,
    pub output_flag: String,
    pub include_flag: String,
    pub import_flag: String,
    pub version_flag: String,
    pub static_flag: String,
    pub shared_flag: String,
    /// Forced onto compile commands of test targets.
    pub test_flag: String,
}

impl Toolchain {
    pub fn dmd() -> Toolchain {
        Toolchain {
            wrapper: vec![],
            compiler: "dmd".to_owned(),
            source_extension: ".d".to_owned(),
            object_suffix: ".o".to_owned(),
            flags: vec![],
            compile_only: "-c".to_owned(),
            output_flag: "-of".to_owned(),
            include_flag: "-I".to_owned(),
            import_flag: "-J".to_owned(),
            version_flag: "-version=".to_owned(),
            static_flag: "-lib".to_owned(),
            shared_flag: "-shared".to_owned(),
            test_flag: "-unittest".to_owned(),
        }
    }

    pub fn with_wrapper<I, S>(mut self, wrapper: I) -> Toolchain
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wrapper = wrapper.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_source(&self, path: &str) -> bool {
        path.ends_with(&self.source_extension)
    }

    /// The wrapper followed by the compiler; the first words of every tool invocation.
    pub(crate) fn command(&self) -> Vec<String> {
        let mut argv = self.wrapper.clone();
        argv.push(self.compiler.clone());
        argv
    }

    pub(crate) fn output(&self, path: &str) -> String {
        format!("{}{}", self.output_flag, path)
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Toolchain::dmd()
    }
}
