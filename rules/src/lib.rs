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


//! The rule is the fundamental unit handed to the executor. Every target eventually boils down
//! to one or more of them.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

mod dump;
pub use dump::{dump, dump_compact, load, to_string, DumpError};

/// A single command together with the files it reads and the files it writes.
///
/// Rules are pure descriptions. Nothing in this workspace ever runs one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    // Keep these alphabetical, serde emits keys in declaration order and the document must be
    // byte-stable.
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub task: Vec<String>,
}

impl Rule {
    pub fn new(inputs: Vec<String>, task: Vec<String>, outputs: Vec<String>) -> Rule {
        debug_assert!(
            outputs.iter().all(|o| !inputs.contains(o)),
            "a rule may not consume its own output"
        );
        Rule {
            inputs,
            outputs,
            task,
        }
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn task(&self) -> &[String] {
        &self.task
    }

    /// A rule without outputs can never be satisfied by a previous run, so the executor runs it
    /// every time.
    pub fn is_always_run(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_list = |f: &mut fmt::Formatter<'_>, list: &[String]| -> fmt::Result {
            write!(f, "[")?;
            for (i, item) in list.iter().enumerate() {
                if i != 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", item)?;
            }
            write!(f, "]")
        };

        write_list(f, &self.inputs)?;
        write!(f, " -> {} -> ", self.task.join(" "))?;
        write_list(f, &self.outputs)
    }
}
