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


//! Lowering: a target plus its resolved dependencies in, an ordered stream of rules out.
//!
//! Every target compiles each of its sources to an object under its own object directory, then
//! links the objects together with the archives of the libraries it depends on. Tests get one
//! more rule that runs the linked binary.

use bb_rules::Rule;
use std::iter;
use tracing::trace;

use crate::{Kind, Linkage, Target, Toolchain};

/// Joins with `/` on every host so generated documents don't depend on where they were made.
fn join(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_owned()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, file)
    } else {
        format!("{}/{}", dir, file)
    }
}

/// Keeps an object path inside its target's object directory: leading `/` and `.` components
/// are dropped and `..` becomes `__`.
fn object_relative(src: &str) -> String {
    src.split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .map(|c| if c == ".." { "__" } else { c })
        .collect::<Vec<&str>>()
        .join("/")
}

impl Target {
    pub fn objdir(&self) -> String {
        match self.config().objdir {
            Some(ref dir) => dir.clone(),
            None => join("obj", &self.name),
        }
    }

    /// The file name of the linked artifact, without any directory.
    pub fn file_name(&self) -> String {
        match self.kind {
            Kind::Library(ref lib) => match lib.linkage {
                Linkage::Static => format!("lib{}.a", self.name),
                Linkage::Shared => format!("lib{}.so", self.name),
            },
            Kind::Binary(_) | Kind::Test(_) => self.name.clone(),
        }
    }

    pub fn output(&self) -> String {
        join(
            self.config().bindir.as_deref().unwrap_or(""),
            &self.file_name(),
        )
    }

    /// The path dependents pass to their linker. Only libraries have one.
    pub fn link_artifact(&self) -> Option<String> {
        if self.kind.is_library() {
            Some(self.output())
        } else {
            None
        }
    }

    /// Sources this target compiles paired with the objects they produce.
    pub fn objects<'a>(&'a self, toolchain: &Toolchain) -> Vec<(&'a str, String)> {
        let objdir = self.objdir();
        self.srcs
            .iter()
            .filter(|src| toolchain.is_source(src))
            .map(|src| {
                let object = join(
                    &objdir,
                    &format!("{}{}", object_relative(src), toolchain.object_suffix),
                );
                (src.as_str(), object)
            })
            .collect()
    }

    fn compile_rule(&self, toolchain: &Toolchain, src: &str, object: String) -> Rule {
        let config = self.config();
        let mut task = toolchain.command();
        task.extend(
            config
                .includes
                .iter()
                .map(|p| format!("{}{}", toolchain.include_flag, p)),
        );
        task.extend(
            config
                .imports
                .iter()
                .map(|p| format!("{}{}", toolchain.import_flag, p)),
        );
        task.extend(
            config
                .versions
                .iter()
                .map(|v| format!("{}{}", toolchain.version_flag, v)),
        );
        task.extend(toolchain.flags.iter().cloned());
        if self.kind.is_test() {
            task.push(toolchain.test_flag.clone());
        }
        task.extend(config.compiler_flags.iter().cloned());
        task.push(toolchain.compile_only.clone());
        task.push(src.to_owned());
        task.push(toolchain.output(&object));

        Rule::new(vec![src.to_owned()], task, vec![object])
    }

    fn link_rule(&self, toolchain: &Toolchain, inputs: Vec<String>) -> Rule {
        let output = self.output();
        let mut task = toolchain.command();
        task.extend(toolchain.flags.iter().cloned());
        task.extend(self.config().linker_flags.iter().cloned());
        if let Kind::Library(ref lib) = self.kind {
            task.push(match lib.linkage {
                Linkage::Static => toolchain.static_flag.clone(),
                Linkage::Shared => toolchain.shared_flag.clone(),
            });
        }
        task.push(toolchain.output(&output));
        task.extend(inputs.iter().cloned());

        Rule::new(inputs, task, vec![output])
    }

    /// Lowers this target into its rules, in phase order: one compile rule per source, the link
    /// rule, and for tests a rule that runs the result.
    ///
    /// `deps` must be this target's dependencies as resolved by the registry. Only libraries
    /// among them are linked; nothing is chased past them. An artifact that is this target's own
    /// output (a library listing itself) is never a link input.
    pub fn rules<'a>(
        &'a self,
        deps: &[&Target],
        toolchain: &'a Toolchain,
    ) -> impl Iterator<Item = Rule> + 'a {
        let objects = self.objects(toolchain);
        let output = self.output();
        let link_inputs: Vec<String> = objects
            .iter()
            .map(|(_, object)| object.clone())
            .chain(deps.iter().filter_map(|dep| dep.link_artifact()))
            .filter(|input| *input != output)
            .collect();
        trace!(
            name = %self.name,
            objects = objects.len(),
            link_inputs = link_inputs.len(),
            "lowering"
        );

        let compile = objects
            .into_iter()
            .map(move |(src, object)| self.compile_rule(toolchain, src, object));
        let link = iter::once_with(move || self.link_rule(toolchain, link_inputs));
        let run = if self.kind.is_test() {
            Some(output)
        } else {
            None
        };
        let run = run
            .into_iter()
            .map(|binary| Rule::new(vec![binary.clone()], vec![binary], vec![]));

        compile.chain(link).chain(run)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Config;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn join_paths() {
        assert_eq!(join("", "app"), "app");
        assert_eq!(join("bin", "app"), "bin/app");
        assert_eq!(join("bin/", "app"), "bin/app");
    }

    #[test]
    fn static_library() {
        let toolchain = Toolchain::dmd();
        let lib = Target::library("io", Linkage::Static).with_srcs(vec!["a.d", "b.d"]);
        let rules: Vec<Rule> = lib.rules(&[], &toolchain).collect();
        assert_eq!(
            rules,
            vec![
                Rule::new(
                    strings(&["a.d"]),
                    strings(&["dmd", "-c", "a.d", "-ofobj/io/a.d.o"]),
                    strings(&["obj/io/a.d.o"]),
                ),
                Rule::new(
                    strings(&["b.d"]),
                    strings(&["dmd", "-c", "b.d", "-ofobj/io/b.d.o"]),
                    strings(&["obj/io/b.d.o"]),
                ),
                Rule::new(
                    strings(&["obj/io/a.d.o", "obj/io/b.d.o"]),
                    strings(&[
                        "dmd",
                        "-lib",
                        "-oflibio.a",
                        "obj/io/a.d.o",
                        "obj/io/b.d.o"
                    ]),
                    strings(&["libio.a"]),
                ),
            ]
        );
    }

    #[test]
    fn shared_library() {
        let toolchain = Toolchain::dmd();
        let lib = Target::library("io", Linkage::Shared).with_srcs(vec!["a.d"]);
        let link = lib.rules(&[], &toolchain).last().expect("link rule");
        assert_eq!(link.outputs, vec!["libio.so"]);
        assert_eq!(
            link.task,
            strings(&["dmd", "-shared", "-oflibio.so", "obj/io/a.d.o"])
        );
    }

    #[test]
    fn flag_order() {
        let toolchain = Toolchain {
            flags: strings(&["-w"]),
            ..Toolchain::dmd()
        }
        .with_wrapper(vec!["wrap"]);
        let config = Config {
            includes: strings(&["source", "import"]),
            imports: strings(&["views"]),
            versions: strings(&["Posix"]),
            compiler_flags: strings(&["-O", "-release"]),
            linker_flags: strings(&["-L-lsqlite3"]),
            ..Default::default()
        };
        let bin = Target::binary("app")
            .with_srcs(vec!["main.d"])
            .with_config(config);
        let rules: Vec<Rule> = bin.rules(&[], &toolchain).collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules[0].task,
            strings(&[
                "wrap",
                "dmd",
                "-Isource",
                "-Iimport",
                "-Jviews",
                "-version=Posix",
                "-w",
                "-O",
                "-release",
                "-c",
                "main.d",
                "-ofobj/app/main.d.o",
            ])
        );
        assert_eq!(
            rules[1].task,
            strings(&[
                "wrap",
                "dmd",
                "-w",
                "-L-lsqlite3",
                "-ofapp",
                "obj/app/main.d.o"
            ])
        );
    }

    #[test]
    fn directory_overrides() {
        let toolchain = Toolchain::dmd();
        let config = Config {
            objdir: Some("build/objects".to_owned()),
            bindir: Some("bin".to_owned()),
            ..Default::default()
        };
        let bin = Target::binary("app")
            .with_srcs(vec!["src/main.d"])
            .with_config(config);
        let rules: Vec<Rule> = bin.rules(&[], &toolchain).collect();
        assert_eq!(rules[0].outputs, vec!["build/objects/src/main.d.o"]);
        assert_eq!(rules[1].inputs, vec!["build/objects/src/main.d.o"]);
        assert_eq!(rules[1].outputs, vec!["bin/app"]);
    }

    #[test]
    fn non_sources_skipped() {
        let toolchain = Toolchain::dmd();
        let bin = Target::binary("app").with_srcs(vec!["README.md", "main.d", "app.di"]);
        let rules: Vec<Rule> = bin.rules(&[], &toolchain).collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].inputs, vec!["main.d"]);
        assert_eq!(rules[1].inputs, vec!["obj/app/main.d.o"]);
    }

    #[test]
    fn only_libraries_are_linked() {
        let toolchain = Toolchain::dmd();
        let shared = Target::library("net", Linkage::Shared).with_config(Config {
            bindir: Some("lib".to_owned()),
            ..Default::default()
        });
        let io = Target::library("io", Linkage::Static);
        let tool = Target::binary("tool");
        let test = Target::test("io_test");
        let bin = Target::binary("app")
            .with_srcs(vec!["main.d"])
            .with_deps(vec!["net", "tool", "io", "io_test"]);
        let link = bin
            .rules(&[&shared, &tool, &io, &test], &toolchain)
            .last()
            .expect("link rule");
        assert_eq!(
            link.inputs,
            strings(&["obj/app/main.d.o", "lib/libnet.so", "libio.a"])
        );
        assert_eq!(
            link.task,
            strings(&[
                "dmd",
                "-ofapp",
                "obj/app/main.d.o",
                "lib/libnet.so",
                "libio.a"
            ])
        );
    }

    #[test]
    fn test_runs_after_link() {
        let toolchain = Toolchain::dmd();
        let test = Target::test("io_test")
            .with_srcs(vec!["test.d"])
            .with_config(Config {
                bindir: Some("bin".to_owned()),
                ..Default::default()
            });
        let rules: Vec<Rule> = test.rules(&[], &toolchain).collect();
        assert_eq!(rules.len(), 3);
        assert_eq!(
            rules[0].task,
            strings(&["dmd", "-unittest", "-c", "test.d", "-ofobj/io_test/test.d.o"])
        );
        assert_eq!(rules[1].outputs, vec!["bin/io_test"]);
        assert_eq!(rules[2], Rule::new(strings(&["bin/io_test"]), strings(&["bin/io_test"]), vec![]));
        assert!(rules[2].is_always_run());
    }

    #[test]
    fn test_is_binary_plus_run() {
        let toolchain = Toolchain::dmd();
        let io = Target::library("io", Linkage::Static);
        let config = Config {
            includes: strings(&["source"]),
            compiler_flags: strings(&["-g"]),
            ..Default::default()
        };
        let test = Target::test("t")
            .with_srcs(vec!["a.d", "b.d"])
            .with_config(config.clone());
        let binary = Target::binary("t")
            .with_srcs(vec!["a.d", "b.d"])
            .with_config(Config {
                compiler_flags: strings(&["-unittest", "-g"]),
                ..config
            });

        let mut test_rules: Vec<Rule> = test.rules(&[&io], &toolchain).collect();
        let binary_rules: Vec<Rule> = binary.rules(&[&io], &toolchain).collect();
        let run = test_rules.pop().expect("run rule");
        assert_eq!(test_rules, binary_rules);
        assert_eq!(run.task, vec!["t"]);
        assert!(run.outputs.is_empty());
    }

    #[test]
    fn objects_stay_in_objdir() {
        let toolchain = Toolchain::dmd();
        let bin = Target::binary("app").with_srcs(vec![
            "../shared/x.d",
            "/abs/a.d",
            "./src//main.d",
        ]);
        let objects: Vec<String> = bin
            .objects(&toolchain)
            .into_iter()
            .map(|(_, object)| object)
            .collect();
        assert_eq!(
            objects,
            vec![
                "obj/app/__/shared/x.d.o",
                "obj/app/abs/a.d.o",
                "obj/app/src/main.d.o",
            ]
        );
        let rules: Vec<Rule> = bin.rules(&[], &toolchain).collect();
        assert_eq!(rules[3].inputs, objects);
        // The compiler still sees the source path as written.
        assert_eq!(rules[0].inputs, vec!["../shared/x.d"]);
        assert_eq!(
            rules[0].task,
            strings(&["dmd", "-c", "../shared/x.d", "-ofobj/app/__/shared/x.d.o"])
        );
    }

    #[test]
    fn self_dependency_not_linked() {
        let toolchain = Toolchain::dmd();
        let lib = Target::library("c", Linkage::Static)
            .with_srcs(vec!["c.d"])
            .with_deps(vec!["c"]);
        let link = lib.rules(&[&lib], &toolchain).last().expect("link rule");
        assert_eq!(link.inputs, vec!["obj/c/c.d.o"]);
        assert_eq!(link.outputs, vec!["libc.a"]);
        assert_eq!(link.task, strings(&["dmd", "-lib", "-oflibc.a", "obj/c/c.d.o"]));
    }

    #[test]
    fn dependency_named_like_own_output() {
        let toolchain = Toolchain::dmd();
        let io = Target::library("io", Linkage::Static);
        let bin = Target::binary("libio.a").with_deps(vec!["io"]);
        let link = bin.rules(&[&io], &toolchain).last().expect("link rule");
        assert!(link.inputs.is_empty());
        assert_eq!(link.outputs, vec!["libio.a"]);
    }

    #[test]
    fn no_sources() {
        let toolchain = Toolchain::dmd();
        let lib = Target::library("empty", Linkage::Static);
        let rules: Vec<Rule> = lib.rules(&[], &toolchain).collect();
        assert_eq!(
            rules,
            vec![Rule::new(
                vec![],
                strings(&["dmd", "-lib", "-oflibempty.a"]),
                strings(&["libempty.a"])
            )]
        );
    }
}
