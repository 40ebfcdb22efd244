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


use anyhow::{self, Context};
use thiserror::Error;
use tracing::{debug, info};

use bb_metrics::scoped_metric;
use bb_report::Reporter;
use bb_rules::{DumpError, Rule};
use bb_targets::{ResolveError, Target, Toolchain};
use std::{
    ffi::OsString,
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

pub mod manifest;
pub use manifest::{Manifest, ManifestError};

pub const USAGE: &str = "\
usage: bbgen [options] OUTPUT

Generates the build description for the targets in a manifest and writes it
to OUTPUT ('-' for stdout).

options:
  -C DIR       change to DIR before doing anything else
  -f FILE      target manifest [default=targets.json]
  -d MODE      enable debugging (use '-d list' to list modes)
  -v           log what is being generated
  --compact    write the rule list without indentation
  -h, --help   print this message
";

#[derive(Debug, PartialEq, Eq)]
pub enum DebugMode {
    List,
    Stats,
}

#[derive(Error, Debug)]
#[error("Unknown debug setting '{0}'")]
pub struct DebugModeError(String);

impl std::str::FromStr for DebugMode {
    type Err = DebugModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stats" => Ok(DebugMode::Stats),
            "list" => Ok(DebugMode::List),
            e => Err(DebugModeError(e.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Pretty,
    Compact,
}

impl Default for Style {
    fn default() -> Self {
        Style::Pretty
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout,
    File(PathBuf),
}

impl From<&str> for Output {
    fn from(s: &str) -> Self {
        if s == "-" {
            Output::Stdout
        } else {
            Output::File(PathBuf::from(s))
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub execution_dir: Option<String>,
    pub manifest: String,
    pub output: Output,
    pub debug_modes: Vec<DebugMode>,
    pub verbose: bool,
    pub style: Style,
}

#[derive(Debug)]
pub enum Command {
    Help,
    ListDebugModes,
    Generate(Config),
}

#[derive(Error, Debug)]
pub enum ArgsError {
    #[error("{0}")]
    Parse(#[from] pico_args::Error),
    #[error("missing OUTPUT argument")]
    MissingOutput,
    #[error("unexpected arguments: {0:?}")]
    Unexpected(Vec<OsString>),
}

pub fn parse_args(mut args: pico_args::Arguments) -> Result<Command, ArgsError> {
    if args.contains(["-h", "--help"]) {
        return Ok(Command::Help);
    }
    let execution_dir: Option<String> = args.opt_value_from_str("-C")?;
    let manifest: Option<String> = args.opt_value_from_str("-f")?;
    let debug_modes: Vec<DebugMode> = args.values_from_str("-d")?;
    let verbose = args.contains("-v");
    let style = if args.contains("--compact") {
        Style::Compact
    } else {
        Style::Pretty
    };
    if debug_modes.contains(&DebugMode::List) {
        return Ok(Command::ListDebugModes);
    }
    let output: Option<String> = args.opt_free_from_str()?;
    let output = output.ok_or(ArgsError::MissingOutput)?;
    let rest = args.finish();
    if !rest.is_empty() {
        return Err(ArgsError::Unexpected(rest));
    }
    Ok(Command::Generate(Config {
        execution_dir,
        manifest: manifest.unwrap_or_else(|| "targets.json".to_owned()),
        output: Output::from(output.as_str()),
        debug_modes,
        verbose,
        style,
    }))
}

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("{0}")]
    Resolve(#[from] ResolveError),
    #[error("{0}")]
    Dump(#[from] DumpError),
}

fn resolve_rules<'a>(
    targets: &'a [Target],
    toolchain: &'a Toolchain,
) -> Result<impl Iterator<Item = Rule> + 'a, ResolveError> {
    scoped_metric!("resolve");
    let rules = bb_targets::rules(targets, toolchain)?;
    Ok(rules.inspect(|rule| debug!("{}", rule)))
}

/// Streams `rules` to `writer`. Lowering is lazy, so it is measured together with the dump.
pub fn write_rules<W, I>(rules: I, writer: W, style: Style) -> Result<(), DumpError>
where
    W: Write,
    I: IntoIterator<Item = Rule>,
{
    scoped_metric!("lower+dump");
    match style {
        Style::Pretty => bb_rules::dump(rules, writer),
        Style::Compact => bb_rules::dump_compact(rules, writer),
    }
}

/// Resolves `targets` and writes their rules. Nothing is written if resolution fails.
///
/// For programs that declare their targets in code instead of a manifest.
pub fn generate<W: Write>(
    targets: &[Target],
    toolchain: &Toolchain,
    writer: W,
    style: Style,
) -> Result<(), GenerateError> {
    let rules = resolve_rules(targets, toolchain)?;
    write_rules(rules, writer, style)?;
    Ok(())
}

fn load_manifest(path: &str) -> anyhow::Result<Manifest> {
    scoped_metric!("load");
    let file = File::open(path).with_context(|| format!("opening manifest {}", path))?;
    let manifest = Manifest::load(io::BufReader::new(file), Path::new("."))
        .with_context(|| format!("loading manifest {}", path))?;
    info!(
        manifest = path,
        targets = manifest.targets.len(),
        "loaded manifest"
    );
    Ok(manifest)
}

/// Writes the rules for `targets` to the configured output, reporting it to the executor.
///
/// Resolution happens before the output is opened, so a bad target set leaves any existing
/// output untouched.
pub fn emit(
    targets: &[Target],
    toolchain: &Toolchain,
    config: &Config,
    reporter: &mut Reporter,
) -> anyhow::Result<()> {
    let rules = resolve_rules(targets, toolchain)?;
    match &config.output {
        Output::Stdout => {
            let stdout = io::stdout();
            write_rules(rules, stdout.lock(), config.style).context("writing rules to stdout")?;
        }
        Output::File(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_rules(rules, BufWriter::new(file), config.style)
                .with_context(|| format!("writing rules to {}", path.display()))?;
            reporter
                .add_output(path)
                .context("reporting output to the build executor")?;
        }
    }
    Ok(())
}

pub fn run(config: Config) -> anyhow::Result<()> {
    if let Some(dir) = &config.execution_dir {
        std::env::set_current_dir(&dir).with_context(|| format!("changing to {} for -C", &dir))?;
    }

    let metrics_enabled = config.debug_modes.iter().any(|v| v == &DebugMode::Stats);
    if metrics_enabled {
        bb_metrics::enable();
    }

    let mut reporter = Reporter::from_env();
    let manifest = load_manifest(&config.manifest)?;
    reporter
        .add_input(&config.manifest)
        .context("reporting manifest to the build executor")?;

    emit(&manifest.targets, &manifest.toolchain, &config, &mut reporter)?;

    if metrics_enabled {
        bb_metrics::dump();
    }
    Ok(())
}
