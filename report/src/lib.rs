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


//! Lets a command running under the executor's dependency discovery wrapper report the files it
//! actually read and wrote.
//!
//! The executor hands the process two already-open descriptors through the environment. Each
//! report is the path bytes followed by a NUL, flushed immediately so the executor sees it while
//! the command is still running. Without the environment variables, reporting does nothing.

use std::{
    fmt::Debug,
    io::{self, Write},
    path::Path,
};

pub const INPUTS_ENV: &str = "BRILLIANT_BUILD_INPUTS";
pub const OUTPUTS_ENV: &str = "BRILLIANT_BUILD_OUTPUTS";

pub trait PathSink {
    fn report(&mut self, path: &[u8]) -> io::Result<()>;
}

impl Debug for dyn PathSink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PathSink{{}}")
    }
}

/// Writes each path followed by a NUL and flushes.
#[derive(Debug)]
pub struct NulTerminated<W: Write> {
    writer: W,
}

impl<W: Write> NulTerminated<W> {
    pub fn new(writer: W) -> Self {
        NulTerminated { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PathSink for NulTerminated<W> {
    fn report(&mut self, path: &[u8]) -> io::Result<()> {
        self.writer.write_all(path)?;
        self.writer.write_all(b"\0")?;
        self.writer.flush()
    }
}

#[derive(Debug, Default)]
pub struct Discard;

impl PathSink for Discard {
    fn report(&mut self, _path: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> &[u8] {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> std::borrow::Cow<'_, [u8]> {
    match path.to_string_lossy() {
        std::borrow::Cow::Borrowed(s) => std::borrow::Cow::Borrowed(s.as_bytes()),
        std::borrow::Cow::Owned(s) => std::borrow::Cow::Owned(s.into_bytes()),
    }
}

/// Whether `fd` can be handed to a sink: open, and not one of the standard streams.
#[cfg(unix)]
fn usable_descriptor(fd: std::os::unix::io::RawFd) -> bool {
    if fd <= 2 {
        return false;
    }
    // SAFETY: F_GETFD only reads the descriptor flags; a closed descriptor gives EBADF.
    unsafe { libc::fcntl(fd, libc::F_GETFD) >= 0 }
}

#[derive(Debug)]
pub struct Reporter {
    inputs: Box<dyn PathSink>,
    outputs: Box<dyn PathSink>,
    enabled: bool,
}

impl Reporter {
    pub fn new(inputs: Box<dyn PathSink>, outputs: Box<dyn PathSink>) -> Reporter {
        Reporter {
            inputs,
            outputs,
            enabled: true,
        }
    }

    pub fn disabled() -> Reporter {
        Reporter {
            inputs: Box::new(Discard),
            outputs: Box::new(Discard),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Connects to the descriptors named by `BRILLIANT_BUILD_INPUTS` and
    /// `BRILLIANT_BUILD_OUTPUTS`. Reporting is disabled altogether unless both name distinct,
    /// open descriptors other than stdin, stdout and stderr. Takes ownership of the descriptors,
    /// so call it at most once per process.
    pub fn from_env() -> Reporter {
        Reporter::from_vars(
            std::env::var(INPUTS_ENV).ok().as_deref(),
            std::env::var(OUTPUTS_ENV).ok().as_deref(),
        )
    }

    #[cfg(unix)]
    fn from_vars(inputs: Option<&str>, outputs: Option<&str>) -> Reporter {
        use std::{fs::File, os::unix::io::FromRawFd};

        let parse = |v: Option<&str>| v.and_then(|v| v.trim().parse::<i32>().ok());
        match (parse(inputs), parse(outputs)) {
            (Some(inputs), Some(outputs))
                if inputs != outputs && usable_descriptor(inputs) && usable_descriptor(outputs) =>
            {
                // SAFETY: both descriptors are open, distinct, and were passed to this process
                // by the executor for reporting only.
                let (inputs, outputs) =
                    unsafe { (File::from_raw_fd(inputs), File::from_raw_fd(outputs)) };
                Reporter::new(
                    Box::new(NulTerminated::new(inputs)),
                    Box::new(NulTerminated::new(outputs)),
                )
            }
            _ => Reporter::disabled(),
        }
    }

    #[cfg(not(unix))]
    fn from_vars(_inputs: Option<&str>, _outputs: Option<&str>) -> Reporter {
        Reporter::disabled()
    }

    pub fn add_input<P: AsRef<Path>>(&mut self, path: P) -> io::Result<()> {
        self.inputs.report(&path_bytes(path.as_ref()))
    }

    pub fn add_output<P: AsRef<Path>>(&mut self, path: P) -> io::Result<()> {
        self.outputs.report(&path_bytes(path.as_ref()))
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Reporter::disabled()
    }
}
