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


use serde::Serializer as _;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter, Serializer};
use std::{
    io::{Read, Write},
    string::FromUtf8Error,
};
use thiserror::Error;

use crate::Rule;

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("string utf-8 error")]
    StringUtf8Error(#[from] FromUtf8Error),
}

fn dump_with<W, F, I>(rules: I, writer: W, formatter: F) -> Result<(), DumpError>
where
    W: Write,
    F: Formatter,
    I: IntoIterator<Item = Rule>,
{
    let mut ser = Serializer::with_formatter(writer, formatter);
    // collect_seq pulls from the iterator as it writes, so the rules never all live in memory at
    // once.
    (&mut ser).collect_seq(rules)?;
    let mut writer = ser.into_inner();
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Writes the rule list as an indented JSON array.
pub fn dump<W, I>(rules: I, writer: W) -> Result<(), DumpError>
where
    W: Write,
    I: IntoIterator<Item = Rule>,
{
    dump_with(rules, writer, PrettyFormatter::with_indent(b"    "))
}

pub fn dump_compact<W, I>(rules: I, writer: W) -> Result<(), DumpError>
where
    W: Write,
    I: IntoIterator<Item = Rule>,
{
    dump_with(rules, writer, CompactFormatter)
}

pub fn to_string<I>(rules: I) -> Result<String, DumpError>
where
    I: IntoIterator<Item = Rule>,
{
    let mut buf = Vec::new();
    dump(rules, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Reads a rule list back. Key order within each object does not matter.
pub fn load<R: Read>(reader: R) -> Result<Vec<Rule>, DumpError> {
    Ok(serde_json::from_reader(reader)?)
}
