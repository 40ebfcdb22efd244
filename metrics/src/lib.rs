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


//! Scope timing for the generator's phases.
//!
//! ```
//! bb_metrics::enable();
//! {
//!     bb_metrics::scoped_metric!("resolve");
//!     // ...
//! }
//! assert_eq!(bb_metrics::snapshot()[0].name, "resolve");
//! ```

use std::{
    cell::RefCell,
    fmt, io,
    sync::atomic::{AtomicBool, Ordering},
    thread_local,
    time::{Duration, Instant},
};

/// One row of the metrics table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metric {
    pub name: &'static str,
    pub count: usize,
    /// Microseconds.
    pub total: u128,
}

impl Metric {
    fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed.as_micros();
    }

    fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total as f64 / self.count as f64
        }
    }
}

pub struct ScopedMetric {
    metric_index: usize,
    start: Instant,
}

impl ScopedMetric {
    pub fn new(metric_index: usize) -> Self {
        ScopedMetric {
            metric_index,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedMetric {
    fn drop(&mut self) {
        METRICS.with(|m| {
            m.borrow_mut()
                .record(self.metric_index, self.start.elapsed())
        });
    }
}

#[derive(Debug, Default)]
struct Metrics {
    metrics: Vec<Metric>,
}

impl Metrics {
    fn new_metric(&mut self, name: &'static str) -> usize {
        // Metrics are keyed by name so the same phase timed from two call sites shares a row.
        if let Some(i) = self.metrics.iter().position(|m| m.name == name) {
            return i;
        }
        self.metrics.push(Metric {
            name,
            ..Default::default()
        });
        self.metrics.len() - 1
    }

    fn record(&mut self, i: usize, elapsed: Duration) {
        self.metrics[i].record(elapsed);
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metrics = &self.metrics;

        let name_width = metrics
            .iter()
            .map(|m| m.name.len())
            .fold("metric ".len(), std::cmp::max);
        writeln!(
            f,
            "{:name_width$} {:>6} {:>9} {:>11}",
            "metric ",
            "count",
            "avg (us)",
            "total (us)",
            name_width = name_width
        )?;
        writeln!(
            f,
            "{:-<name_width$} {:-^6} {:-^9} {:-^11}",
            "",
            "",
            "",
            "",
            name_width = name_width
        )?;
        for metric in metrics {
            writeln!(
                f,
                "{:name_width$} {: >6} {:>9.3} {:>11}",
                metric.name,
                metric.count,
                metric.average(),
                metric.total,
                name_width = name_width
            )?;
        }
        Ok(())
    }
}

#[macro_export]
macro_rules! scoped_metric {
    ($name:literal) => {
        let _scoped_metric = if $crate::is_enabled() {
            ::core::option::Option::Some($crate::ScopedMetric::new($crate::new_metric($name)))
        } else {
            ::core::option::Option::None
        };
    };
}

thread_local! {
    static METRICS: RefCell<Metrics> = RefCell::new(Metrics::default());
}
static ENABLED: AtomicBool = AtomicBool::new(false);

pub fn enable() {
    ENABLED.store(true, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn new_metric(name: &'static str) -> usize {
    METRICS.with(|m| m.borrow_mut().new_metric(name))
}

/// The rows recorded on this thread so far, in the order they were first seen.
pub fn snapshot() -> Vec<Metric> {
    METRICS.with(|m| m.borrow().metrics.clone())
}

pub fn write_to<W: io::Write>(mut writer: W) -> io::Result<()> {
    METRICS.with(|m| write!(writer, "{}", m.borrow()))
}

pub fn dump() {
    METRICS.with(|m| {
        eprintln!("{}", m.borrow());
    })
}
