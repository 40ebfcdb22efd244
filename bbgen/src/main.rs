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


use bbgen::{parse_args, run, Command, USAGE};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("BBGEN_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let config = match parse_args(pico_args::Arguments::from_env()) {
        Ok(Command::Help) => {
            print!("{}", USAGE);
            return;
        }
        Ok(Command::ListDebugModes) => {
            println!("debugging modes:\n  stats  print operation counts/timing info");
            return;
        }
        Ok(Command::Generate(config)) => config,
        Err(e) => {
            eprintln!("bbgen: error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    init_logging(config.verbose);
    if let Err(e) = run(config) {
        eprintln!("bbgen: error: {:#}", e);
        std::process::exit(1);
    }
}
