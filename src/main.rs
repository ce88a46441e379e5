// stream1090 - fuses a raw 1090 MHz Mode S stream into per-aircraft state
// Copyright (C) 2017-2018  Datong Sun (dndx@idndx.com)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

#[macro_use]
extern crate log;
extern crate chrono;
extern crate env_logger;
#[macro_use]
extern crate nom;
extern crate serde_json;
#[macro_use]
extern crate serde_derive;

mod aircraft;
mod decoder;
mod error;
mod pipeline;
mod publish;
mod source;

use aircraft::{AircraftRegistry, EmptyCallsign};
use clap::Parser;
use decoder::{CprResolver, ModeS};
use pipeline::handle::SystemClock;
use pipeline::Pipeline;
use publish::JsonLines;
use source::{LineSource, Source};
use std::io;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(version, about = "Fuses a raw 1090 MHz Mode S stream into per-aircraft state")]
struct Args {
    /// Read raw frames from this file instead of stdin
    #[arg(long, conflicts_with = "connect")]
    input: Option<PathBuf>,

    /// Read raw frames from a dump1090 raw TCP feed, e.g. localhost:30002
    #[arg(long)]
    connect: Option<String>,

    /// Seconds of inactivity before an aircraft is dropped
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u32).range(1..))]
    ttl: u32,

    /// Seconds between two eviction passes
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..))]
    cleanup_interval: u32,

    /// Default log filter, RUST_LOG takes precedence
    #[arg(long, default_value = "info",
          value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: String,

    /// Count identity messages with a blank callsign instead of ignoring them
    #[arg(long)]
    count_empty_callsign: bool,
}

fn open_source(args: &Args) -> io::Result<Box<dyn Source>> {
    if let Some(ref path) = args.input {
        LineSource::open(path)
    } else if let Some(ref addr) = args.connect {
        LineSource::connect(addr)
    } else {
        Ok(LineSource::stdin())
    }
}

fn main() {
    let args = Args::parse();

    let env = env_logger::Env::default().default_filter_or(args.log_level.as_str());
    env_logger::Builder::from_env(env).init();

    let source = match open_source(&args) {
        Ok(s) => s,
        Err(e) => {
            error!("unable to open input: {}", e);
            process::exit(1);
        }
    };

    let empty_callsign = if args.count_empty_callsign {
        EmptyCallsign::Count
    } else {
        EmptyCallsign::Ignore
    };

    info!("ttl {}s, cleanup every {}s, blank callsigns: {:?}",
          args.ttl,
          args.cleanup_interval,
          empty_callsign);

    let registry = AircraftRegistry::new(args.ttl, CprResolver::new(), empty_callsign);

    let mut p = Pipeline::new(source,
                              ModeS::new(),
                              registry,
                              JsonLines::stdout(),
                              SystemClock::new(),
                              args.cleanup_interval);

    let stats = p.run();
    debug!("{:?}", stats);
}
