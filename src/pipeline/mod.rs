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

pub mod handle;

use self::handle::Clock;
use crate::aircraft::AircraftRegistry;
use crate::decoder::Decoder;
use crate::error::Result;
use crate::publish::{Publisher, Snapshot};
use crate::source::{frame_text, Source};
use chrono::{DateTime, Duration, Utc};
use std::io::ErrorKind;

#[derive(Debug, Default, PartialEq, Copy, Clone)]
pub struct Stats {
    pub lines: u64,
    pub frames: u64,
    pub errors: u64,
    pub published: u64,
}

/// source -> decoder -> registry -> publisher, one line at a time
pub struct Pipeline {
    source: Box<dyn Source>,
    decoder: Box<dyn Decoder>,
    registry: AircraftRegistry,
    publisher: Box<dyn Publisher>,
    clock: Box<dyn Clock>,
    cleanup_interval: Duration,
    last_cleanup: DateTime<Utc>,
    stats: Stats,
}

impl Pipeline {
    pub fn new(source: Box<dyn Source>,
               decoder: Box<dyn Decoder>,
               registry: AircraftRegistry,
               publisher: Box<dyn Publisher>,
               clock: Box<dyn Clock>,
               cleanup_interval: u32)
               -> Self {
        let last_cleanup = clock.now();

        Pipeline {
            source,
            decoder,
            registry,
            publisher,
            clock,
            cleanup_interval: Duration::seconds(i64::from(cleanup_interval)),
            last_cleanup,
            stats: Stats::default(),
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &AircraftRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Decodes one raw line and fuses it. A snapshot is returned, and
    /// published, whenever the aircraft is complete afterwards.
    pub fn process_line(&mut self, line: &str) -> Result<Option<Snapshot>> {
        let frame = match frame_text(line) {
            Some(f) => f,
            None => {
                trace!("skipping line {:?}", line);
                return Ok(None);
            }
        };

        self.stats.frames += 1;

        let now = self.clock.now();
        let d = self.decoder.decode(frame)?;

        debug!("[{}]: DF={} {} {:?}", d.key, d.df, d.message.name(), d.type_code);

        let snapshot = match self.registry.ingest_decoded(&d, now) {
            Some(r) => Snapshot::from(r),
            None => return Ok(None),
        };

        self.publisher.publish(&snapshot)?;
        self.stats.published += 1;

        Ok(Some(snapshot))
    }

    /// Evicts stale aircraft if the cleanup interval has passed
    fn maybe_cleanup(&mut self) {
        let now = self.clock.now();

        if now - self.last_cleanup <= self.cleanup_interval {
            return;
        }

        let evicted = self.registry.evict_expired(now);
        self.last_cleanup = now;

        info!("tracked: {}, complete: {}, evicted: {}",
              self.registry.count(),
              self.registry.complete_count(),
              evicted);
    }

    /// Runs until the source is exhausted or fails to read
    pub fn run(&mut self) -> Stats {
        loop {
            let line = match self.source.next_line() {
                None => break,
                Some(Ok(line)) => line,
                Some(Err(ref e)) if e.kind() == ErrorKind::InvalidData => {
                    warn!("skipping line: {}", e);
                    self.stats.errors += 1;
                    continue;
                }
                Some(Err(e)) => {
                    error!("read error: {}", e);
                    break;
                }
            };

            self.stats.lines += 1;

            if let Err(e) = self.process_line(&line) {
                error!("unable to process {:?}: {}", line.trim(), e);
                self.stats.errors += 1;
            }

            self.maybe_cleanup();
        }

        info!("input ended, {} lines, {} frames, {} errors, {} published, \
               {} aircraft tracked ({} complete)",
              self.stats.lines,
              self.stats.frames,
              self.stats.errors,
              self.stats.published,
              self.registry.count(),
              self.registry.complete_count());

        self.stats
    }
}
