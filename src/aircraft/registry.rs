// stream1090 - fuses a raw 1090 MHz Mode S stream into per-aircraft state
// Copyright (C) 2017  Datong Sun (dndx@idndx.com)
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

use super::record::{AircraftRecord, EmptyCallsign};
use crate::decoder::{DecodedMessage, Message, PositionResolver};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// All aircraft currently tracked, one record per key.
pub struct AircraftRegistry {
    aircraft: HashMap<String, AircraftRecord>,
    /// seconds of inactivity before a record is evicted
    ttl: u32,
    resolver: Box<dyn PositionResolver>,
    empty_callsign: EmptyCallsign,
}

impl AircraftRegistry {
    pub fn new(ttl: u32,
               resolver: Box<dyn PositionResolver>,
               empty_callsign: EmptyCallsign)
               -> Self {
        AircraftRegistry {
            aircraft: HashMap::new(),
            ttl,
            resolver,
            empty_callsign,
        }
    }

    /// Applies one message to the record for `key`, creating it first
    /// if the key is new. Returns the record whenever it is complete
    /// after the update, not only on the transition.
    pub fn ingest(&mut self,
                  key: &str,
                  msg: &Message,
                  raw: &str,
                  now: DateTime<Utc>)
                  -> Option<&AircraftRecord> {
        if !self.aircraft.contains_key(key) {
            debug!("new aircraft {}", key);
        }

        let record = self.aircraft
            .entry(key.to_string())
            .or_insert_with(|| AircraftRecord::new(key, now));

        if record.apply_message(msg, raw, now, self.resolver.as_ref(), self.empty_callsign) {
            Some(record)
        } else {
            None
        }
    }

    pub fn ingest_decoded(&mut self,
                          d: &DecodedMessage,
                          now: DateTime<Utc>)
                          -> Option<&AircraftRecord> {
        self.ingest(&d.key, &d.message, &d.raw, now)
    }

    /// Drops every record idle for more than `threshold` seconds,
    /// returns how many were dropped.
    pub fn evict_stale(&mut self, threshold: u32, now: DateTime<Utc>) -> usize {
        let before = self.aircraft.len();
        let threshold = Duration::seconds(i64::from(threshold));

        self.aircraft.retain(|k, r| {
            let keep = r.idle(now) <= threshold;
            if !keep {
                debug!("aircraft {} timed out, {} messages", k, r.message_count());
            }
            keep
        });

        before - self.aircraft.len()
    }

    /// `evict_stale` with the configured TTL
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        self.evict_stale(ttl, now)
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&AircraftRecord> {
        self.aircraft.get(key)
    }

    pub fn count(&self) -> usize {
        self.aircraft.len()
    }

    pub fn complete_count(&self) -> usize {
        self.complete().count()
    }

    pub fn complete<'a>(&'a self) -> impl Iterator<Item = &'a AircraftRecord> + 'a {
        self.aircraft.values().filter(|r| r.is_complete())
    }
}
