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

use crate::decoder::{Message, Parity, PositionResolver, VelocityType};
use chrono::{DateTime, Duration, Utc};

/// Even and odd frames further apart than this are never paired
const CPR_PAIRING_WINDOW_SECS: i64 = 10;

/// What an identity message carrying a blank callsign does to the record.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum EmptyCallsign {
    /// leave the record untouched, the message is not counted
    Ignore,
    /// count the message, keep the previous callsign
    Count,
}

impl Default for EmptyCallsign {
    fn default() -> Self {
        EmptyCallsign::Ignore
    }
}

/// A buffered position frame waiting for its partner of opposite parity
#[derive(Debug, Clone, PartialEq)]
pub struct CprFrame {
    pub frame: String,
    pub captured: DateTime<Utc>,
}

/// Everything we know about one aircraft.
///
/// Fields are only ever set, never cleared, so once the record is
/// complete it stays complete.
#[derive(Debug, Clone)]
pub struct AircraftRecord {
    key: String,
    callsign: Option<String>,
    /// (latitude, longitude), always written together
    position: Option<(f64, f64)>,
    altitude: Option<i32>,
    ground_speed: Option<f64>,
    heading: Option<f64>,
    vertical_rate: Option<f64>,
    velocity_type: Option<VelocityType>,
    even: Option<CprFrame>,
    odd: Option<CprFrame>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    message_count: u64,
}

impl AircraftRecord {
    pub fn new(key: &str, now: DateTime<Utc>) -> Self {
        AircraftRecord {
            key: key.to_string(),
            callsign: None,
            position: None,
            altitude: None,
            ground_speed: None,
            heading: None,
            vertical_rate: None,
            velocity_type: None,
            even: None,
            odd: None,
            first_seen: now,
            last_seen: now,
            message_count: 1,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn callsign(&self) -> Option<&str> {
        self.callsign.as_ref().map(|s| s.as_str())
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        self.position
    }

    pub fn latitude(&self) -> Option<f64> {
        self.position.map(|p| p.0)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.position.map(|p| p.1)
    }

    pub fn altitude(&self) -> Option<i32> {
        self.altitude
    }

    pub fn ground_speed(&self) -> Option<f64> {
        self.ground_speed
    }

    pub fn heading(&self) -> Option<f64> {
        self.heading
    }

    pub fn vertical_rate(&self) -> Option<f64> {
        self.vertical_rate
    }

    pub fn velocity_type(&self) -> Option<VelocityType> {
        self.velocity_type
    }

    #[cfg(test)]
    pub fn even_frame(&self) -> Option<&CprFrame> {
        self.even.as_ref()
    }

    #[cfg(test)]
    pub fn odd_frame(&self) -> Option<&CprFrame> {
        self.odd.as_ref()
    }

    pub fn first_seen(&self) -> DateTime<Utc> {
        self.first_seen
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Identity, position (incl. altitude) and velocity are all known
    pub fn is_complete(&self) -> bool {
        self.callsign.is_some()
            && self.position.is_some()
            && self.altitude.is_some()
            && self.ground_speed.is_some()
            && self.heading.is_some()
            && self.vertical_rate.is_some()
    }

    /// Seconds since this aircraft was last heard at `now`
    pub fn idle(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_seen
    }

    /// Fuses `msg` into the record. `raw` is the frame text `msg` was
    /// decoded from, `now` its capture time.
    ///
    /// Every message refreshes `last_seen` and bumps the message count
    /// exactly once, except a blank callsign under `EmptyCallsign::Ignore`.
    /// Returns the completeness after the update.
    pub fn apply_message(&mut self,
                         msg: &Message,
                         raw: &str,
                         now: DateTime<Utc>,
                         resolver: &dyn PositionResolver,
                         empty_callsign: EmptyCallsign)
                         -> bool {
        match *msg {
            Message::Identity { callsign: Some(ref cs) } if cs.is_empty() => {
                match empty_callsign {
                    EmptyCallsign::Ignore => {
                        debug!("[{}]: blank callsign ignored", self.key);
                        return self.is_complete();
                    }
                    EmptyCallsign::Count => debug!("[{}]: blank callsign counted", self.key),
                }
            }
            Message::Identity { callsign: Some(ref cs) } => {
                trace!("[{}]: callsign {:?} -> {}", self.key, self.callsign, cs);
                self.callsign = Some(cs.clone());
            }
            Message::Position { altitude, parity } |
            Message::PositionGnss { altitude, parity } => {
                self.update_altitude(altitude);
                self.push_cpr_frame(raw, parity, now, resolver);
            }
            Message::SurfacePosition { altitude, .. } => self.update_altitude(altitude),
            Message::Velocity { speed, heading, vertical_rate, velocity_type } => {
                if let Some(s) = speed {
                    self.ground_speed = Some(s);
                }

                if let Some(h) = heading {
                    self.heading = Some(h);
                }

                if let Some(vr) = vertical_rate {
                    self.vertical_rate = Some(vr);
                }

                if let Some(t) = velocity_type {
                    self.velocity_type = Some(t);
                }

                trace!("[{}]: velocity gs={:?} hdg={:?} vr={:?} type={:?}",
                       self.key,
                       self.ground_speed,
                       self.heading,
                       self.vertical_rate,
                       self.velocity_type);
            }
            Message::SurveillanceAltitude { altitude } |
            Message::CommBAltitude { altitude } |
            Message::ShortAcas { altitude } |
            Message::LongAcas { altitude } => self.update_altitude(altitude),
            Message::SurveillanceIdentity { squawk } => {
                // informational only
                if let Some(sq) = squawk {
                    debug!("[{}]: squawk {:04}", self.key, sq);
                }
            }
            Message::Unknown { df } => {
                warn!("[{}]: unknown message type, DF={}", self.key, df);
            }
            // identity without a callsign, status, target state,
            // operation status, all-call and other ADS-B types
            _ => {}
        }

        self.touch(now);
        self.is_complete()
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_seen {
            self.last_seen = now;
        }

        self.message_count += 1;
    }

    fn update_altitude(&mut self, altitude: Option<i32>) {
        if let Some(alt) = altitude {
            trace!("[{}]: altitude {:?} -> {}", self.key, self.altitude, alt);
            self.altitude = Some(alt);
        }
    }

    /// Buffers the frame by parity and tries a global decode whenever
    /// both parities are buffered close enough together.
    fn push_cpr_frame(&mut self,
                      raw: &str,
                      parity: Parity,
                      now: DateTime<Utc>,
                      resolver: &dyn PositionResolver) {
        let frame = Some(CprFrame {
            frame: raw.to_string(),
            captured: now,
        });

        match parity {
            Parity::Even => self.even = frame,
            Parity::Odd => self.odd = frame,
        }

        if let (Some(even), Some(odd)) = (self.even.as_ref(), self.odd.as_ref()) {
            let dt = even.captured - odd.captured;

            if dt.num_milliseconds().abs() >= CPR_PAIRING_WINDOW_SECS * 1000 {
                trace!("[{}]: CPR pair {}s apart, not decoding", self.key, dt.num_seconds().abs());
                return;
            }

            match resolver.resolve(&even.frame, &odd.frame, even.captured, odd.captured) {
                Ok(Some(pos)) => {
                    trace!("[{}]: position {:?} -> {:?}", self.key, self.position, pos);
                    self.position = Some(pos);
                }
                Ok(None) => debug!("[{}]: CPR pair did not resolve", self.key),
                Err(e) => debug!("[{}]: CPR decoding failed: {}", self.key, e),
            }
        }
    }
}
