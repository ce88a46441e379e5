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

use crate::aircraft::AircraftRecord;
use crate::decoder::VelocityType;
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::io::{self, Write};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Position {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_ft: Option<i32>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Velocity {
    pub ground_speed_kts: Option<f64>,
    pub heading_deg: Option<f64>,
    pub vertical_rate_fpm: Option<f64>,
    pub velocity_type: Option<VelocityType>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Metadata {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub message_count: u64,
}

/// Point-in-time view of one aircraft as handed downstream
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub icao: String,
    pub timestamp: DateTime<Utc>,
    pub callsign: Option<String>,
    /// `None` unless at least one of its fields is known
    pub position: Option<Position>,
    /// `None` unless at least one of its fields is known
    pub velocity: Option<Velocity>,
    pub metadata: Metadata,
}

impl<'a> From<&'a AircraftRecord> for Snapshot {
    fn from(r: &'a AircraftRecord) -> Self {
        let position = if r.position().is_some() || r.altitude().is_some() {
            Some(Position {
                latitude: r.latitude(),
                longitude: r.longitude(),
                altitude_ft: r.altitude(),
            })
        } else {
            None
        };

        let velocity = if r.ground_speed().is_some() || r.heading().is_some() ||
                          r.vertical_rate().is_some() || r.velocity_type().is_some() {
            Some(Velocity {
                ground_speed_kts: r.ground_speed(),
                heading_deg: r.heading(),
                vertical_rate_fpm: r.vertical_rate(),
                velocity_type: r.velocity_type(),
            })
        } else {
            None
        };

        Snapshot {
            icao: r.key().to_string(),
            timestamp: r.last_seen(),
            callsign: r.callsign().map(|s| s.to_string()),
            position,
            velocity,
            metadata: Metadata {
                first_seen: r.first_seen(),
                last_seen: r.last_seen(),
                message_count: r.message_count(),
            },
        }
    }
}

/// A type for representing a downstream consumer of snapshots
pub trait Publisher {
    fn publish(&mut self, s: &Snapshot) -> Result<()>;
}

/// One compact JSON object per line
pub struct JsonLines<W: Write> {
    out: W,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self {
        JsonLines { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonLines<io::Stdout> {
    pub fn stdout() -> Box<dyn Publisher> {
        Box::new(JsonLines::new(io::stdout()))
    }
}

impl<W: Write> Publisher for JsonLines<W> {
    fn publish(&mut self, s: &Snapshot) -> Result<()> {
        serde_json::to_writer(&mut self.out, s)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;

        trace!("published {}", s.icao);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::EmptyCallsign;
    use crate::decoder::{DecodeError, Message, Parity, PositionResolver};
    use chrono::TimeZone;

    struct Fixed;

    impl PositionResolver for Fixed {
        fn resolve(&self,
                   _even: &str,
                   _odd: &str,
                   _even_time: DateTime<Utc>,
                   _odd_time: DateTime<Utc>)
                   -> std::result::Result<Option<(f64, f64)>, DecodeError> {
            Ok(Some((37.5, -122.25)))
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_500_000_000 + secs, 0).unwrap()
    }

    fn complete_record() -> AircraftRecord {
        let mut r = AircraftRecord::new("A1B2C3", t(0));
        let p = EmptyCallsign::Ignore;

        let ident = Message::Identity { callsign: Some("UAL123".into()) };

        r.apply_message(&ident, "", t(0), &Fixed, p);
        r.apply_message(&Message::Position {
                            altitude: Some(35000),
                            parity: Parity::Even,
                        },
                        "E",
                        t(1),
                        &Fixed,
                        p);
        r.apply_message(&Message::Position {
                            altitude: Some(35000),
                            parity: Parity::Odd,
                        },
                        "O",
                        t(2),
                        &Fixed,
                        p);
        r.apply_message(&Message::Velocity {
                            speed: Some(450.0),
                            heading: Some(270.0),
                            vertical_rate: Some(-64.0),
                            velocity_type: Some(VelocityType::GroundSpeed),
                        },
                        "",
                        t(3),
                        &Fixed,
                        p);
        r
    }

    #[test]
    fn test_snapshot_from_record() {
        let s = Snapshot::from(&complete_record());

        assert_eq!(s.icao, "A1B2C3");
        assert_eq!(s.timestamp, t(3));
        assert_eq!(s.callsign, Some("UAL123".to_string()));
        assert_eq!(s.position,
                   Some(Position {
                            latitude: Some(37.5),
                            longitude: Some(-122.25),
                            altitude_ft: Some(35000),
                        }));
        assert_eq!(s.velocity.as_ref().and_then(|v| v.velocity_type),
                   Some(VelocityType::GroundSpeed));
        assert_eq!(s.metadata.first_seen, t(0));
        assert_eq!(s.metadata.message_count, 5);
    }

    #[test]
    fn test_snapshot_groups_absent() {
        let r = AircraftRecord::new("ABCDEF", t(0));
        let s = Snapshot::from(&r);

        assert_eq!(s.position, None);
        assert_eq!(s.velocity, None);
        assert_eq!(s.callsign, None);

        let mut r = AircraftRecord::new("ABCDEF", t(0));
        r.apply_message(&Message::SurveillanceAltitude { altitude: Some(1200) },
                        "",
                        t(1),
                        &Fixed,
                        EmptyCallsign::Ignore);
        let s = Snapshot::from(&r);

        assert_eq!(s.position,
                   Some(Position {
                            latitude: None,
                            longitude: None,
                            altitude_ft: Some(1200),
                        }));
    }

    #[test]
    fn test_json_lines() {
        let mut p = JsonLines::new(Vec::new());
        let s = Snapshot::from(&complete_record());

        p.publish(&s).unwrap();
        p.publish(&s).unwrap();

        let out = String::from_utf8(p.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(out.ends_with('\n'));

        let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(v["icao"], "A1B2C3");
        assert_eq!(v["callsign"], "UAL123");
        assert_eq!(v["timestamp"], "2017-07-14T02:40:03Z");
        assert_eq!(v["position"]["latitude"], 37.5);
        assert_eq!(v["position"]["longitude"], -122.25);
        assert_eq!(v["position"]["altitude_ft"], 35000);
        assert_eq!(v["velocity"]["ground_speed_kts"], 450.0);
        assert_eq!(v["velocity"]["heading_deg"], 270.0);
        assert_eq!(v["velocity"]["vertical_rate_fpm"], -64.0);
        assert_eq!(v["velocity"]["velocity_type"], "GS");
        assert_eq!(v["metadata"]["first_seen"], "2017-07-14T02:40:00Z");
        assert_eq!(v["metadata"]["last_seen"], "2017-07-14T02:40:03Z");
        assert_eq!(v["metadata"]["message_count"], 5);
    }

    #[test]
    fn test_json_nulls() {
        let mut p = JsonLines::new(Vec::new());
        p.publish(&Snapshot::from(&AircraftRecord::new("ABCDEF", t(0)))).unwrap();

        let out = String::from_utf8(p.into_inner()).unwrap();
        let v: serde_json::Value = serde_json::from_str(out.trim()).unwrap();

        assert!(v["callsign"].is_null());
        assert!(v["position"].is_null());
        assert!(v["velocity"].is_null());
        assert_eq!(v["metadata"]["message_count"], 1);
    }
}
