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

//! Globally unambiguous airborne position from an even/odd CPR pair.

use super::modes::{read_reply, split_frame};
use super::*;
use chrono::{DateTime, Utc};
use rs1090::decode::adsb::ME;
use rs1090::decode::bds::bds05::AirbornePosition;
use rs1090::decode::cpr;
use rs1090::decode::DF;

/// Resolves a latitude/longitude pair from the two buffered frames.
///
/// `Ok(None)` means the pair is valid but does not yield a position
/// (e.g. the frames straddle a latitude zone boundary).
pub trait PositionResolver {
    fn resolve(&self,
               even: &str,
               odd: &str,
               even_time: DateTime<Utc>,
               odd_time: DateTime<Utc>)
               -> Result<Option<(f64, f64)>, DecodeError>;
}

pub struct CprResolver;

impl CprResolver {
    pub fn new() -> Box<dyn PositionResolver> {
        Box::new(CprResolver)
    }
}

impl PositionResolver for CprResolver {
    fn resolve(&self,
               even: &str,
               odd: &str,
               even_time: DateTime<Utc>,
               odd_time: DateTime<Utc>)
               -> Result<Option<(f64, f64)>, DecodeError> {
        let even = airborne_fields(even)?;
        let odd = airborne_fields(odd)?;

        let (oldest, latest) = if even_time > odd_time {
            (&odd, &even)
        } else {
            (&even, &odd)
        };

        let pos = cpr::airborne_position(oldest, latest);
        Ok(pos.map(|p| (round5(p.latitude), round5(p.longitude))))
    }
}

/// Airborne position fields of a DF17/18 squitter, TC 9-18 or 20-22
fn airborne_fields(text: &str) -> Result<AirbornePosition, DecodeError> {
    let buf = parse_hex(text)?;
    split_frame(text, &buf)?;

    match read_reply(text, &buf)?.df {
        DF::ExtendedSquitterADSB(adsb) => {
            match adsb.message {
                ME::BDS05 { inner, .. } => Ok(inner),
                _ => Err(DecodeError::NotPosition(text.to_string())),
            }
        }
        _ => Err(DecodeError::NotPosition(text.to_string())),
    }
}

fn round5(x: f64) -> f64 {
    (x * 100000.0).round() / 100000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EVEN: &str = "8D40621D58C382D690C8AC2863A7";
    const ODD: &str = "8D40621D58C386435CC412692AD6";

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1457996400 + secs, 0).unwrap()
    }

    #[test]
    fn test_resolve_latest_frame() {
        assert_eq!(CprResolver.resolve(EVEN, ODD, t(2), t(0)), Ok(Some((52.2572, 3.91937))));
        assert_eq!(CprResolver.resolve(EVEN, ODD, t(0), t(2)), Ok(Some((52.26578, 3.93891))));
    }

    #[test]
    fn test_resolve_not_position() {
        let ident = "8D4840D6202CC371C32CE0576098";

        assert_eq!(CprResolver.resolve(ident, ODD, t(2), t(0)),
                   Err(DecodeError::NotPosition(ident.into())));
        // short replies carry no CPR fields
        assert_eq!(CprResolver.resolve(EVEN, "5D40621D4F94D0", t(2), t(0)),
                   Err(DecodeError::NotPosition("5D40621D4F94D0".into())));
        assert!(CprResolver.resolve("zz", ODD, t(2), t(0)).is_err());
    }
}
