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

//! Mode S / 1090ES downlink decoder.
//!
//! The frame is split and length checked here, field decoding is done
//! by rs1090 and its output mapped onto `Message`.

use super::*;
use nom::{be_u8, IResult};
use rs1090::decode::Message as Reply;
use rs1090::prelude::DekuContainerRead;
use serde_json::Value;
use std::cmp::min;

const SHORT_FRAME_BITS: usize = 56;
const LONG_FRAME_BITS: usize = 112;

/// Key shared by every frame whose downlink format is not classified
pub const UNKNOWN_KEY: &str = "UNKNOWN";

/// A frame split into the DF/CA byte and everything up to the
/// 24-bit parity field.
#[derive(PartialEq, Debug)]
pub struct Frame<'a> {
    pub head: u8,
    pub body: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn df(&self) -> u8 {
        min(self.head >> 3, 24)
    }

    /// Type code of an extended squitter, first 5 bits of ME
    fn type_code(&self) -> u8 {
        self.body[3] >> 3
    }
}

named!(short_frame<Frame>,
       do_parse!(head: be_u8 >> body: take!(3) >> take!(3) >> (Frame { head, body })));

named!(long_frame<Frame>,
       do_parse!(head: be_u8 >> body: take!(10) >> take!(3) >> (Frame { head, body })));

/// Splits a binary frame, its length must match what its DF requires.
pub fn split_frame<'a>(text: &str, buf: &'a [u8]) -> Result<Frame<'a>, DecodeError> {
    if buf.is_empty() {
        return Err(DecodeError::Empty);
    }

    let df = min(buf[0] >> 3, 24);
    // the first DF bit tells short from long replies
    let expected = if df < 16 {
        SHORT_FRAME_BITS
    } else {
        LONG_FRAME_BITS
    };

    if buf.len() * 8 != expected {
        return Err(DecodeError::Length {
                       frame: text.to_string(),
                       df,
                       bits: buf.len() * 8,
                       expected,
                   });
    }

    let parsed = if expected == SHORT_FRAME_BITS {
        short_frame(buf)
    } else {
        long_frame(buf)
    };

    match parsed {
        IResult::Done(_, f) => Ok(f),
        _ => Err(DecodeError::Malformed(text.to_string())),
    }
}

/// Full rs1090 decode of a length checked frame
pub fn read_reply(text: &str, buf: &[u8]) -> Result<Reply, DecodeError> {
    match Reply::from_bytes((buf, 0)) {
        Ok((_, reply)) => Ok(reply),
        Err(e) => Err(rejected(text, e.to_string())),
    }
}

fn rejected(text: &str, reason: String) -> DecodeError {
    DecodeError::Rejected {
        frame: text.to_string(),
        reason,
    }
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let scale = 10_f64.powi(decimals);
    (x * scale).round() / scale
}

fn altitude(v: &Value) -> Option<i32> {
    v.get("altitude").and_then(Value::as_i64).map(|a| a as i32)
}

fn parity(text: &str, v: &Value) -> Result<Parity, DecodeError> {
    match v.get("parity").and_then(Value::as_str).map(|p| p.to_lowercase()) {
        Some(ref p) if p == "even" => Ok(Parity::Even),
        Some(ref p) if p == "odd" => Ok(Parity::Odd),
        _ => Err(DecodeError::Malformed(text.to_string())),
    }
}

/// `#` padding dropped, surrounding blanks trimmed, may end up empty
fn callsign(v: &Value) -> Option<String> {
    v.get("callsign")
        .and_then(Value::as_str)
        .map(|cs| cs.replace('#', "").trim().to_string())
}

/// 4096 code as its four octal digits read in decimal, e.g. 7700
fn squawk(v: &Value) -> Option<u16> {
    match v.get("squawk") {
        Some(&Value::String(ref s)) => s.parse().ok(),
        Some(n) => n.as_u64().map(|n| n as u16),
        None => None,
    }
}

fn velocity(v: &Value) -> Message {
    let number = |k: &str| v.get(k).and_then(Value::as_f64);
    let angle = |k: &str| number(k).map(|a| round_to(a, 2));
    let vertical_rate = number("vertical_rate");

    let (speed, heading, velocity_type) = if let Some(gs) = number("groundspeed") {
        (Some(gs.trunc()), angle("track"), Some(VelocityType::GroundSpeed))
    } else if let Some(tas) = number("TAS") {
        (Some(tas), angle("heading"), Some(VelocityType::TrueAirspeed))
    } else if let Some(ias) = number("IAS") {
        (Some(ias), angle("heading"), Some(VelocityType::IndicatedAirspeed))
    } else {
        let typ = match v.get("airspeed_type").and_then(Value::as_str) {
            Some("TAS") => Some(VelocityType::TrueAirspeed),
            Some("IAS") => Some(VelocityType::IndicatedAirspeed),
            _ => None,
        };

        (number("airspeed"), angle("heading"), typ)
    };

    Message::Velocity {
        speed,
        heading,
        vertical_rate,
        velocity_type: speed.and(velocity_type),
    }
}

fn extended_squitter(text: &str, tc: u8, v: &Value) -> Result<Message, DecodeError> {
    Ok(match tc {
           1..=4 => Message::Identity { callsign: callsign(v) },
           5..=8 => {
               Message::SurfacePosition {
                   altitude: None,
                   parity: parity(text, v)?,
               }
           }
           9..=18 => {
               Message::Position {
                   altitude: altitude(v),
                   parity: parity(text, v)?,
               }
           }
           19 => velocity(v),
           20..=22 => {
               Message::PositionGnss {
                   altitude: altitude(v),
                   parity: parity(text, v)?,
               }
           }
           28 => {
               let emergency = v.get("emergency_state").and_then(Value::as_str);
               Message::Status { emergency: emergency.map(|s| s.to_string()) }
           }
           29 => Message::TargetState,
           31 => Message::OperationStatus,
           _ => Message::AdsbOther { type_code: tc },
       })
}

/// The built-in decoder for `*`-framed hex replies as produced by
/// dump1090 `--raw`.
pub struct ModeS;

impl ModeS {
    pub fn new() -> Box<dyn Decoder> {
        Box::new(ModeS)
    }
}

impl Decoder for ModeS {
    fn decode(&self, text: &str) -> Result<DecodedMessage, DecodeError> {
        let buf = parse_hex(text)?;
        let frame = split_frame(text, &buf)?;
        let df = frame.df();

        match df {
            0 | 4 | 5 | 11 | 16 | 17 | 18 | 20 => {}
            // Comm-B identity replies carry no altitude to fuse
            21 => {
                return Err(DecodeError::Unsupported {
                               frame: text.to_string(),
                               df,
                           })
            }
            _ => {
                return Ok(DecodedMessage {
                              raw: text.to_string(),
                              df,
                              key: UNKNOWN_KEY.to_string(),
                              type_code: None,
                              message: Message::Unknown { df },
                          })
            }
        }

        let reply = read_reply(text, &buf)?;
        let v = serde_json::to_value(&reply).map_err(|e| rejected(text, e.to_string()))?;

        let key = match v.get("icao24").and_then(Value::as_str) {
            Some(icao) => icao.to_uppercase(),
            None => return Err(DecodeError::Malformed(text.to_string())),
        };

        let (type_code, message) = match df {
            17 | 18 => {
                let tc = frame.type_code();
                (Some(tc), extended_squitter(text, tc, &v)?)
            }
            0 => (None, Message::ShortAcas { altitude: altitude(&v) }),
            4 => (None, Message::SurveillanceAltitude { altitude: altitude(&v) }),
            5 => (None, Message::SurveillanceIdentity { squawk: squawk(&v) }),
            11 => (None, Message::AllCall),
            16 => (None, Message::LongAcas { altitude: altitude(&v) }),
            _ => (None, Message::CommBAltitude { altitude: altitude(&v) }),
        };

        Ok(DecodedMessage {
               raw: text.to_string(),
               df,
               key,
               type_code,
               message,
           })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str) -> DecodedMessage {
        ModeS.decode(text).unwrap()
    }

    #[test]
    fn test_split_frame() {
        let buf = [0x5D, 0x40, 0x62, 0x1D, 0x4F, 0x94, 0xD0];
        assert_eq!(split_frame("5D40621D4F94D0", &buf),
                   Ok(Frame {
                          head: 0x5D,
                          body: &[0x40, 0x62, 0x1D],
                      }));

        // DF17 needs 112 bits
        assert_eq!(split_frame("8D40621D4F94D0", &[0x8D, 0x40, 0x62, 0x1D, 0x4F, 0x94, 0xD0]),
                   Err(DecodeError::Length {
                           frame: "8D40621D4F94D0".into(),
                           df: 17,
                           bits: 56,
                           expected: 112,
                       }));
    }

    #[test]
    fn test_address_recovery() {
        assert_eq!(decode("A0001839CA3800315800007448D9").key, "400940");
        assert_eq!(decode("A000139381951536E024D4CCF6B5").key, "3C4DD2");
        assert_eq!(decode("A000029CFFBAA11E2004727281F1").key, "4243D0");
        assert_eq!(decode("200014B41EF5DC").key, "40621D");
    }

    #[test]
    fn test_identity() {
        let m = decode("8D4840D6202CC371C32CE0576098");
        assert_eq!(m.df, 17);
        assert_eq!(m.key, "4840D6");
        assert_eq!(m.type_code, Some(4));
        assert_eq!(m.message, Message::Identity { callsign: Some("KLM1023".into()) });

        // all spaces, present but empty
        assert_eq!(decode("8D40621D208208208208203821E7").message,
                   Message::Identity { callsign: Some("".into()) });
    }

    #[test]
    fn test_airborne_position() {
        let m = decode("8D40621D58C382D690C8AC2863A7");
        assert_eq!(m.key, "40621D");
        assert_eq!(m.type_code, Some(11));
        assert_eq!(m.message,
                   Message::Position {
                       altitude: Some(38000),
                       parity: Parity::Even,
                   });

        assert_eq!(decode("8D40621D58C386435CC412692AD6").message,
                   Message::Position {
                       altitude: Some(38000),
                       parity: Parity::Odd,
                   });
    }

    #[test]
    fn test_gnss_and_surface_position() {
        let m = decode("8D40621DA03E8000000000800E6F");
        assert_eq!(m.type_code, Some(20));
        match m.message {
            Message::PositionGnss { parity: Parity::Even, .. } => {}
            other => panic!("unexpected {:?}", other),
        }

        let m = decode("8D40621D3800040000000073A48B");
        assert_eq!(m.type_code, Some(7));
        assert_eq!(m.message,
                   Message::SurfacePosition {
                       altitude: None,
                       parity: Parity::Odd,
                   });
    }

    #[test]
    fn test_velocity() {
        assert_eq!(decode("8D485020994409940838175B284F").message,
                   Message::Velocity {
                       speed: Some(159.0),
                       heading: Some(182.88),
                       vertical_rate: Some(-832.0),
                       velocity_type: Some(VelocityType::GroundSpeed),
                   });

        // subtype 3, airspeed
        assert_eq!(decode("8DA05F219B06B6AF189400CBC33F").message,
                   Message::Velocity {
                       speed: Some(375.0),
                       heading: Some(243.98),
                       vertical_rate: Some(-2304.0),
                       velocity_type: Some(VelocityType::TrueAirspeed),
                   });
    }

    #[test]
    fn test_surveillance_replies() {
        let m = decode("A02014B400000000000000F9D514");
        assert_eq!(m.df, 20);
        assert_eq!(m.message, Message::CommBAltitude { altitude: Some(32300) });

        let m = decode("200014B41EF5DC");
        assert_eq!(m.df, 4);
        assert_eq!(m.message, Message::SurveillanceAltitude { altitude: Some(32300) });

        let m = decode("2800292DDE42B9");
        assert_eq!(m.df, 5);
        assert_eq!(m.key, "40621D");
        assert_eq!(m.message, Message::SurveillanceIdentity { squawk: Some(1346) });

        let m = decode("5D40621D4F94D0");
        assert_eq!(m.df, 11);
        assert_eq!(m.key, "40621D");
        assert_eq!(m.message, Message::AllCall);
    }

    #[test]
    fn test_comm_b_identity_unsupported() {
        assert_eq!(ModeS.decode("A800139381951536E024D4CCF6B5"),
                   Err(DecodeError::Unsupported {
                           frame: "A800139381951536E024D4CCF6B5".into(),
                           df: 21,
                       }));
    }

    #[test]
    fn test_unknown_formats_share_one_key() {
        // DF1 and DF19 from unrelated transmitters
        let a = decode("08C0FFEE123456");
        let b = decode("98ABCDEF00000000000000123456");

        assert_eq!(a.message, Message::Unknown { df: 1 });
        assert_eq!(b.message, Message::Unknown { df: 19 });
        assert_eq!(a.key, UNKNOWN_KEY);
        assert_eq!(b.key, UNKNOWN_KEY);
        assert_eq!(b.type_code, None);

        // anything from DF24 up is folded into 24
        assert_eq!(decode("F8000000000000000000000000FF").message,
                   Message::Unknown { df: 24 });
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(ModeS.decode(""), Err(DecodeError::Empty));
        assert_eq!(ModeS.decode("8D4840D6202CC371C32CE05760"),
                   Err(DecodeError::Length {
                           frame: "8D4840D6202CC371C32CE05760".into(),
                           df: 17,
                           bits: 104,
                           expected: 112,
                       }));
        assert!(ModeS.decode("8D4840D6202CC371C32CE057609G").is_err());
    }
}
