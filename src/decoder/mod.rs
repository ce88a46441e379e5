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

//! Turns raw Mode S frames into categorized messages.

pub mod cpr;
pub mod modes;

pub use self::cpr::{CprResolver, PositionResolver};
pub use self::modes::ModeS;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,

    #[error("invalid hex in frame {0}")]
    InvalidHex(String),

    #[error("frame {frame} has {bits} bits, DF={df} needs {expected}")]
    Length {
        frame: String,
        df: u8,
        bits: usize,
        expected: usize,
    },

    #[error("frame {frame} rejected: {reason}")]
    Rejected { frame: String, reason: String },

    #[error("frame {frame}: DF={df} is not supported")]
    Unsupported { frame: String, df: u8 },

    #[error("frame {0} is not an airborne position")]
    NotPosition(String),

    #[error("malformed frame {0}")]
    Malformed(String),
}

#[derive(PartialEq, Debug, Copy, Clone)]
pub enum Parity {
    Even,
    Odd,
}

#[derive(PartialEq, Debug, Copy, Clone, Serialize)]
pub enum VelocityType {
    #[serde(rename = "GS")]
    GroundSpeed,
    #[serde(rename = "IAS")]
    IndicatedAirspeed,
    #[serde(rename = "TAS")]
    TrueAirspeed,
}

/// A classified message, one variant per category with exactly
/// the fields that category can carry.
///
/// Altitudes are in feet, speeds in knots, vertical rates in ft/min
/// and headings in degrees.
#[derive(PartialEq, Debug, Clone)]
pub enum Message {
    /// `callsign` is `Some("")` when the field was present but blank
    Identity { callsign: Option<String> },
    Position { altitude: Option<i32>, parity: Parity },
    PositionGnss { altitude: Option<i32>, parity: Parity },
    SurfacePosition { altitude: Option<i32>, parity: Parity },
    Velocity {
        speed: Option<f64>,
        heading: Option<f64>,
        vertical_rate: Option<f64>,
        velocity_type: Option<VelocityType>,
    },
    SurveillanceAltitude { altitude: Option<i32> },
    CommBAltitude { altitude: Option<i32> },
    ShortAcas { altitude: Option<i32> },
    LongAcas { altitude: Option<i32> },
    /// squawk as four octal digits, e.g. 7700
    SurveillanceIdentity { squawk: Option<u16> },
    /// emergency state as reported, e.g. "none" or "general"
    Status { emergency: Option<String> },
    TargetState,
    OperationStatus,
    AllCall,
    AdsbOther { type_code: u8 },
    /// downlink format this decoder does not classify
    Unknown { df: u8 },
}

impl Message {
    pub fn name(&self) -> &'static str {
        match *self {
            Message::Identity { .. } => "identity",
            Message::Position { .. } => "position",
            Message::PositionGnss { .. } => "position_gnss",
            Message::SurfacePosition { .. } => "surface_position",
            Message::Velocity { .. } => "velocity",
            Message::SurveillanceAltitude { .. } => "surveillance_alt",
            Message::CommBAltitude { .. } => "commb_alt",
            Message::ShortAcas { .. } => "short_acas",
            Message::LongAcas { .. } => "long_acas",
            Message::SurveillanceIdentity { .. } => "surveillance_identity",
            Message::Status { .. } => "status",
            Message::TargetState => "target_state",
            Message::OperationStatus => "operation_status",
            Message::AllCall => "all_call",
            Message::AdsbOther { .. } => "adsb_other",
            Message::Unknown { .. } => "unknown_df",
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct DecodedMessage {
    /// frame text as handed to the decoder
    pub raw: String,
    pub df: u8,
    /// 24-bit aircraft address as six upper-case hex digits, or
    /// `UNKNOWN_KEY` for downlink formats that are not classified
    pub key: String,
    pub type_code: Option<u8>,
    pub message: Message,
}

/// Classifies one frame. Implementations report every failure as a
/// `DecodeError` and never panic on malformed input.
pub trait Decoder {
    fn decode(&self, frame: &str) -> Result<DecodedMessage, DecodeError>;
}

/// Hex text to bytes, two digits per byte.
pub fn parse_hex(frame: &str) -> Result<Vec<u8>, DecodeError> {
    if frame.is_empty() {
        return Err(DecodeError::Empty);
    }

    if frame.len() % 2 != 0 || !frame.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidHex(frame.to_string()));
    }

    frame
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            // both bytes are ASCII hex digits, checked above
            let s = std::str::from_utf8(pair)
                .map_err(|_| DecodeError::InvalidHex(frame.to_string()))?;
            u8::from_str_radix(s, 16).map_err(|_| DecodeError::InvalidHex(frame.to_string()))
        })
        .collect()
}
