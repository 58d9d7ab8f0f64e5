//! Telemetry wire packet.
//!
//! The outdoor node and the gateway agree on exactly one frame layout:
//!
//! ```text
//! byte 0      humidity        u8   relative humidity, %
//! bytes 1-2   outdoor_temp    i16  °C × 10, little-endian
//! bytes 3-4   pressure        u16  hPa, little-endian
//! byte 5      uv_raw          u8   raw UV reading, saturated at 255
//! ```
//!
//! The encoding is fixed-width and explicit — both nodes link the same
//! codec, so there is no struct-layout agreement to silently break.
//! Field order is the wire contract; reordering breaks interoperability.

use core::fmt;

/// Exact on-air frame length in bytes.
pub const WIRE_LEN: usize = 6;

/// One telemetry sample, built fresh on each outdoor wake cycle and
/// read-only at the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryPacket {
    /// Relative humidity in percent.
    pub humidity: u8,
    /// Outdoor temperature in tenths of a degree Celsius (255 = 25.5 °C).
    pub outdoor_temp_dc: i16,
    /// Atmospheric pressure in hPa.
    pub pressure_hpa: u16,
    /// Raw UV sensor reading, saturated at 255.
    pub uv_raw: u8,
}

/// Frame decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame is not exactly [`WIRE_LEN`] bytes.
    BadLength(usize),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadLength(n) => write!(f, "bad frame length: {} (expected {})", n, WIRE_LEN),
        }
    }
}

impl TelemetryPacket {
    /// Build a packet from raw sensor scalars.
    ///
    /// `temp_c` and `pressure_hpa` come from the barometric sensor;
    /// `uv_raw` is the ADC count (0–4095) and is saturated to the u8
    /// wire field. A failed sensor read is represented by all-zero
    /// scalars upstream, so an unreadable sensor still produces a frame.
    pub fn from_readings(humidity_pct: f32, temp_c: f32, pressure_hpa: f32, uv_raw: u16) -> Self {
        Self {
            humidity: round_clamp_u8(humidity_pct),
            outdoor_temp_dc: round_clamp_i16(temp_c * 10.0),
            pressure_hpa: round_clamp_u16(pressure_hpa),
            uv_raw: uv_raw.min(255) as u8,
        }
    }

    /// Encode into the fixed 6-byte wire frame.
    pub fn encode(&self) -> [u8; WIRE_LEN] {
        let t = self.outdoor_temp_dc.to_le_bytes();
        let p = self.pressure_hpa.to_le_bytes();
        [self.humidity, t[0], t[1], p[0], p[1], self.uv_raw]
    }

    /// Decode a received frame. Rejects anything that is not exactly
    /// [`WIRE_LEN`] bytes; all 6-byte inputs are valid packets.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        if frame.len() != WIRE_LEN {
            return Err(DecodeError::BadLength(frame.len()));
        }
        Ok(Self {
            humidity: frame[0],
            outdoor_temp_dc: i16::from_le_bytes([frame[1], frame[2]]),
            pressure_hpa: u16::from_le_bytes([frame[3], frame[4]]),
            uv_raw: frame[5],
        })
    }

    /// Pack the frame into a single u64 (low 48 bits) for atomic
    /// single-slot handoff between the receive callback and the main
    /// loop. See [`crate::gateway::mailbox`].
    pub fn pack_u64(&self) -> u64 {
        let f = self.encode();
        u64::from_le_bytes([f[0], f[1], f[2], f[3], f[4], f[5], 0, 0])
    }

    /// Inverse of [`pack_u64`](Self::pack_u64).
    pub fn unpack_u64(raw: u64) -> Self {
        let b = raw.to_le_bytes();
        // 6-byte slice of an 8-byte array always decodes.
        Self::decode(&b[..WIRE_LEN]).unwrap_or_default()
    }
}

fn round_clamp_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    libm_roundf(v).clamp(0.0, 255.0) as u8
}

fn round_clamp_u16(v: f32) -> u16 {
    if v.is_nan() {
        return 0;
    }
    libm_roundf(v).clamp(0.0, 65535.0) as u16
}

fn round_clamp_i16(v: f32) -> i16 {
    if v.is_nan() {
        return 0;
    }
    libm_roundf(v).clamp(-32768.0, 32767.0) as i16
}

// Round-half-away-from-zero, matching the C library roundf the original
// sensor path used.
fn libm_roundf(v: f32) -> f32 {
    if v >= 0.0 {
        (v + 0.5) as i64 as f32
    } else {
        (v - 0.5) as i64 as f32
    }
}
