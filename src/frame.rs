//! Interpretation of decoded frames into typed sensor readings.

use crate::descrambler::DecodedFrame;
use crate::errors::FrameError;

/// Op-code of a CO2 concentration frame (ppm, no scaling).
pub const OP_CO2: u8 = 0x50;

/// Op-code of an ambient temperature frame (Kelvin * 16).
pub const OP_TEMPERATURE: u8 = 0x42;

const KELVIN_OFFSET: f64 = 273.15;

/// A single authenticated measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// CO2 concentration in ppm.
    Co2(u16),
    /// Temperature in degrees Celsius.
    Temperature(f64),
}

impl Reading {
    pub fn kind(&self) -> &'static str {
        match self {
            Reading::Co2(_) => "co2",
            Reading::Temperature(_) => "temperature",
        }
    }
}

/// Map a decoded frame to a reading.
///
/// Op-codes other than [`OP_CO2`] and [`OP_TEMPERATURE`] are reported as
/// [`FrameError::UnsupportedOpcode`]; the device sends several of them and they
/// are safe to ignore.
pub fn interpret(frame: &DecodedFrame) -> Result<Reading, FrameError> {
    let value = frame.value();
    match frame.opcode() {
        OP_CO2 => Ok(Reading::Co2(value)),
        OP_TEMPERATURE => Ok(Reading::Temperature(kelvin16_to_celsius(value))),
        op => Err(FrameError::UnsupportedOpcode(op)),
    }
}

fn kelvin16_to_celsius(value: u16) -> f64 {
    f64::from(value) / 16.0 - KELVIN_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(op: u8, hi: u8, lo: u8) -> DecodedFrame {
        let sum = op.wrapping_add(hi).wrapping_add(lo);
        DecodedFrame::new([op, hi, lo, sum, 0x0D, 0, 0, 0]).unwrap()
    }

    #[test]
    fn co2_frame_is_ppm_without_scaling() {
        assert_eq!(interpret(&frame(0x50, 0x01, 0x2C)), Ok(Reading::Co2(300)));
    }

    #[test]
    fn temperature_frame_converts_kelvin16_to_celsius() {
        match interpret(&frame(0x42, 0x11, 0x40)) {
            Ok(Reading::Temperature(t)) => assert!((t - 2.85).abs() < 1e-9, "got {t}"),
            other => panic!("expected temperature, got {other:?}"),
        }
    }

    #[test]
    fn temperature_below_freezing_is_negative() {
        // 4000 / 16 = 250 K
        match interpret(&frame(0x42, 0x0F, 0xA0)) {
            Ok(Reading::Temperature(t)) => assert!((t + 23.15).abs() < 1e-9, "got {t}"),
            other => panic!("expected temperature, got {other:?}"),
        }
    }

    #[test]
    fn full_range_co2_value() {
        assert_eq!(
            interpret(&frame(0x50, 0xFF, 0xFF)),
            Ok(Reading::Co2(u16::MAX))
        );
    }

    #[test]
    fn unknown_opcode_is_unsupported() {
        assert_eq!(
            interpret(&frame(0x99, 0x00, 0x10)),
            Err(FrameError::UnsupportedOpcode(0x99))
        );
        // Humidity-like op-codes some firmware sends are ignored too.
        assert_eq!(
            interpret(&frame(0x41, 0x00, 0x00)),
            Err(FrameError::UnsupportedOpcode(0x41))
        );
    }

    #[test]
    fn reading_kind_names() {
        assert_eq!(Reading::Co2(1).kind(), "co2");
        assert_eq!(Reading::Temperature(0.0).kind(), "temperature");
    }
}
