use std::io;
use thiserror::Error;

/// Session-level failures. Any of these ends an acquisition session.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "hid")]
    #[error("hid error: {0}")]
    Hid(#[from] hidapi::HidError),
    #[error("no device found (vid={vendor_id:#06x}, pid={product_id:#06x})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },
    #[error("multiple devices currently not supported (found {count})")]
    MultipleDevices { count: usize },
    #[error("writing feature report failed: {0}")]
    FeatureReport(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Per-frame conditions. The frame is dropped and collection goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("decoded frame has invalid checksum")]
    Checksum,
    #[error("unsupported op-code {0:#04x}")]
    UnsupportedOpcode(u8),
    #[error("unexpected report length {0}")]
    Length(usize),
}

pub type Result<T> = std::result::Result<T, DriverError>;
