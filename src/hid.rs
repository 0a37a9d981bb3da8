//! hidapi-backed transport for the CO2mini dongle.
//!
//! Behavior depends on build features:
//! - With `hid`: enumerates devices through hidapi and opens the single match.
//! - Without it: discovery fails with [`DriverError::Unsupported`], so the
//!   rest of the crate (decoding, acquisition, output) builds without libudev.

use std::time::Duration;

#[cfg(feature = "hid")]
use hidapi::{HidApi, HidDevice};
#[cfg(feature = "hid")]
use log::{debug, info, trace};

use crate::descrambler::RawFrame;
#[cfg(feature = "hid")]
use crate::descrambler::FRAME_LEN;
use crate::errors::{DriverError, Result};
use crate::transport::Transport;

/// Input reports are 8 bytes; read into a larger buffer to notice oversized ones.
#[cfg(feature = "hid")]
const READ_BUFFER_LEN: usize = 64;

/// An opened CO2mini HID device.
#[cfg(feature = "hid")]
pub struct HidTransport {
    device: Option<HidDevice>,
}

#[cfg(feature = "hid")]
impl HidTransport {
    /// Find and open the one device matching `vendor_id`/`product_id`.
    ///
    /// Zero matches and several matches are both setup failures.
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self> {
        let api = HidApi::new()?;
        let matches: Vec<_> = api
            .device_list()
            .filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
            .collect();

        let info = match matches.as_slice() {
            [] => {
                return Err(DriverError::DeviceNotFound {
                    vendor_id,
                    product_id,
                })
            }
            [single] => *single,
            many => return Err(DriverError::MultipleDevices { count: many.len() }),
        };

        debug!("opening hid device: path={:?}", info.path());
        let device = info.open_device(&api)?;
        info!(
            "hid device opened: vid={:#06x}, pid={:#06x}, product={}",
            vendor_id,
            product_id,
            info.product_string().unwrap_or("(unknown)")
        );

        Ok(Self {
            device: Some(device),
        })
    }

    fn device(&self) -> Result<&HidDevice> {
        self.device
            .as_ref()
            .ok_or_else(|| DriverError::Transport("device already closed".into()))
    }
}

#[cfg(feature = "hid")]
impl Transport for HidTransport {
    fn write_feature_report(&mut self, payload: &[u8]) -> Result<()> {
        self.device()?
            .send_feature_report(payload)
            .map_err(|e| DriverError::FeatureReport(e.to_string()))
    }

    fn read_report(&mut self, timeout: Duration) -> Result<Option<RawFrame>> {
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        let mut buf = [0u8; READ_BUFFER_LEN];
        let n = self.device()?.read_timeout(&mut buf, timeout_ms)?;
        match n {
            0 => Ok(None),
            FRAME_LEN => Ok(RawFrame::try_from(&buf[..n]).ok()),
            other => {
                trace!("discarding report of unexpected length {}", other);
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        // hidapi closes the handle on drop.
        if self.device.take().is_some() {
            debug!("hid device closed");
        }
        Ok(())
    }
}

/// Placeholder when the crate is built without the `hid` feature; never constructed.
#[cfg(not(feature = "hid"))]
pub struct HidTransport {
    never: std::convert::Infallible,
}

#[cfg(not(feature = "hid"))]
impl HidTransport {
    pub fn open(_vendor_id: u16, _product_id: u16) -> Result<Self> {
        Err(DriverError::Unsupported(
            "built without HID support (enable the `hid` feature)".into(),
        ))
    }
}

#[cfg(not(feature = "hid"))]
impl Transport for HidTransport {
    fn write_feature_report(&mut self, _payload: &[u8]) -> Result<()> {
        match self.never {}
    }

    fn read_report(&mut self, _timeout: Duration) -> Result<Option<RawFrame>> {
        match self.never {}
    }

    fn close(&mut self) -> Result<()> {
        match self.never {}
    }
}

#[cfg(all(test, not(feature = "hid")))]
mod tests {
    use super::*;
    use crate::descrambler::{PRODUCT_ID, VENDOR_ID};

    #[test]
    fn open_without_hid_feature_is_unsupported() {
        match HidTransport::open(VENDOR_ID, PRODUCT_ID) {
            Err(DriverError::Unsupported(msg)) => assert!(msg.contains("hid")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("open must fail without the hid feature"),
        }
    }
}
