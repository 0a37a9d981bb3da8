//! Transport abstraction between the acquisition controller and the device.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use log::{debug, warn};

use crate::descrambler::RawFrame;
use crate::errors::Result;

/// An open, exclusively owned report channel to one device.
///
/// Implementations are moved onto the report delivery thread for the
/// collecting phase, hence the `Send + 'static` bound.
pub trait Transport: Send + 'static {
    /// Write a feature report, report id included as the first byte.
    fn write_feature_report(&mut self, payload: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for one input report.
    ///
    /// `Ok(None)` means nothing usable arrived in time (including reports of
    /// the wrong length). `Err` means the device is gone or I/O failed.
    fn read_report(&mut self, timeout: Duration) -> Result<Option<RawFrame>>;

    /// Release the device handle.
    fn close(&mut self) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_feature_report(&mut self, payload: &[u8]) -> Result<()> {
        (**self).write_feature_report(payload)
    }

    fn read_report(&mut self, timeout: Duration) -> Result<Option<RawFrame>> {
        (**self).read_report(timeout)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Owns a transport for one session and closes it exactly once.
///
/// Closing happens in `Drop`, so it also runs while unwinding.
pub struct TransportGuard<T: Transport> {
    inner: T,
}

impl<T: Transport> TransportGuard<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: Transport> Deref for TransportGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> DerefMut for TransportGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: Transport> Drop for TransportGuard<T> {
    fn drop(&mut self) {
        match self.inner.close() {
            Ok(()) => debug!("transport closed"),
            Err(e) => warn!("closing transport failed: {e}"),
        }
    }
}
