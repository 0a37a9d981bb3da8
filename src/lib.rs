//! Reader for CO2mini-style USB HID CO2 / temperature monitors.
//!
//! The dongle (vendor `0x04D9`, product `0xA052`) streams scrambled 8-byte
//! input reports once it has received an init feature report. This crate
//! recovers authenticated readings from those reports and runs a bounded
//! acquisition session that waits for one CO2 and one temperature value.
//!
//! # Pipeline
//!
//! 1. [`descrambler::decode`] undoes the on-wire transform and verifies the
//!    frame checksum.
//! 2. [`frame::interpret`] turns a decoded frame into a [`Reading`].
//! 3. [`acquisition::run`] drives a [`Transport`] until both readings have
//!    arrived or the deadline passes, and always closes the transport.
//!
//! Real hardware access lives in [`hid`] behind the `hid` cargo feature; any
//! other [`Transport`] implementation (simulators, recordings) works the same.
//!
//! ```no_run
//! use co2mini::{acquisition, AcquisitionConfig, HidTransport, PRODUCT_ID, VENDOR_ID};
//!
//! let transport = HidTransport::open(VENDOR_ID, PRODUCT_ID)?;
//! let result = acquisition::run(transport, &AcquisitionConfig::default())?;
//! println!("co2={:?} temperature={:?}", result.co2, result.temperature);
//! # Ok::<(), co2mini::DriverError>(())
//! ```

pub mod acquisition;
pub mod descrambler;
pub mod errors;
pub mod frame;
pub mod hid;
pub mod logging;
pub mod report;
pub mod transport;

pub use acquisition::{AcquisitionConfig, AcquisitionResult, AcquisitionState, Outcome};
pub use descrambler::{decode, scramble, DecodedFrame, RawFrame, PRODUCT_ID, VENDOR_ID};
pub use errors::*;
pub use frame::{interpret, Reading};
pub use hid::HidTransport;
pub use report::ResultData;
pub use transport::Transport;
