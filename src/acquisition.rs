//! Bounded acquisition of one CO2 and one temperature reading.
//!
//! # Session lifecycle
//!
//! ```text
//! NotStarted -> Initializing -> Collecting -> Completed | TimedOut | TransportFailed -> Closed
//! ```
//!
//! Reports are delivered asynchronously: once the init feature report is
//! written, the transport moves onto a delivery thread that keeps arming reads
//! and forwards each raw frame over a channel. The calling thread is the only
//! writer of [`AcquisitionState`]; it blocks on that channel with the time left
//! until the deadline. When the session concludes, a shared flag stops the
//! delivery thread from arming another read, and the transport is closed as the
//! thread exits. Closing runs from `Drop` impls, so it also happens on unwind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::descrambler::{self, RawFrame, INIT_REPORT};
use crate::errors::{DriverError, FrameError, Result};
use crate::frame::{self, Reading};
use crate::transport::{Transport, TransportGuard};

// ============================================================================
// Configuration
// ============================================================================

/// Overall time allowed for both readings to arrive.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for a single armed read.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Reads never wait less than this, so a zero interval cannot spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

const DELIVERY_THREAD_NAME: &str = "co2mini-reports";

/// Stand-in deadline for timeouts that overflow `Instant` (about 100 years).
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Timing knobs for one acquisition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Deadline measured from the moment the init report has been written.
    pub timeout: Duration,
    /// Each read waits at most this long before the delivery thread re-checks
    /// the session state. Never extends past the deadline.
    pub poll_interval: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl AcquisitionConfig {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

// ============================================================================
// Session Types
// ============================================================================

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    Initializing,
    Collecting,
    Completed,
    TimedOut,
    TransportFailed,
    Closed,
}

impl SessionPhase {
    /// Whether `next` is a legal successor of `self`.
    pub fn allows(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (NotStarted, Initializing)
                | (Initializing, Collecting)
                | (Initializing, TransportFailed)
                | (Collecting, Completed)
                | (Collecting, TimedOut)
                | (Collecting, TransportFailed)
                | (Completed, Closed)
                | (TimedOut, Closed)
                | (TransportFailed, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionPhase::Completed | SessionPhase::TimedOut | SessionPhase::TransportFailed
        )
    }
}

/// How a successful session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Both readings arrived before the deadline.
    Completed,
    /// The deadline passed first; whatever arrived is still reported.
    TimedOut,
}

/// Final readings of a session that did not hit a transport failure.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionResult {
    pub co2: Option<u16>,
    pub temperature: Option<f64>,
    pub outcome: Outcome,
    /// Frames dropped because their checksum did not verify.
    pub checksum_errors: usize,
    /// Frames dropped because their op-code is not a reading we track.
    pub unsupported: usize,
    /// Time from the end of initialization to conclusion.
    pub elapsed: Duration,
}

impl AcquisitionResult {
    /// Names of readings that never arrived, in output order.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.co2.is_none() {
            missing.push("co2");
        }
        if self.temperature.is_none() {
            missing.push("temperature");
        }
        missing
    }
}

/// Readings accumulated during one session. First value of each kind wins.
#[derive(Debug, Clone)]
pub struct AcquisitionState {
    co2: Option<u16>,
    temperature: Option<f64>,
    deadline: Instant,
    checksum_errors: usize,
    unsupported: usize,
}

impl AcquisitionState {
    pub fn new(deadline: Instant) -> Self {
        Self {
            co2: None,
            temperature: None,
            deadline,
            checksum_errors: 0,
            unsupported: 0,
        }
    }

    pub fn co2(&self) -> Option<u16> {
        self.co2
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Store `reading` unless a value of the same kind is already present.
    ///
    /// Returns whether the reading was taken.
    pub fn merge(&mut self, reading: Reading) -> bool {
        match reading {
            Reading::Co2(ppm) if self.co2.is_none() => {
                self.co2 = Some(ppm);
                true
            }
            Reading::Temperature(celsius) if self.temperature.is_none() => {
                self.temperature = Some(celsius);
                true
            }
            _ => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.co2.is_some() && self.temperature.is_some()
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    fn note_discard(&mut self, err: FrameError) {
        match err {
            FrameError::Checksum | FrameError::Length(_) => self.checksum_errors += 1,
            FrameError::UnsupportedOpcode(_) => self.unsupported += 1,
        }
    }

    fn into_result(self, outcome: Outcome, elapsed: Duration) -> AcquisitionResult {
        AcquisitionResult {
            co2: self.co2,
            temperature: self.temperature,
            outcome,
            checksum_errors: self.checksum_errors,
            unsupported: self.unsupported,
            elapsed,
        }
    }
}

// ============================================================================
// Report Delivery
// ============================================================================

/// Message from the delivery thread to the controller.
#[derive(Debug)]
enum Delivery {
    Report(RawFrame),
    Failed(DriverError),
}

/// Handle on the delivery thread. Dropping it concludes the session and waits
/// for the thread, which closes the transport on its way out.
struct ReportPump {
    concluded: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReportPump {
    fn spawn<T: Transport>(
        transport: TransportGuard<T>,
        deadline: Instant,
        poll_interval: Duration,
    ) -> Result<(Self, Receiver<Delivery>)> {
        let (tx, rx) = mpsc::channel();
        let concluded = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&concluded);
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);

        let handle = thread::Builder::new()
            .name(DELIVERY_THREAD_NAME.into())
            .spawn(move || deliver_reports(transport, deadline, poll_interval, &flag, &tx))?;

        Ok((
            Self {
                concluded,
                handle: Some(handle),
            },
            rx,
        ))
    }

    fn conclude(&mut self) {
        self.concluded.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("report delivery thread panicked");
            }
        }
    }
}

impl Drop for ReportPump {
    fn drop(&mut self) {
        self.conclude();
    }
}

/// Body of the delivery thread: arm bounded reads until the session concludes,
/// the deadline passes, the controller hangs up or the transport fails.
fn deliver_reports<T: Transport>(
    mut transport: TransportGuard<T>,
    deadline: Instant,
    poll_interval: Duration,
    concluded: &AtomicBool,
    tx: &Sender<Delivery>,
) {
    while !concluded.load(Ordering::Acquire) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match transport.read_report(poll_interval.min(remaining)) {
            Ok(Some(raw)) => {
                if concluded.load(Ordering::Acquire) || tx.send(Delivery::Report(raw)).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                let _ = tx.send(Delivery::Failed(e));
                break;
            }
        }
    }
    trace!("report delivery stopped");
}

// ============================================================================
// Controller
// ============================================================================

fn advance(phase: &mut SessionPhase, next: SessionPhase) {
    debug_assert!(phase.allows(next), "illegal transition {phase:?} -> {next:?}");
    debug!("session phase: {:?} -> {:?}", phase, next);
    *phase = next;
}

/// Transport already released; record the failure and the close.
fn fail_and_close(phase: &mut SessionPhase) {
    advance(phase, SessionPhase::TransportFailed);
    advance(phase, SessionPhase::Closed);
}

/// `start + timeout`, saturating to [`FAR_FUTURE`] for timeouts too large to
/// represent as an `Instant`.
fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

/// Run one acquisition session over `transport`.
///
/// Writes the init feature report, then collects reports until both a CO2 and
/// a temperature reading have been seen or `config.timeout` has elapsed.
/// Frames that fail the checksum or carry other op-codes are skipped. The
/// transport is closed exactly once before this returns, whatever the outcome.
///
/// # Errors
/// Returns the transport's error if the init write or a read fails, or
/// [`DriverError::Io`] if the delivery thread cannot be started.
pub fn run<T: Transport>(transport: T, config: &AcquisitionConfig) -> Result<AcquisitionResult> {
    let mut phase = SessionPhase::NotStarted;
    let mut transport = TransportGuard::new(transport);

    advance(&mut phase, SessionPhase::Initializing);
    if let Err(e) = transport.write_feature_report(&INIT_REPORT) {
        drop(transport);
        fail_and_close(&mut phase);
        return Err(e);
    }

    let started = Instant::now();
    let mut state = AcquisitionState::new(deadline_after(started, config.timeout));
    // On spawn failure the transport was dropped with the thread closure.
    let (mut pump, rx) =
        match ReportPump::spawn(transport, state.deadline(), config.poll_interval) {
            Ok(spawned) => spawned,
            Err(e) => {
                fail_and_close(&mut phase);
                return Err(e);
            }
        };
    advance(&mut phase, SessionPhase::Collecting);

    let collected = collect(&mut state, &rx);

    pump.conclude();
    let elapsed = started.elapsed();

    let result = match collected {
        Ok(outcome) => {
            advance(
                &mut phase,
                match outcome {
                    Outcome::Completed => SessionPhase::Completed,
                    Outcome::TimedOut => SessionPhase::TimedOut,
                },
            );
            Ok(state.into_result(outcome, elapsed))
        }
        Err(e) => {
            advance(&mut phase, SessionPhase::TransportFailed);
            Err(e)
        }
    };
    advance(&mut phase, SessionPhase::Closed);

    match &result {
        Ok(r) => {
            if r.checksum_errors > 0 || r.unsupported > 0 {
                debug!(
                    "discarded frames: checksum={}, unsupported={}",
                    r.checksum_errors, r.unsupported
                );
            }
            info!(
                "acquisition {:?} after {:?}: co2={:?}, temperature={:?}",
                r.outcome, elapsed, r.co2, r.temperature
            );
        }
        Err(e) => info!("acquisition failed after {:?}: {}", elapsed, e),
    }
    result
}

/// Consume deliveries until completion, deadline or failure.
fn collect(state: &mut AcquisitionState, rx: &Receiver<Delivery>) -> Result<Outcome> {
    loop {
        let remaining = state.remaining(Instant::now());
        if remaining.is_zero() {
            return Ok(Outcome::TimedOut);
        }

        match rx.recv_timeout(remaining) {
            Ok(Delivery::Report(raw)) => {
                if accept(state, &raw) && state.is_complete() {
                    return Ok(Outcome::Completed);
                }
            }
            Ok(Delivery::Failed(e)) => return Err(e),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // The delivery thread also stops at the deadline.
                if state.remaining(Instant::now()).is_zero() {
                    return Ok(Outcome::TimedOut);
                }
                return Err(DriverError::Transport("report delivery stopped".into()));
            }
        }
    }
}

/// Decode, interpret and merge one raw frame. Returns whether state changed.
fn accept(state: &mut AcquisitionState, raw: &RawFrame) -> bool {
    match descrambler::decode(raw).and_then(|f| frame::interpret(&f)) {
        Ok(reading) => {
            let taken = state.merge(reading);
            if taken {
                debug!("reading accepted: {:?}", reading);
            } else {
                trace!("duplicate {} reading ignored", reading.kind());
            }
            taken
        }
        Err(e) => {
            trace!("frame discarded: {}", e);
            state.note_discard(e);
            false
        }
    }
}
