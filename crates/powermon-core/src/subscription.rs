//! A single polled endpoint and its fetch cycle
//!
//! ```text
//! Idle ──fetch──▶ InFlight ──Delivered──▶ DecodePending ──fetch──▶ Idle
//!                    │
//!                    └────────Failed─────────────────────────────▶ Idle
//! ```
//!
//! At most one request is outstanding per subscription. A decoded payload
//! moves the subscription back to Idle; the next request goes out on the
//! following due tick.

extern crate alloc;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use core::mem;

use embassy_time::Duration;
use log::{debug, error, warn};

use crate::acquisition::{
    Acquisition, AcquisitionKind, DecodeError, DecodeOutcome, Decoder,
};
use crate::buffer::BufferResult;
use crate::channels::ChannelSet;
use crate::config::SubscriptionConfig;
use crate::time::{EpochNanos, elapsed_at_least};
use crate::transport::{Request, Response, SubscriptionId, Transport, TransportError};

/// URL marker for services that accept a `lastRefTrigger` cursor
const CURSOR_QUERY_MARKER: &str = "channelNameFilter";

#[derive(Debug, Clone, PartialEq)]
enum FetchState {
    Idle,
    InFlight,
    DecodePending(Vec<u8>),
}

/// What a call to [`Subscription::fetch`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStep {
    /// A request was handed to the transport
    Issued,
    /// A request is still outstanding
    Waiting,
    /// A delivered payload was decoded
    Decoded(DecodeOutcome),
    /// A delivered payload was rejected
    DecodeFailed(DecodeError),
    /// The transport refused the request
    SubmitFailed(TransportError),
}

/// Why the last fetch cycle failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Non-200 response (0 when the connection failed)
    Status(u16),
    Submit(TransportError),
    Decode(DecodeError),
}

/// Failure bookkeeping for connection error notices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Health {
    consecutive_failures: u32,
    last_failure: Option<FailureKind>,
}

impl Health {
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_failure(&self) -> Option<&FailureKind> {
        self.last_failure.as_ref()
    }

    fn record_failure(&mut self, kind: FailureKind) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(kind);
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure = None;
    }
}

pub struct Subscription {
    id: SubscriptionId,
    base_url: String,
    one_shot: bool,
    cursor: EpochNanos,
    acquisition: Acquisition,
    state: FetchState,
    health: Health,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        base_url: &str,
        channels: ChannelSet,
        kind: AcquisitionKind,
        one_shot: bool,
    ) -> BufferResult<Self> {
        let base_url = format!("{}{}", base_url, channels.joined());
        Ok(Self {
            id,
            base_url,
            one_shot,
            cursor: 0,
            acquisition: Acquisition::new(kind, channels)?,
            state: FetchState::Idle,
            health: Health::default(),
        })
    }

    pub fn from_config(id: SubscriptionId, config: &SubscriptionConfig) -> BufferResult<Self> {
        Self::new(
            id,
            &config.base_url,
            config.channel_set(),
            config.kind,
            config.is_one_shot(),
        )
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn kind(&self) -> AcquisitionKind {
        self.acquisition.kind()
    }

    /// Base URL with the channel list appended
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_one_shot(&self) -> bool {
        self.one_shot
    }

    /// Cursor sent as `lastRefTrigger` on the next request
    pub fn cursor(&self) -> EpochNanos {
        self.cursor
    }

    pub fn acquisition(&self) -> &Acquisition {
        &self.acquisition
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    /// False once the last fetch cycle failed
    pub fn is_healthy(&self) -> bool {
        self.health.consecutive_failures == 0
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == FetchState::InFlight
    }

    /// Target of the next request
    pub fn request_url(&self) -> String {
        if self.base_url.contains(CURSOR_QUERY_MARKER) {
            format!("{}&lastRefTrigger={}", self.base_url, self.cursor)
        } else {
            self.base_url.clone()
        }
    }

    /// Whether this subscription should be fetched at `now`.
    ///
    /// Streaming kinds are always due. Aggregate kinds are due once
    /// `interval` has passed since their last update, or until they have
    /// received anything at all.
    pub fn is_due(&self, now: EpochNanos, interval: Duration) -> bool {
        if self.kind().is_streaming() {
            return true;
        }

        let state = self.acquisition.state();
        !state.initialized() || elapsed_at_least(now, state.last_timestamp(), interval)
    }

    /// Advance the fetch cycle by one step
    pub fn fetch<T: Transport>(&mut self, transport: &mut T, now: EpochNanos) -> FetchStep {
        match mem::replace(&mut self.state, FetchState::Idle) {
            FetchState::Idle => self.issue(transport),
            FetchState::InFlight => {
                self.state = FetchState::InFlight;
                FetchStep::Waiting
            }
            FetchState::DecodePending(body) => self.decode(&body, now),
        }
    }

    /// Accept the transport's answer to the outstanding request.
    ///
    /// Returns false if no request was outstanding.
    pub fn on_response(&mut self, response: Response) -> bool {
        if self.state != FetchState::InFlight {
            warn!("{}: response without a request in flight, ignoring", self.id);
            return false;
        }

        match response {
            Response::Delivered { body, .. } => {
                debug!("{}: received {} bytes", self.id, body.len());
                self.state = FetchState::DecodePending(body);
            }
            Response::Failed { status, .. } => {
                error!(
                    "{}: fetch of {} failed with status {}",
                    self.id, self.base_url, status
                );
                self.record_failure(FailureKind::Status(status));
                self.state = FetchState::Idle;
            }
        }
        true
    }

    fn issue<T: Transport>(&mut self, transport: &mut T) -> FetchStep {
        let request = Request {
            subscription: self.id,
            url: self.request_url(),
        };
        debug!("{}: GET {}", self.id, request.url);

        match transport.submit(request) {
            Ok(()) => {
                self.state = FetchState::InFlight;
                FetchStep::Issued
            }
            Err(e) => {
                error!("{}: could not submit request: {}", self.id, e);
                self.record_failure(FailureKind::Submit(e));
                FetchStep::SubmitFailed(e)
            }
        }
    }

    fn decode(&mut self, body: &[u8], now: EpochNanos) -> FetchStep {
        match self.acquisition.deserialize(body, now) {
            Ok(outcome) => {
                self.health.record_success();
                if outcome == DecodeOutcome::Updated && !self.one_shot {
                    self.cursor = self.acquisition.state().last_timestamp();
                }
                FetchStep::Decoded(outcome)
            }
            Err(e) => {
                warn!("{}: dropping payload: {}", self.id, e);
                self.record_failure(FailureKind::Decode(e.clone()));
                FetchStep::DecodeFailed(e)
            }
        }
    }

    fn record_failure(&mut self, kind: FailureKind) {
        self.health.record_failure(kind);
        self.acquisition.mark_failed();
    }
}
