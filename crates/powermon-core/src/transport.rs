//! Request/response plumbing between subscriptions and an HTTP client
//!
//! Issuing a request never blocks. The transport performs the GET however it
//! likes and later pushes a [`Response`] onto a [`ResponseChannel`], which the
//! polling driver drains on its next tick.

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

use core::fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use thiserror_no_std::Error;

/// Upper bound on concurrently registered subscriptions
pub const MAX_SUBSCRIPTIONS: usize = 8;

/// One pending response per subscription always fits
pub const RESPONSE_CHANNEL_CAPACITY: usize = MAX_SUBSCRIPTIONS;

/// Bounded queue of responses waiting to be routed
pub type ResponseChannel =
    Channel<CriticalSectionRawMutex, Response, RESPONSE_CHANNEL_CAPACITY>;

pub type ResponseSender<'a> =
    Sender<'a, CriticalSectionRawMutex, Response, RESPONSE_CHANNEL_CAPACITY>;

pub type ResponseReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, Response, RESPONSE_CHANNEL_CAPACITY>;

/// Handle that routes a response back to the subscription that asked for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u8);

impl SubscriptionId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An HTTP GET to perform on behalf of a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub subscription: SubscriptionId,
    pub url: String,
}

/// Completion of a [`Request`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Status 200 with the raw body
    Delivered {
        subscription: SubscriptionId,
        body: Vec<u8>,
    },
    /// Any other outcome. `status` is the HTTP status, or 0 when the
    /// connection itself failed.
    Failed {
        subscription: SubscriptionId,
        status: u16,
    },
}

impl Response {
    pub fn subscription(&self) -> SubscriptionId {
        match self {
            Self::Delivered { subscription, .. } | Self::Failed { subscription, .. } => {
                *subscription
            }
        }
    }
}

/// Error types for request submission
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The client cannot accept another request right now
    #[error("Transport busy")]
    Busy,

    /// The request target could not be parsed
    #[error("Invalid request URL")]
    InvalidUrl,

    /// The client is not connected
    #[error("Transport unavailable")]
    Unavailable,
}

/// Non-blocking HTTP client
pub trait Transport {
    /// Start `request`. The outcome arrives later as a [`Response`].
    ///
    /// An `Err` means the request was never started and no response will
    /// follow.
    fn submit(&mut self, request: Request) -> Result<(), TransportError>;
}
