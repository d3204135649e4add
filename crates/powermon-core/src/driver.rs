//! Cooperative polling driver
//!
//! Called once per UI frame. Each tick first routes every response the
//! transport has queued since the last tick, then advances the fetch cycle
//! of every subscription that is due. Nothing here blocks.

use embassy_time::Duration;
use heapless::Vec;
use log::{debug, info, warn};
use thiserror_no_std::Error;

use crate::buffer::BufferError;
use crate::config::{DashboardConfig, SubscriptionConfig};
use crate::subscription::{FetchStep, Subscription};
use crate::time::EpochNanos;
use crate::transport::{MAX_SUBSCRIPTIONS, ResponseReceiver, SubscriptionId, Transport};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    #[error("Subscription limit of {max} reached")]
    TooManySubscriptions { max: usize },
    #[error("Cannot allocate buffers: {0}")]
    Buffer(BufferError),
}

impl From<BufferError> for DriverError {
    fn from(err: BufferError) -> Self {
        Self::Buffer(err)
    }
}

/// What happened during one [`PollingDriver::tick`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Responses routed to a subscription
    pub routed: usize,
    /// Requests handed to the transport
    pub issued: usize,
    /// Payloads decoded, including "no new data"
    pub decoded: usize,
    /// Rejected payloads and refused requests
    pub failed: usize,
}

pub struct PollingDriver<'a, T: Transport> {
    transport: T,
    responses: ResponseReceiver<'a>,
    subscriptions: Vec<Subscription, MAX_SUBSCRIPTIONS>,
    poll_interval: Duration,
}

impl<'a, T: Transport> PollingDriver<'a, T> {
    pub fn new(transport: T, responses: ResponseReceiver<'a>, poll_interval: Duration) -> Self {
        Self {
            transport,
            responses,
            subscriptions: Vec::new(),
            poll_interval,
        }
    }

    /// Create a driver with every subscription in `config` registered
    pub fn from_config(
        transport: T,
        responses: ResponseReceiver<'a>,
        config: &DashboardConfig,
    ) -> Result<Self, DriverError> {
        let mut driver = Self::new(transport, responses, config.poll_interval());
        for subscription in &config.subscriptions {
            driver.register(subscription)?;
        }
        Ok(driver)
    }

    pub fn register(&mut self, config: &SubscriptionConfig) -> Result<SubscriptionId, DriverError> {
        let index = self.subscriptions.len();
        if index >= MAX_SUBSCRIPTIONS {
            return Err(DriverError::TooManySubscriptions {
                max: MAX_SUBSCRIPTIONS,
            });
        }

        let id = SubscriptionId(index as u8);
        let subscription = Subscription::from_config(id, config)?;
        info!(
            "Registered {} subscription {} for {}",
            config.kind.label(),
            id,
            subscription.base_url()
        );

        self.subscriptions
            .push(subscription)
            .map_err(|_| DriverError::TooManySubscriptions {
                max: MAX_SUBSCRIPTIONS,
            })?;
        Ok(id)
    }

    /// Route pending responses, then fetch every due subscription
    pub fn tick(&mut self, now: EpochNanos) -> TickReport {
        let mut report = TickReport::default();

        while let Ok(response) = self.responses.try_receive() {
            let id = response.subscription();
            match self.subscriptions.get_mut(id.index()) {
                Some(subscription) => {
                    if subscription.on_response(response) {
                        report.routed += 1;
                    }
                }
                None => warn!("Dropping response for unknown subscription {}", id),
            }
        }

        for subscription in self.subscriptions.iter_mut() {
            if !subscription.is_due(now, self.poll_interval) {
                continue;
            }

            match subscription.fetch(&mut self.transport, now) {
                FetchStep::Issued => report.issued += 1,
                FetchStep::Waiting => {}
                FetchStep::Decoded(_) => report.decoded += 1,
                FetchStep::DecodeFailed(_) | FetchStep::SubmitFailed(_) => report.failed += 1,
            }
        }

        if report != TickReport::default() {
            debug!("Tick: {:?}", report);
        }
        report
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn subscription(&self, id: SubscriptionId) -> Option<&Subscription> {
        self.subscriptions.get(id.index())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use alloc::string::String;
    use alloc::vec::Vec as AllocVec;

    use super::*;
    use crate::acquisition::{AcquisitionKind, Decoder};
    use crate::transport::{Request, Response, ResponseChannel, TransportError};

    const SECOND: EpochNanos = 1_000_000_000;
    const T0: EpochNanos = 100 * SECOND;

    #[derive(Default)]
    struct MockTransport {
        requests: AllocVec<Request>,
    }

    impl Transport for MockTransport {
        fn submit(&mut self, request: Request) -> Result<(), TransportError> {
            self.requests.push(request);
            Ok(())
        }
    }

    impl MockTransport {
        fn urls_for(&self, id: SubscriptionId) -> AllocVec<&String> {
            self.requests
                .iter()
                .filter(|r| r.subscription == id)
                .map(|r| &r.url)
                .collect()
        }
    }

    fn time_domain() -> SubscriptionConfig {
        SubscriptionConfig::new(
            "http://host/Acquisition?channelNameFilter=",
            ["A", "B"],
            AcquisitionKind::TimeDomain,
        )
    }

    fn power_usage() -> SubscriptionConfig {
        SubscriptionConfig::new("http://host/", ["nilm_predict_values"], AcquisitionKind::PowerUsage)
    }

    fn deliver(channel: &ResponseChannel, id: SubscriptionId, body: &str) {
        channel
            .try_send(Response::Delivered {
                subscription: id,
                body: body.as_bytes().to_vec(),
            })
            .unwrap();
    }

    #[test]
    fn test_end_to_end_time_domain() {
        let channel = ResponseChannel::new();
        let mut driver =
            PollingDriver::new(MockTransport::default(), channel.receiver(), Duration::from_secs(1));
        let id = driver.register(&time_domain()).unwrap();

        assert_eq!(driver.tick(T0).issued, 1);

        deliver(
            &channel,
            id,
            r#"{"refTriggerStamp": 1000000000, "channelNames": ["A","B"],
                "channelTimeSinceRefTrigger": [0.0, 0.5],
                "channelValues": {"dims": [2, 2], "values": [1.0, 2.0, 10.0, 20.0]}}"#,
        );

        let report = driver.tick(T0 + 1);
        assert_eq!(report.routed, 1);
        assert_eq!(report.decoded, 1);

        let acq = driver.subscription(id).unwrap().acquisition();
        let td = acq.as_time_domain().unwrap();
        assert_eq!(td.buffer("A").unwrap().len(), 2);
        assert_eq!(td.buffer("B").unwrap().latest().unwrap().value, 20.0);

        assert_eq!(driver.tick(T0 + 2).issued, 1);
        let urls = driver.transport_mut().urls_for(id);
        assert_eq!(urls.len(), 2);
        assert!(urls[1].ends_with("A,B&lastRefTrigger=1500000000"));
    }

    #[test]
    fn test_failure_is_retried_next_tick() {
        let channel = ResponseChannel::new();
        let mut driver =
            PollingDriver::new(MockTransport::default(), channel.receiver(), Duration::from_secs(1));
        let id = driver.register(&time_domain()).unwrap();

        driver.tick(T0);
        channel
            .try_send(Response::Failed {
                subscription: id,
                status: 500,
            })
            .unwrap();

        let report = driver.tick(T0 + 1);
        assert_eq!(report.routed, 1);
        assert_eq!(report.issued, 1);
        assert!(!driver.subscription(id).unwrap().is_healthy());
        assert_eq!(driver.transport_mut().requests.len(), 2);
    }

    #[test]
    fn test_one_request_in_flight_per_subscription() {
        let channel = ResponseChannel::new();
        let mut driver =
            PollingDriver::new(MockTransport::default(), channel.receiver(), Duration::from_secs(1));
        driver.register(&time_domain()).unwrap();

        for frame in 0..10 {
            driver.tick(T0 + frame);
        }
        assert_eq!(driver.transport_mut().requests.len(), 1);
    }

    #[test]
    fn test_aggregate_kinds_gated_by_interval() {
        let channel = ResponseChannel::new();
        let mut driver =
            PollingDriver::new(MockTransport::default(), channel.receiver(), Duration::from_secs(1));
        let usage = driver.register(&power_usage()).unwrap();
        let stream = driver.register(&time_domain()).unwrap();

        driver.tick(T0);
        deliver(&channel, usage, r#"{"day_usage": [1.5, 2.5]}"#);
        deliver(&channel, stream, r#"{"refTriggerStamp": 0}"#);
        let report = driver.tick(T0 + SECOND / 10);
        assert_eq!(report.decoded, 2);

        let snapshot = driver
            .subscription(usage)
            .unwrap()
            .acquisition()
            .as_power_usage()
            .unwrap()
            .snapshot()
            .clone();
        assert_eq!(snapshot.kwh_used_day, 4.0);

        // Decoded at T0 + 0.1 s: not due again until T0 + 1.1 s
        driver.tick(T0 + SECOND / 2);
        driver.tick(T0 + SECOND);
        assert_eq!(driver.transport_mut().urls_for(usage).len(), 1);
        assert_eq!(driver.transport_mut().urls_for(stream).len(), 2);

        driver.tick(T0 + SECOND + SECOND / 10);
        assert_eq!(driver.transport_mut().urls_for(usage).len(), 2);
    }

    #[test]
    fn test_uninitialized_aggregate_retries_every_tick() {
        let channel = ResponseChannel::new();
        let mut driver =
            PollingDriver::new(MockTransport::default(), channel.receiver(), Duration::from_secs(60));
        let usage = driver.register(&power_usage()).unwrap();

        driver.tick(T0);
        deliver(&channel, usage, "garbage");
        assert_eq!(driver.tick(T0 + 1).failed, 1);
        assert_eq!(driver.tick(T0 + 2).issued, 1);

        let sub = driver.subscription(usage).unwrap();
        assert!(!sub.acquisition().state().initialized());
    }

    #[test]
    fn test_failing_subscription_does_not_block_others() {
        let channel = ResponseChannel::new();
        let mut driver =
            PollingDriver::new(MockTransport::default(), channel.receiver(), Duration::from_secs(1));
        let bad = driver.register(&time_domain()).unwrap();
        let good = driver.register(&time_domain()).unwrap();

        driver.tick(T0);
        deliver(&channel, bad, r#"{"refTriggerStamp": 5, "channelNames": ["B","A"]}"#);
        deliver(
            &channel,
            good,
            r#"{"refTriggerStamp": 1000000000, "channelNames": ["A","B"],
                "channelTimeSinceRefTrigger": [0.0],
                "channelValues": {"dims": [2, 1], "values": [1.0, 2.0]}}"#,
        );

        let report = driver.tick(T0 + 1);
        assert_eq!(report.decoded, 1);
        assert_eq!(report.failed, 1);
        assert!(driver.subscription(good).unwrap().acquisition().state().success());
        assert!(!driver.subscription(bad).unwrap().acquisition().state().success());
    }

    #[test]
    fn test_unknown_subscription_dropped() {
        let channel = ResponseChannel::new();
        let mut driver =
            PollingDriver::new(MockTransport::default(), channel.receiver(), Duration::from_secs(1));
        deliver(&channel, SubscriptionId(7), "{}");

        assert_eq!(driver.tick(T0), TickReport::default());
    }

    #[test]
    fn test_from_config_and_limit() {
        let channel = ResponseChannel::new();
        let config = DashboardConfig::default();
        let mut driver =
            PollingDriver::from_config(MockTransport::default(), channel.receiver(), &config).unwrap();
        assert_eq!(driver.subscriptions().len(), 2);
        assert_eq!(driver.poll_interval(), Duration::from_millis(1000));

        for _ in 2..MAX_SUBSCRIPTIONS {
            driver.register(&power_usage()).unwrap();
        }
        assert_eq!(
            driver.register(&power_usage()),
            Err(DriverError::TooManySubscriptions {
                max: MAX_SUBSCRIPTIONS
            })
        );
    }

    #[test]
    fn test_no_new_data_is_decoded_not_failed() {
        let channel = ResponseChannel::new();
        let mut driver =
            PollingDriver::new(MockTransport::default(), channel.receiver(), Duration::from_secs(1));
        let id = driver.register(&time_domain()).unwrap();

        driver.tick(T0);
        deliver(&channel, id, r#"{"refTriggerStamp": 0}"#);
        driver.tick(T0 + 1);

        let sub = driver.subscription(id).unwrap();
        assert!(sub.is_healthy());
        assert_eq!(sub.cursor(), 0);
        assert_eq!(*sub.acquisition().state(), Default::default());
    }
}
