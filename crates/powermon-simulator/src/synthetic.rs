//! In-process stand-in for the acquisition services.
//!
//! Answers each request after a short latency with a payload shaped like the
//! real services produce. Every so often a request fails with 503 or comes
//! back with its channels in the wrong order, so the error paths get
//! exercised as well.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

use log::debug;
use serde_json::{Value, json};

use powermon_core::acquisition::AcquisitionKind;
use powermon_core::config::DashboardConfig;
use powermon_core::time::{EpochNanos, NANOS_PER_SEC, nanos_to_secs};
use powermon_core::transport::{
    Request, Response, ResponseSender, Transport, TransportError,
};

/// Time between the request and its response
const LATENCY: Duration = Duration::from_millis(120);

/// Every n-th request fails with 503
const FAILURE_PERIOD: u64 = 37;

/// Every n-th time-domain response lists its channels in reverse
const REORDER_PERIOD: u64 = 53;

/// Sample rate of the synthetic time-domain signals
const SAMPLE_RATE_HZ: f64 = 100.0;

/// Upper bound on samples returned per time-domain response
const MAX_SAMPLES_PER_RESPONSE: u64 = 200;

const MAINS_HZ: f64 = 50.0;

const DEVICES: [&str; 4] = ["fridge", "kettle", "washing_machine", "tv"];

struct Endpoint {
    kind: AcquisitionKind,
    channels: Vec<String>,
}

struct Pending {
    request: Request,
    ready_at: Instant,
}

pub struct SyntheticService<'a> {
    endpoints: Vec<Endpoint>,
    pending: VecDeque<Pending>,
    responses: ResponseSender<'a>,
    served: u64,
}

impl<'a> SyntheticService<'a> {
    /// Endpoints are indexed in config order, matching the driver's ids
    pub fn new(config: &DashboardConfig, responses: ResponseSender<'a>) -> Self {
        let endpoints = config
            .subscriptions
            .iter()
            .map(|sub| Endpoint {
                kind: sub.kind,
                channels: sub.channels.clone(),
            })
            .collect();

        Self {
            endpoints,
            pending: VecDeque::new(),
            responses,
            served: 0,
        }
    }

    /// Answer every request whose latency has elapsed
    pub fn pump(&mut self, now: EpochNanos) {
        let instant = Instant::now();
        while self
            .pending
            .front()
            .is_some_and(|pending| pending.ready_at <= instant)
        {
            let Some(pending) = self.pending.pop_front() else {
                break;
            };
            let response = self.respond(&pending.request, now);
            if self.responses.try_send(response).is_err() {
                debug!("Response queue full, dropping reply to {}", pending.request.url);
            }
        }
    }

    fn respond(&mut self, request: &Request, now: EpochNanos) -> Response {
        self.served += 1;
        let subscription = request.subscription;

        if self.served % FAILURE_PERIOD == 0 {
            return Response::Failed {
                subscription,
                status: 503,
            };
        }

        let Some(endpoint) = self.endpoints.get(subscription.index()) else {
            return Response::Failed {
                subscription,
                status: 404,
            };
        };

        let body = match endpoint.kind {
            AcquisitionKind::TimeDomain => {
                let reorder = self.served % REORDER_PERIOD == 0;
                time_domain(&endpoint.channels, cursor(&request.url), now, reorder)
            }
            AcquisitionKind::Spectral => {
                spectrum(&endpoint.channels, now, request.url.contains("limiting_curve"))
            }
            AcquisitionKind::PowerUsage => power_usage(now),
            AcquisitionKind::RealPower => real_power(&endpoint.channels, now),
        };

        Response::Delivered {
            subscription,
            body: body.to_string().into_bytes(),
        }
    }
}

impl Transport for SyntheticService<'_> {
    fn submit(&mut self, request: Request) -> Result<(), TransportError> {
        self.pending.push_back(Pending {
            request,
            ready_at: Instant::now() + LATENCY,
        });
        Ok(())
    }
}

/// `lastRefTrigger` query value, 0 when absent
fn cursor(url: &str) -> EpochNanos {
    url.split_once("lastRefTrigger=")
        .and_then(|(_, rest)| rest.split('&').next())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

/// Waveform of a named signal at time `t` seconds
fn signal(name: &str, t: f64) -> f64 {
    let base = name.split('@').next().unwrap_or(name);
    let mains = 2.0 * PI * MAINS_HZ * t;
    let load = 1.0 + 0.3 * (t / 60.0).sin();

    match base {
        "P" => 1500.0 * load,
        "Q" => 300.0 * load + 20.0 * (t / 7.0).sin(),
        "S" => 1530.0 * load,
        "phi" => 0.2 + 0.05 * (t / 11.0).sin(),
        "U" | "U_bpf" => 325.0 * mains.sin(),
        "I" | "I_bpf" => 9.0 * load * (mains - 0.2).sin(),
        _ => (2.0 * PI * t).sin(),
    }
}

fn time_domain(channels: &[String], cursor: EpochNanos, now: EpochNanos, reorder: bool) -> Value {
    let step = (NANOS_PER_SEC as f64 / SAMPLE_RATE_HZ) as u64;
    let samples = if cursor == 0 {
        MAX_SAMPLES_PER_RESPONSE
    } else {
        (now.saturating_sub(cursor) / step).min(MAX_SAMPLES_PER_RESPONSE)
    };

    if samples == 0 {
        return json!({ "refTriggerStamp": 0 });
    }

    // Relative times count up to 0 at the reference trigger
    let ref_trigger = now;
    let offsets: Vec<f64> = (0..samples)
        .map(|j| (j as f64 - (samples - 1) as f64) / SAMPLE_RATE_HZ)
        .collect();
    let ref_s = nanos_to_secs(ref_trigger);

    let values: Vec<f64> = channels
        .iter()
        .flat_map(|name| offsets.iter().map(move |&offset| signal(name, ref_s + offset)))
        .collect();

    let mut names = channels.to_vec();
    if reorder {
        names.reverse();
    }

    json!({
        "refTriggerStamp": ref_trigger,
        "channelNames": names,
        "channelTimeSinceRefTrigger": offsets,
        "channelValues": {
            "dims": [channels.len(), samples],
            "values": values,
        },
    })
}

fn spectrum(channels: &[String], now: EpochNanos, reference_curve: bool) -> Value {
    let name = channels.first().cloned().unwrap_or_default();
    let frequencies: Vec<f64> = (0..512).map(|k| k as f64 * 10.0).collect();
    let magnitudes: Vec<f64> = frequencies
        .iter()
        .map(|&f| {
            let harmonic = (f / MAINS_HZ).round();
            let distance = (f - harmonic * MAINS_HZ).abs();
            -80.0 + 60.0 / (1.0 + harmonic) * (-distance / 5.0).exp()
        })
        .collect();

    // Reference curves carry no trigger
    let stamp = if reference_curve {
        Value::Null
    } else {
        json!(now)
    };

    json!({
        "refTriggerStamp": stamp,
        "channelName": name,
        "channelMagnitudeValues": magnitudes,
        "channelFrequencyValues": frequencies,
    })
}

fn power_usage(now: EpochNanos) -> Value {
    let t = nanos_to_secs(now);
    let values: Vec<f64> = DEVICES
        .iter()
        .enumerate()
        .map(|(i, _)| (100.0 * (i as f64 + 1.0) * (1.0 + (t / (30.0 + i as f64)).sin())).max(0.0))
        .collect();
    let day: Vec<f64> = (0..DEVICES.len()).map(|i| 0.4 * (i as f64 + 1.0)).collect();
    let week: Vec<f64> = day.iter().map(|kwh| kwh * 7.0).collect();
    let month: Vec<f64> = day.iter().map(|kwh| kwh * 30.0).collect();

    json!({
        "names": DEVICES,
        "values": values,
        "timestamp": now / NANOS_PER_SEC,
        "day_usage": day,
        "week_usage": week,
        "month_usage": month,
    })
}

fn real_power(channels: &[String], now: EpochNanos) -> Value {
    let t = nanos_to_secs(now);
    json!({
        "refTriggerStamp": now,
        "channelNames": channels,
        "channelValues": {
            "dims": [1, 1],
            "values": [signal("P", t)],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_from_url() {
        assert_eq!(cursor("http://h/A?channelNameFilter=P&lastRefTrigger=42"), 42);
        assert_eq!(cursor("http://h/A?lastRefTrigger=7&x=1"), 7);
        assert_eq!(cursor("http://h/values/"), 0);
    }

    #[test]
    fn test_time_domain_shape() {
        let channels = vec!["P@100Hz".to_string(), "Q@100Hz".to_string()];
        let now = 1_000 * NANOS_PER_SEC;
        let body = time_domain(&channels, now - NANOS_PER_SEC / 2, now, false);

        assert_eq!(body["channelValues"]["dims"], json!([2, 50]));
        assert_eq!(body["channelValues"]["values"].as_array().unwrap().len(), 100);
        assert_eq!(body["channelTimeSinceRefTrigger"][49], json!(0.0));
    }

    #[test]
    fn test_time_domain_nothing_new() {
        let channels = vec!["P@100Hz".to_string()];
        let body = time_domain(&channels, 500, 500, false);
        assert_eq!(body["refTriggerStamp"], json!(0));
    }
}
