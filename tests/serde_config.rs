//! Loading wait timings from configuration

#![cfg(feature = "serde")]

use statewait::{Backoff, PollPolicy, WaitTimings, DEFAULT_REFRESH_GRACE_PERIOD};
use std::time::Duration;

#[test]
fn test_partial_config_fills_defaults() {
    let json = r#"{ "timeout": { "secs": 900, "nanos": 0 } }"#;

    let timings: WaitTimings = serde_json::from_str(json).unwrap();

    assert_eq!(timings.timeout, Duration::from_secs(900));
    assert_eq!(timings.initial_delay, Duration::ZERO);
    assert_eq!(timings.poll, PollPolicy::default());
    assert_eq!(timings.refresh_grace_period, DEFAULT_REFRESH_GRACE_PERIOD);
}

#[test]
fn test_fixed_policy_from_config() {
    let json = r#"{
        "timeout": { "secs": 300, "nanos": 0 },
        "poll": {
            "backoff": { "Fixed": { "secs": 15, "nanos": 0 } },
            "max_interval": { "secs": 15, "nanos": 0 }
        }
    }"#;

    let timings: WaitTimings = serde_json::from_str(json).unwrap();

    assert_eq!(timings.poll.backoff(), &Backoff::Fixed(Duration::from_secs(15)));
    assert_eq!(timings.poll.delay_for_poll(7), Duration::from_secs(15));
}

#[test]
fn test_timings_survive_serialization() {
    let timings = WaitTimings::new(Duration::from_secs(60))
        .with_initial_delay(Duration::from_secs(5))
        .with_poll_policy(PollPolicy::exponential(Duration::from_secs(2)).with_jitter(0.2));

    let json = serde_json::to_string(&timings).unwrap();
    let back: WaitTimings = serde_json::from_str(&json).unwrap();

    assert_eq!(back, timings);
}
