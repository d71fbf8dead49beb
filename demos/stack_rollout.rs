//! Rolls out a few simulated stacks and waits for each to settle
//!
//! Run with: cargo run --example stack_rollout --features tracing,jitter
//!
//! Press Ctrl-C to cancel the remaining waits.

use std::time::Duration;

use statewait::prelude::*;
use tokio::time::Instant;

/// A stack that finishes creating `ready_after` its launch.
#[derive(Debug, Clone)]
struct SimulatedStack {
    name: String,
    launched: Instant,
    visible_after: Duration,
    ready_after: Duration,
}

impl SimulatedStack {
    fn launch(name: &str, visible_after: Duration, ready_after: Duration) -> Self {
        Self {
            name: name.to_string(),
            launched: Instant::now(),
            visible_after,
            ready_after,
        }
    }

    async fn describe(&self) -> Result<Observation<String, &'static str>, std::io::Error> {
        // Round trip to the control plane.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let age = self.launched.elapsed();
        Ok(if age < self.visible_after {
            Observation::NotFound
        } else if age < self.ready_after {
            Observation::found(self.name.clone(), "CREATE_IN_PROGRESS")
        } else {
            Observation::found(self.name.clone(), "CREATE_COMPLETE")
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling waits");
                token.cancel();
            }
        });
    }

    let stacks = vec![
        SimulatedStack::launch("network", Duration::ZERO, Duration::from_secs(2)),
        SimulatedStack::launch("database", Duration::from_millis(600), Duration::from_secs(5)),
        SimulatedStack::launch("frontend", Duration::from_millis(300), Duration::from_secs(3)),
    ];

    let policy = PollPolicy::exponential(Duration::from_millis(200))
        .with_max_interval(Duration::from_secs(2))
        .with_jitter(0.2);

    let waits = stacks.iter().map(|stack| {
        let spec = WaitSpec::new(["CREATE_IN_PROGRESS"], ["CREATE_COMPLETE"])
            .with_timeout(Duration::from_secs(30))
            .with_poll_policy(policy.clone())
            .with_not_found_tolerance(5)
            .with_required_target_hits(2);
        let token = &token;
        async move {
            let waiter = Waiter::new(spec, || stack.describe()).map_err(|e| e.to_string())?;
            waiter
                .wait(token)
                .await
                .map_err(|e| format!("{}: {}", stack.name, e))
        }
    });

    tracing::info!("waiting for {} stacks", stacks.len());
    for result in futures::future::join_all(waits).await {
        match result {
            Ok(outcome) => tracing::info!(
                "{} reached {} after {} polls in {:?}",
                outcome.object,
                outcome.state,
                outcome.polls,
                outcome.elapsed
            ),
            Err(e) => tracing::error!("rollout failed: {}", e),
        }
    }
}
