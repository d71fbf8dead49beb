//! End-to-end waits against a simulated control plane.
//!
//! Stacks follow a timeline of statuses keyed by time since creation, so
//! every scenario is deterministic under a paused tokio clock.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use statewait::prelude::*;
use statewait::{assert_settled, assert_wait_error};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum StackStatus {
    CreateInProgress,
    CreateComplete,
    RollbackInProgress,
    DeleteInProgress,
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StackStatus::CreateInProgress => "CREATE_IN_PROGRESS",
            StackStatus::CreateComplete => "CREATE_COMPLETE",
            StackStatus::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            StackStatus::DeleteInProgress => "DELETE_IN_PROGRESS",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ApiError {
    Throttling,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Throttling => write!(f, "Rate exceeded"),
        }
    }
}

impl Error for ApiError {}

#[derive(Debug, Clone, PartialEq)]
struct StackDescription {
    name: String,
    status: StackStatus,
    status_reason: Option<String>,
}

/// One status change: from `after` on, the stack is `status` (or gone).
type Change = (Duration, Option<(StackStatus, Option<&'static str>)>);

#[derive(Debug)]
struct Stack {
    created: Instant,
    timeline: Vec<Change>,
    throttled: bool,
}

#[derive(Debug, Clone, Default)]
struct ControlPlane {
    stacks: Arc<Mutex<HashMap<String, Stack>>>,
}

impl ControlPlane {
    fn create(&self, name: &str, timeline: Vec<Change>) {
        self.stacks.lock().unwrap().insert(
            name.to_string(),
            Stack {
                created: Instant::now(),
                timeline,
                throttled: false,
            },
        );
    }

    fn throttle(&self, name: &str) {
        if let Some(stack) = self.stacks.lock().unwrap().get_mut(name) {
            stack.throttled = true;
        }
    }

    fn describe(&self, name: &str) -> Result<Observation<StackDescription, StackStatus>, ApiError> {
        let stacks = self.stacks.lock().unwrap();
        let Some(stack) = stacks.get(name) else {
            return Ok(Observation::NotFound);
        };
        if stack.throttled {
            return Err(ApiError::Throttling);
        }

        let age = stack.created.elapsed();
        let current = stack
            .timeline
            .iter()
            .take_while(|(after, _)| *after <= age)
            .last()
            .and_then(|(_, status)| *status);

        Ok(match current {
            Some((status, reason)) => Observation::found(
                StackDescription {
                    name: name.to_string(),
                    status,
                    status_reason: reason.map(str::to_string),
                },
                status,
            ),
            None => Observation::NotFound,
        })
    }

    fn describe_stack(&self, name: &str) -> DescribeStack {
        DescribeStack {
            plane: self.clone(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug)]
struct DescribeStack {
    plane: ControlPlane,
    name: String,
}

impl Refresh for DescribeStack {
    type Object = StackDescription;
    type State = StackStatus;
    type Error = ApiError;

    fn refresh(
        &mut self,
    ) -> impl Future<Output = Result<Observation<StackDescription, StackStatus>, ApiError>> + Send
    {
        let described = self.plane.describe(&self.name);
        async move { described }
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn create_spec() -> WaitSpec<StackStatus> {
    WaitSpec::new([StackStatus::CreateInProgress], [StackStatus::CreateComplete])
        .with_timeout(secs(120))
}

#[tokio::test(start_paused = true)]
async fn test_create_waits_out_eventual_consistency() {
    let plane = ControlPlane::default();
    plane.create(
        "web",
        vec![
            (secs(0), None),
            (secs(2), Some((StackStatus::CreateInProgress, None))),
            (secs(12), Some((StackStatus::CreateComplete, None))),
        ],
    );

    let spec = create_spec().with_not_found_tolerance(5);
    let result = Waiter::new(spec, plane.describe_stack("web"))
        .unwrap()
        .wait_standalone()
        .await;
    let outcome = assert_settled!(result, StackStatus::CreateComplete);

    // Polls at 0, 0.5, 1.5 (missing), 3.5, 7.5 (in progress), 15.5.
    assert_eq!(outcome.polls, 6);
    assert_eq!(outcome.elapsed, Duration::from_millis(15_500));
    assert_eq!(outcome.object.name, "web");
}

#[tokio::test(start_paused = true)]
async fn test_rollback_is_unexpected_and_enriched() {
    let plane = ControlPlane::default();
    plane.create(
        "db",
        vec![
            (secs(0), Some((StackStatus::CreateInProgress, None))),
            (
                secs(8),
                Some((
                    StackStatus::RollbackInProgress,
                    Some("Resource handler returned message: bucket already exists"),
                )),
            ),
        ],
    );

    let err = Waiter::new(create_spec(), plane.describe_stack("db"))
        .unwrap()
        .wait_standalone()
        .await
        .unwrap_err();
    let reason = err
        .last_object()
        .and_then(|stack| stack.status_reason.clone())
        .unwrap_or_default();
    let err = err.with_last_error(reason);

    assert!(err.is_unexpected_state());
    assert_eq!(err.polls(), 6);
    assert_eq!(
        err.to_string(),
        "operation unexpectedly entered state ROLLBACK_IN_PROGRESS (expected: CREATE_COMPLETE): \
         Resource handler returned message: bucket already exists"
    );
    assert_eq!(
        err.source().map(|e| e.to_string()),
        Some("Resource handler returned message: bucket already exists".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_delete_waits_for_absence() {
    let plane = ControlPlane::default();
    plane.create(
        "old",
        vec![
            (secs(0), Some((StackStatus::DeleteInProgress, None))),
            (secs(5), None),
        ],
    );

    let spec = WaitSpec::new([StackStatus::DeleteInProgress], []).with_timeout(secs(60));
    let stats = Waiter::new(spec, plane.describe_stack("old"))
        .unwrap()
        .wait_for_absence(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.polls, 5);
    assert_eq!(stats.elapsed, Duration::from_millis(7_500));
}

#[tokio::test(start_paused = true)]
async fn test_never_created_is_not_found() {
    let plane = ControlPlane::default();

    let spec = create_spec().with_not_found_tolerance(2);
    let result = Waiter::new(spec, plane.describe_stack("ghost"))
        .unwrap()
        .wait_standalone()
        .await;
    let err = assert_wait_error!(result, WaitErrorKind::NotFound { checks: 3 });

    assert_eq!(err.to_string(), "resource not found after 3 consecutive checks");
    assert!(err.last_state().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_throttled_describe_surfaces_api_error() {
    let plane = ControlPlane::default();
    plane.create("api", vec![(secs(0), Some((StackStatus::CreateInProgress, None)))]);
    plane.throttle("api");

    let err = Waiter::new(create_spec(), plane.describe_stack("api"))
        .unwrap()
        .wait_standalone()
        .await
        .unwrap_err();

    assert_eq!(err.refresh_error(), Some(&ApiError::Throttling));
    assert_eq!(err.to_string(), "refreshing state failed: Rate exceeded");
    assert!(err
        .source()
        .and_then(|e| e.downcast_ref::<ApiError>())
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn test_fleet_waits_independently() {
    let plane = ControlPlane::default();
    for i in 0..10u64 {
        plane.create(
            &format!("svc-{}", i),
            vec![
                (secs(0), Some((StackStatus::CreateInProgress, None))),
                (secs(i), Some((StackStatus::CreateComplete, None))),
            ],
        );
    }

    let token = CancellationToken::new();
    let waits = (0..10u64).map(|i| {
        let spec = create_spec().with_poll_policy(PollPolicy::fixed(secs(1)));
        let waiter = Waiter::new(spec, plane.describe_stack(&format!("svc-{}", i))).unwrap();
        waiter.wait(&token)
    });

    let results = futures::future::join_all(waits).await;

    for (i, result) in results.into_iter().enumerate() {
        let outcome = result.unwrap();
        assert_eq!(outcome.object.name, format!("svc-{}", i));
        assert_eq!(outcome.polls, i as u32 + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_shared_token_cancels_remaining_waits() {
    let plane = ControlPlane::default();
    for i in 0..10u64 {
        plane.create(
            &format!("svc-{}", i),
            vec![
                (secs(0), Some((StackStatus::CreateInProgress, None))),
                (secs(i), Some((StackStatus::CreateComplete, None))),
            ],
        );
    }

    let token = CancellationToken::new();
    let waits = (0..10u64).map(|i| {
        let spec = create_spec().with_poll_policy(PollPolicy::fixed(secs(1)));
        let waiter = Waiter::new(spec, plane.describe_stack(&format!("svc-{}", i))).unwrap();
        waiter.wait(&token)
    });

    let canceller = async {
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        token.cancel();
    };
    let (results, ()) = tokio::join!(futures::future::join_all(waits), canceller);

    let settled = results.iter().filter(|r| r.is_ok()).count();
    let cancelled = results
        .iter()
        .filter(|r| r.as_ref().is_err_and(|e| e.is_cancelled()))
        .count();
    assert_eq!(settled, 6);
    assert_eq!(cancelled, 4);
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_outputs_visible() {
    let plane = ControlPlane::default();
    plane.create(
        "cdn",
        vec![
            (secs(0), Some((StackStatus::CreateInProgress, None))),
            (secs(3), Some((StackStatus::CreateComplete, None))),
        ],
    );

    let timings = WaitTimings::new(secs(30)).with_poll_policy(PollPolicy::fixed(secs(1)));
    let stats = wait_until(timings, &CancellationToken::new(), || {
        let described = plane.describe("cdn");
        async move {
            let observation = described?;
            Ok::<_, ApiError>(observation.state() == Some(&StackStatus::CreateComplete))
        }
    })
    .await
    .unwrap();

    assert_eq!(stats.polls, 4);
    assert_eq!(stats.elapsed, secs(3));
}
