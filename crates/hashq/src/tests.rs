use crate::{
    Error, HashService, LifecycleState, PollResult, ServiceConfig, StatsSnapshot, TimeSource,
    TokenTerminator, digest,
};
use core::time::Duration;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

const DELAY: Duration = Duration::from_secs(5);
const ANGRY_MONKEY: &str =
    "ZEHhWB65gUlzdVwtDQArEyx+KVLzp/aTaRaPlBzYRIFj6vjFdqEb0Q5B8zVKCZ0vKbZPZklJz0Fd7su2A+gf7Q==";

/// Time source moved by hand, independent of the Tokio timer.
#[derive(Clone, Default)]
struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    fn set(&self, now: Duration) {
        *self.now.lock().unwrap() = now;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }
}

/// Time source that moves forward on every read: the `n`th call to `now`
/// first advances the clock by `n * unit`.
struct SteppingClock {
    unit: Duration,
    state: Mutex<(u32, Duration)>,
}

impl SteppingClock {
    fn new(unit: Duration) -> Self {
        Self {
            unit,
            state: Mutex::new((0, Duration::ZERO)),
        }
    }
}

impl TimeSource for SteppingClock {
    fn now(&self) -> Duration {
        let mut state = self.state.lock().unwrap();
        state.0 += 1;
        let n = state.0;
        state.1 += self.unit * n;
        state.1
    }
}

fn service() -> (HashService, CancellationToken) {
    let terminator = TokenTerminator::default();
    let token = terminator.token();
    let service = HashService::new(ServiceConfig::default(), Arc::new(terminator));
    (service, token)
}

fn manual_service() -> (HashService<ManualClock>, ManualClock) {
    let clock = ManualClock::default();
    let service = HashService::with_clock(
        ServiceConfig::default(),
        clock.clone(),
        Arc::new(TokenTerminator::default()),
    );
    (service, clock)
}

#[tokio::test(start_paused = true)]
async fn submit_then_poll_returns_sentinel_then_digest() {
    let (service, _) = service();

    let id = service.submit("angryMonkey").unwrap();
    assert_eq!(id, 1);

    let poll = service.poll(id).unwrap();
    assert_eq!(poll, PollResult::NotReady(1));
    assert_eq!(poll.to_string(), "1");

    tokio::time::sleep(DELAY + Duration::from_millis(1)).await;

    let poll = service.poll(id).unwrap();
    assert_eq!(poll, PollResult::Ready(ANGRY_MONKEY.to_string()));
    assert_eq!(poll.to_string(), ANGRY_MONKEY);

    // never reverts
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(service.poll(id).unwrap(), PollResult::Ready(ANGRY_MONKEY.to_string()));
}

#[tokio::test(start_paused = true)]
async fn ids_are_issued_in_order() {
    let (service, _) = service();
    for expected in 1..=5 {
        assert_eq!(service.submit(format!("pw{expected}")).unwrap(), expected);
    }
    assert_eq!(service.total_accepted(), 5);
}

#[tokio::test(start_paused = true)]
async fn each_id_resolves_to_its_own_digest() {
    let (service, _) = service();
    let values = ["alpha", "beta", "", "gamma"];
    let ids: Vec<_> = values.iter().map(|v| service.submit(*v).unwrap()).collect();

    tokio::time::sleep(DELAY + Duration::from_millis(1)).await;

    for (id, value) in ids.into_iter().zip(values) {
        assert_eq!(service.poll(id).unwrap(), PollResult::Ready(digest(value)));
    }
}

#[tokio::test(start_paused = true)]
async fn stats_start_at_zero() {
    let (service, _) = service();
    assert_eq!(service.stats().unwrap(), StatsSnapshot::default());
}

#[tokio::test(start_paused = true)]
async fn stats_count_accepted_submissions() {
    let (service, _) = service();
    for i in 0..3 {
        service.submit(i.to_string()).unwrap();
    }
    let stats = service.stats().unwrap();
    assert_eq!(stats.total, 3);
    // Paused time: the accept path takes no observable time.
    assert_eq!(stats.average_nanos, 0);
}

#[tokio::test(start_paused = true)]
async fn stats_average_follows_recurrence_over_measured_latency() {
    const UNIT: Duration = Duration::from_micros(1);
    let service = HashService::with_clock(
        ServiceConfig::default(),
        SteppingClock::new(UNIT),
        Arc::new(TokenTerminator::default()),
    );

    // Each submission reads the clock twice (start, then after admission),
    // so submission `k` (1-based) measures a latency of `2k` units.
    let mut expected = 0_u64;
    for k in 1..=5_u64 {
        assert_eq!(service.submit(format!("pw{k}")).unwrap(), k);
        let latency = (UNIT * 2 * k as u32).as_nanos() as u64;
        expected = (expected + latency) / k;
    }

    // 2000, 3000, 3000, 2750, 2550
    assert_eq!(expected, 2_550);
    assert_eq!(
        service.stats().unwrap(),
        StatsSnapshot {
            total: 5,
            average_nanos: expected
        }
    );
}

#[tokio::test(start_paused = true)]
async fn completion_delay_counts_from_submission() {
    let (service, _) = service();
    let id = service.submit("angryMonkey").unwrap();

    // Time moves on before the deferred task is first polled.
    tokio::time::advance(Duration::from_secs(3)).await;

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert_eq!(
        service.poll(id).unwrap(),
        PollResult::Ready(ANGRY_MONKEY.to_string())
    );
}

#[test]
fn glob_import_coexists_with_task_poll() {
    #[allow(unused_imports)]
    use crate::*;
    #[allow(unused_imports)]
    use core::task::*;

    let task: Poll<()> = Poll::Ready(());
    assert!(task.is_ready());
    assert!(!PollResult::NotReady(1).is_ready());
}

#[tokio::test(start_paused = true)]
async fn poll_unknown_id_is_not_found() {
    let (service, _) = service();
    assert_eq!(service.poll(999), Err(Error::NotFound { id: 999 }));

    service.submit("x").unwrap();
    assert_eq!(service.poll(0), Err(Error::NotFound { id: 0 }));
    assert_eq!(service.poll(2), Err(Error::NotFound { id: 2 }));
}

#[tokio::test(start_paused = true)]
async fn poll_str_rejects_malformed_ids() {
    let (service, _) = service();
    service.submit("x").unwrap();

    assert!(matches!(
        service.poll_str("abc"),
        Err(Error::InvalidRequest { .. })
    ));
    assert!(matches!(
        service.poll_str("-1"),
        Err(Error::InvalidRequest { .. })
    ));
    assert_eq!(service.poll_str("1").unwrap(), PollResult::NotReady(1));
}

#[tokio::test(start_paused = true)]
async fn readiness_is_gated_on_age_not_completion() {
    let (service, clock) = manual_service();
    let id = service.submit("angryMonkey").unwrap();

    // The deferred task runs on the Tokio timer and stores the digest ...
    tokio::time::sleep(DELAY + Duration::from_millis(1)).await;
    assert_eq!(service.in_flight(), 0);

    // ... but the service clock says the delay has not elapsed yet.
    clock.set(DELAY - Duration::from_millis(1));
    assert_eq!(service.poll(id).unwrap(), PollResult::NotReady(id));

    clock.set(DELAY);
    assert_eq!(service.poll(id).unwrap(), PollResult::Ready(ANGRY_MONKEY.to_string()));
}

#[tokio::test(start_paused = true)]
async fn pending_entry_past_delay_is_not_ready() {
    let (service, clock) = manual_service();
    let id = service.submit("slow").unwrap();

    // The service clock runs ahead of the Tokio timer, so the completion has
    // not fired yet.
    clock.set(DELAY * 2);
    assert_eq!(service.poll(id).unwrap(), PollResult::NotReady(id));
}

#[tokio::test(start_paused = true)]
async fn shutdown_gates_every_operation() {
    let (service, _) = service();
    service.submit("before").unwrap();

    assert!(service.shutdown());
    assert_eq!(service.lifecycle_state(), LifecycleState::Draining);

    assert_eq!(service.submit("x"), Err(Error::ServiceShutdown));
    assert_eq!(service.poll(1), Err(Error::ServiceShutdown));
    assert_eq!(service.poll_str("not-a-number"), Err(Error::ServiceShutdown));
    assert_eq!(service.stats(), Err(Error::ServiceShutdown));

    // The rejected submission was never counted.
    assert_eq!(service.total_accepted(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_lets_admitted_work_finish_before_termination() {
    let (service, token) = service();
    service.submit("last").unwrap();
    assert_eq!(service.in_flight(), 1);

    assert!(service.shutdown());
    assert!(!service.shutdown());

    tokio::time::sleep(DELAY + Duration::from_millis(1)).await;

    assert!(token.is_cancelled());
    assert_eq!(service.lifecycle_state(), LifecycleState::Stopped);
    assert_eq!(service.in_flight(), 0);
    assert!(service.drain(Duration::from_secs(1)).await);
}

#[tokio::test(start_paused = true)]
async fn drain_times_out_while_work_is_pending() {
    let (service, _) = service();
    service.submit("a").unwrap();

    assert!(!service.drain(Duration::from_secs(1)).await);
    assert!(service.drain(DELAY).await);
    assert_eq!(service.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn instances_are_independent() {
    let (first, _) = service();
    let (second, _) = service();

    assert_eq!(first.submit("a").unwrap(), 1);
    assert_eq!(first.submit("b").unwrap(), 2);
    assert_eq!(second.submit("c").unwrap(), 1);

    first.shutdown();
    assert_eq!(second.submit("d").unwrap(), 2);
}

#[test]
fn debug_output_hides_values() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    rt.block_on(async {
        let (service, _) = service();
        service.submit("hunter2").unwrap();
        assert!(!format!("{service:?}").contains("hunter2"));
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_get_contiguous_ids() {
    const TASKS: u64 = 16;
    const PER_TASK: u64 = 64;

    let (service, _) = service();
    let handles: Vec<_> = (0..TASKS)
        .map(|t| {
            let service = service.clone();
            tokio::spawn(async move {
                (0..PER_TASK)
                    .map(|i| service.submit(format!("{t}:{i}")).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "duplicate id {id}");
        }
    }

    let expected: HashSet<u64> = (1..=TASKS * PER_TASK).collect();
    assert_eq!(seen, expected);
    assert_eq!(service.stats().unwrap().total, TASKS * PER_TASK);
}
