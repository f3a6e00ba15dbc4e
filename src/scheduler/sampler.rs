// src/scheduler/sampler.rs
use crate::config::{ConfigStore, Configuration};
use crate::metrics::MetricsCollector;
use crate::probe::{ProbeExecutor, ProbeFailure};
use crate::status::{classify, Status, StatusPublisher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    pub period: Duration,
    pub probe_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

struct RunHandle {
    run_id: Uuid,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

enum RunState {
    Stopped,
    Running(RunHandle),
}

struct Shared {
    store: Arc<ConfigStore>,
    executor: Arc<dyn ProbeExecutor>,
    publisher: StatusPublisher,
    metrics: Option<Arc<MetricsCollector>>,
    settings: SchedulerSettings,
    runtime: Handle,
    /// Serializes start/stop transitions.
    state: Mutex<RunState>,
    /// Run allowed to publish. Held across observer calls, and only ever
    /// taken by `start`, `halt` and `publish_for`.
    active_run: Mutex<Option<Uuid>>,
    running: AtomicBool,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_active_run(&self) -> MutexGuard<'_, Option<Uuid>> {
        self.active_run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish on behalf of `run_id`, but only while that run is still the
    /// active one. Holding the guard across the publish is what keeps
    /// `stop()` from returning while a publish is in progress.
    fn publish_for(&self, run_id: Uuid, status: Status) -> bool {
        let active = self.lock_active_run();
        if *active != Some(run_id) {
            return false;
        }

        if let Some(metrics) = &self.metrics {
            metrics.update_status(&status);
        }
        self.publisher.publish(status);
        true
    }
}

/// Drives the sampling loop: one probe per tick, classified against the
/// configuration snapshot taken when the probe was dispatched.
///
/// At most one probe is in flight. The probe is awaited inside the tick, and
/// ticks that come due meanwhile are skipped rather than queued.
///
/// Observers may call `is_running` from `on_status_changed`, but must not
/// call `start`/`stop` from there: publishing holds the run guard those need.
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Must be called from within a tokio runtime; the loop is later spawned
    /// on that runtime, so `start` itself can be called from any thread.
    pub fn new(
        store: Arc<ConfigStore>,
        executor: Arc<dyn ProbeExecutor>,
        publisher: StatusPublisher,
        settings: SchedulerSettings,
    ) -> Self {
        Self::build(store, executor, publisher, settings, None)
    }

    pub fn with_metrics(
        store: Arc<ConfigStore>,
        executor: Arc<dyn ProbeExecutor>,
        publisher: StatusPublisher,
        settings: SchedulerSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        metrics.set_running(false);
        Self::build(store, executor, publisher, settings, Some(metrics))
    }

    fn build(
        store: Arc<ConfigStore>,
        executor: Arc<dyn ProbeExecutor>,
        publisher: StatusPublisher,
        settings: SchedulerSettings,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                executor,
                publisher,
                metrics,
                settings,
                runtime: Handle::current(),
                state: Mutex::new(RunState::Stopped),
                active_run: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> SchedulerSettings {
        self.shared.settings
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Begin sampling. Returns `false` if a loop was already running.
    pub fn start(&self) -> bool {
        let mut state = self.shared.lock_state();
        if let RunState::Running(handle) = &*state {
            debug!(run_id = %handle.run_id, "Sampler already running");
            return false;
        }

        let run_id = Uuid::new_v4();
        // Armed before the task exists so its first publish is accepted.
        *self.shared.lock_active_run() = Some(run_id);
        self.shared.running.store(true, Ordering::SeqCst);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let span = info_span!("sampler", %run_id);
        let task = self
            .shared
            .runtime
            .spawn(run_loop(self.shared.clone(), run_id, shutdown_rx).instrument(span));

        *state = RunState::Running(RunHandle {
            run_id,
            shutdown_tx,
            task,
        });

        if let Some(metrics) = &self.shared.metrics {
            metrics.set_running(true);
        }

        info!(
            %run_id,
            "Starting sampler with period {:?}, probe timeout {:?}",
            self.shared.settings.period, self.shared.settings.probe_timeout
        );
        true
    }

    /// Stop sampling. Once this returns no further status from the stopped
    /// run can reach the publisher. Returns `false` if already stopped.
    pub fn stop(&self) -> bool {
        self.halt().is_some()
    }

    /// Like [`stop`](Self::stop), then wait for the loop task to finish.
    pub async fn shutdown(&self) {
        if let Some(task) = self.halt() {
            // An aborted task reports a cancellation error; nothing to act on.
            let _ = task.await;
        }
    }

    fn halt(&self) -> Option<JoinHandle<()>> {
        let mut state = self.shared.lock_state();
        let handle = match std::mem::replace(&mut *state, RunState::Stopped) {
            RunState::Running(handle) => handle,
            RunState::Stopped => return None,
        };

        // Waits out a publish already in progress, then shuts the door.
        let mut active = self.shared.lock_active_run();
        *active = None;
        self.shared.running.store(false, Ordering::SeqCst);

        let _ = handle.shutdown_tx.send(true);
        // Drops any in-flight probe (and its child process) right away.
        handle.task.abort();

        // Back to the neutral status while still holding the guard.
        self.shared.publisher.publish(Status::unknown());
        if let Some(metrics) = &self.shared.metrics {
            metrics.update_status(&Status::unknown());
            metrics.set_running(false);
        }
        drop(active);

        info!(run_id = %handle.run_id, "Sampler stopped");
        Some(handle.task)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let RunState::Running(handle) = &*self.shared.lock_state() {
            handle.task.abort();
        }
    }
}

async fn run_loop(shared: Arc<Shared>, run_id: Uuid, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = interval(shared.settings.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_invalid: Option<Arc<Configuration>> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => break,
        }

        // Dispatch-time snapshot; classification below uses the same one.
        let cfg = shared.store.get();
        if let Err(e) = cfg.validate() {
            let already_reported = last_invalid
                .as_ref()
                .map_or(false, |prev| Arc::ptr_eq(prev, &cfg));
            if !already_reported {
                warn!("Configuration is invalid, classifying as poor until replaced: {}", e);
                last_invalid = Some(cfg.clone());
            }
        } else {
            last_invalid = None;
        }

        let started = Instant::now();
        let probe_timeout = shared.settings.probe_timeout;
        let result = tokio::select! {
            outcome = timeout(probe_timeout, shared.executor.probe(&cfg.target, probe_timeout)) => {
                outcome.unwrap_or(Err(ProbeFailure::Timeout(probe_timeout)))
            }
            _ = shutdown_rx.changed() => break,
        };
        let elapsed = started.elapsed();

        if let Some(metrics) = &shared.metrics {
            metrics.record_probe(result.as_ref().err().map(ProbeFailure::reason), elapsed);
        }

        match &result {
            Ok(m) => debug!(target_host = %cfg.target, "Probe took {:.2} ms", m.elapsed_ms),
            Err(e) => warn!(
                target_host = %cfg.target,
                reason = %e.reason(),
                "Probe failed after {:?}: {}",
                elapsed,
                e
            ),
        }

        let status = classify(&result, &cfg).observed_now();
        if !shared.publish_for(run_id, status) {
            debug!("Run superseded, discarding result");
            break;
        }
    }

    debug!("Sampler loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{Measurement, ProbeResult};
    use crate::status::StatusLevel;
    use async_trait::async_trait;
    use once_cell::sync::OnceCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Weak;

    struct FixedProbe {
        elapsed_ms: f64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProbeExecutor for FixedProbe {
        async fn probe(&self, _target: &str, _timeout: Duration) -> ProbeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Measurement::new(self.elapsed_ms))
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn fast_settings() -> SchedulerSettings {
        SchedulerSettings {
            period: Duration::from_millis(10),
            probe_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_start_stop_transitions() {
        let probe = Arc::new(FixedProbe {
            elapsed_ms: 10.0,
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(
            Arc::new(ConfigStore::default()),
            probe,
            StatusPublisher::new(),
            fast_settings(),
        );

        assert!(!scheduler.is_running());
        assert!(!scheduler.stop());
        assert!(scheduler.start());
        assert!(scheduler.is_running());
        assert!(!scheduler.start());
        assert!(scheduler.stop());
        assert!(!scheduler.is_running());
        assert!(!scheduler.stop());
    }

    #[tokio::test]
    async fn test_publishes_classified_status() {
        let probe = Arc::new(FixedProbe {
            elapsed_ms: 10.0,
            calls: AtomicUsize::new(0),
        });
        let publisher = StatusPublisher::new();
        let mut rx = publisher.watch();
        let scheduler = Scheduler::new(
            Arc::new(ConfigStore::default()),
            probe.clone(),
            publisher.clone(),
            fast_settings(),
        );

        scheduler.start();
        rx.changed().await.unwrap();
        let status = rx.borrow_and_update().clone();
        assert_eq!(status.level, StatusLevel::Excellent);
        assert_eq!(status.latency_ms, Some(10.0));
        assert!(status.observed_at.is_some());

        scheduler.shutdown().await;
        assert_eq!(publisher.current(), Status::unknown());
        assert!(probe.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_metrics_follow_state() {
        let registry = crate::metrics::MetricsRegistry::new().unwrap();
        let metrics = registry.collector();
        let scheduler = Scheduler::with_metrics(
            Arc::new(ConfigStore::default()),
            Arc::new(FixedProbe {
                elapsed_ms: 200.0,
                calls: AtomicUsize::new(0),
            }),
            StatusPublisher::new(),
            fast_settings(),
            metrics.clone(),
        );

        scheduler.start();
        assert_eq!(metrics.scheduler_running.get(), 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(metrics.status.get(), StatusLevel::Fair.ordinal());

        scheduler.stop();
        assert_eq!(metrics.scheduler_running.get(), 0);
        assert_eq!(metrics.status.get(), StatusLevel::Unknown.ordinal());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_observer_can_read_running_state() {
        let publisher = StatusPublisher::new();
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(ConfigStore::default()),
            Arc::new(FixedProbe {
                elapsed_ms: 10.0,
                calls: AtomicUsize::new(0),
            }),
            publisher.clone(),
            fast_settings(),
        ));

        // The tray relabels its Start/Stop entry from inside the callback.
        let slot: Arc<OnceCell<Weak<Scheduler>>> = Arc::new(OnceCell::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (slot_ref, seen_ref) = (slot.clone(), seen.clone());
        let _sub = publisher.subscribe(Arc::new(move |_: &Status| {
            if let Some(scheduler) = slot_ref.get().and_then(Weak::upgrade) {
                seen_ref.lock().unwrap().push(scheduler.is_running());
            }
        }));
        let _ = slot.set(Arc::downgrade(&scheduler));

        scheduler.start();
        let reported = timeout(Duration::from_secs(2), async {
            while seen.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(reported.is_ok(), "observer never returned");

        let stopper = scheduler.clone();
        let stopped = timeout(
            Duration::from_secs(2),
            tokio::task::spawn_blocking(move || stopper.stop()),
        )
        .await;
        assert!(matches!(stopped, Ok(Ok(true))), "stop() did not return");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&true));
        // The reset to Unknown during stop already reports stopped.
        assert_eq!(seen.last(), Some(&false));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_from_thread_outside_runtime() {
        let publisher = StatusPublisher::new();
        let mut rx = publisher.watch();
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(ConfigStore::default()),
            Arc::new(FixedProbe {
                elapsed_ms: 10.0,
                calls: AtomicUsize::new(0),
            }),
            publisher.clone(),
            fast_settings(),
        ));

        let remote = scheduler.clone();
        let started = std::thread::spawn(move || remote.start()).join().unwrap();
        assert!(started);

        timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("no status within 2s")
            .unwrap();
        assert_eq!(rx.borrow_and_update().level, StatusLevel::Excellent);

        scheduler.shutdown().await;
        assert!(!scheduler.is_running());
    }
}
