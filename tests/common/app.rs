//! Test application lifecycle management

use super::constants::*;
use cloudmagnet::auth::{AuthSessionController, SimulatedIdentityProvider};
use cloudmagnet::cloud::{CloudProvider, InMemoryCloudStorage};
use cloudmagnet::downloads::{
    DownloadQueue, EngineSimulationSettings, QueueSettings, SharedQueue, SimulatedDownloadEngine,
};
use cloudmagnet::{AppEvent, DashboardService, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Knobs for a [`TestApp`]; defaults answer instantly.
#[derive(Clone)]
pub struct TestAppSettings {
    pub identity_latency: Duration,
    pub auth_timeout: Duration,
    pub submission_timeout: Duration,
    pub engine: EngineSimulationSettings,
    /// Spawn the engine tick loop. Off means tests call `engine.tick()`.
    pub run_engine: bool,
    pub recent_limit: usize,
}

impl Default for TestAppSettings {
    fn default() -> Self {
        Self {
            identity_latency: Duration::ZERO,
            auth_timeout: Duration::from_secs(30),
            submission_timeout: Duration::from_secs(30),
            engine: EngineSimulationSettings {
                accept_delay: Duration::ZERO,
                tick: Duration::from_secs(1),
                bytes_per_sec: ENGINE_SPEED,
                default_size_bytes: 1000,
                max_concurrent: None,
            },
            run_engine: false,
            recent_limit: 50,
        }
    }
}

/// In-process application, wired the way the binary wires it.
///
/// When dropped, background tasks are cancelled.
pub struct TestApp {
    pub events: EventBus,
    pub identity: Arc<SimulatedIdentityProvider>,
    pub auth: Arc<AuthSessionController>,
    pub engine: Arc<SimulatedDownloadEngine>,
    pub cloud: Arc<InMemoryCloudStorage>,
    pub dashboard: Arc<DashboardService>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestAppSettings::default()).await
    }

    pub async fn spawn_with(settings: TestAppSettings) -> Self {
        let events = EventBus::new();
        let shutdown = CancellationToken::new();

        let identity = Arc::new(
            SimulatedIdentityProvider::new(settings.identity_latency)
                .with_account(TEST_EMAIL, TEST_PASS)
                .expect("Failed to register test account"),
        );
        let auth = Arc::new(
            AuthSessionController::new(identity.clone(), events.clone())
                .with_timeout(settings.auth_timeout),
        );

        let engine = Arc::new(SimulatedDownloadEngine::new(settings.engine.clone()));
        let queue = SharedQueue::new(DownloadQueue::new(QueueSettings {
            quota_bytes: TEST_QUOTA,
            destination_root: Some("/Downloads".to_string()),
        }));
        let cloud = Arc::new(InMemoryCloudStorage::new(&[CloudProvider::GoogleDrive]));
        let dashboard = Arc::new(
            DashboardService::new(queue, engine.clone(), cloud.clone(), events.clone())
                .with_submission_timeout(settings.submission_timeout)
                .with_recent_limit(settings.recent_limit),
        );

        let mut tasks = vec![dashboard.start_progress_pump(shutdown.clone())];
        if settings.run_engine {
            tasks.push(tokio::spawn(engine.clone().run(shutdown.clone())));
        }

        TestApp {
            events,
            identity,
            auth,
            engine,
            cloud,
            dashboard,
            shutdown,
            tasks,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    /// Receive events until `matches` accepts one, failing after `within`.
    pub async fn wait_for_event(
        rx: &mut broadcast::Receiver<AppEvent>,
        within: Duration,
        matches: impl Fn(&AppEvent) -> bool,
    ) -> AppEvent {
        tokio::time::timeout(within, async {
            loop {
                match rx.recv().await {
                    Ok(event) if matches(&event) => return event,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("Event bus closed"),
                }
            }
        })
        .await
        .expect("Timed out waiting for event")
    }

    /// Stop background tasks and wait for them.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            task.await.expect("Background task panicked");
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
