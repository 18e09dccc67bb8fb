//! Sequential launch/close of a workspace's apps with live progress.
//!
//! One operation at a time: apps in persisted order, windows in index
//! order, fixed settle and throttle delays between steps. Cancellation is
//! cooperative and only takes effect at the checkpoints between apps (and
//! between the extra windows of one app); an in-flight probe or delay is
//! never interrupted.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use flume::Sender;
use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    store::WorkspaceStore,
    types::{AppLaunchStatus, LaunchEvent, LaunchSummary, WindowInfo},
};

/// Collaborator seams, injected so the state machine can be driven by
/// doubles in tests.
pub trait SystemProbe {
    fn is_running(&self, path: &str) -> bool;
}

pub trait ProcessControl {
    fn spawn_detached(&self, path: &str) -> anyhow::Result<()>;
    fn close_all(&self, path: &str) -> anyhow::Result<usize>;
}

pub trait WindowPlacer {
    fn place(&self, process_name: &str, window: &WindowInfo);
}

/// Cooperative cancellation for exactly one operation. Create one per call;
/// cancelling it has no effect on any other operation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fixed pacing between steps. The defaults throttle process and window
/// creation so the host is not flooded; tests run with `immediate()`.
#[derive(Clone, Copy, Debug)]
pub struct Timings {
    /// Wait after a spawn before looking for the new main window.
    pub settle: Duration,
    pub between_launches: Duration,
    pub between_closes: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            between_launches: Duration::from_millis(1500),
            between_closes: Duration::from_millis(500),
        }
    }
}

impl Timings {
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            between_launches: Duration::ZERO,
            between_closes: Duration::ZERO,
        }
    }
}

pub struct Orchestrator<P, C, W> {
    store: WorkspaceStore,
    probe: P,
    control: C,
    placer: W,
    timings: Timings,
    events: Sender<LaunchEvent>,
    in_flight: AtomicBool,
}

/// Clears the single-flight flag on every exit path.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<P, C, W> Orchestrator<P, C, W>
where
    P: SystemProbe,
    C: ProcessControl,
    W: WindowPlacer,
{
    pub fn new(
        store: WorkspaceStore,
        probe: P,
        control: C,
        placer: W,
        timings: Timings,
        events: Sender<LaunchEvent>,
    ) -> Self {
        Self {
            store,
            probe,
            control,
            placer,
            timings,
            in_flight: AtomicBool::new(false),
            events,
        }
    }

    /// Launch every app of the workspace, in order. Returns the per-app
    /// records; the same records (plus a final summary unless cancelled)
    /// stream to the event channel as they happen.
    pub fn launch(&self, workspace_id: &str, cancel: &CancelToken) -> Result<Vec<AppLaunchStatus>> {
        let _flight = self.begin()?;
        let workspace = self.store.find(workspace_id)?;
        info!(
            "launching workspace '{}' ({} apps)",
            workspace.workspace_name,
            workspace.apps.len()
        );

        let mut progress: Vec<AppLaunchStatus> = Vec::new();
        let total_apps = workspace.apps.len();
        for (position, app) in workspace.apps.iter().enumerate() {
            if self.bail_if_cancelled(cancel, &mut progress) {
                return Ok(progress);
            }

            if self.probe.is_running(&app.path) {
                self.record(&mut progress, AppLaunchStatus::already_running(&app.name));
                continue;
            }

            if let Err(err) = self.control.spawn_detached(&app.path) {
                self.record(
                    &mut progress,
                    AppLaunchStatus::error(&app.name, format!("failed to start: {err}")),
                );
                continue;
            }
            thread::sleep(self.timings.settle);
            if let Some(window) = app.windows().first().filter(|w| w.position.is_some()) {
                self.placer.place(&app.name, window);
            }

            // Extra instances of the same executable, one per remaining
            // recorded window.
            for index in 1..app.window_count() {
                if self.bail_if_cancelled(cancel, &mut progress) {
                    return Ok(progress);
                }
                if let Err(err) = self.control.spawn_detached(&app.path) {
                    warn!("extra instance {index} of {} failed to start: {err}", app.name);
                    continue;
                }
                thread::sleep(self.timings.settle);
                if let Some(window) = app.windows().get(index).filter(|w| w.position.is_some()) {
                    self.placer.place(&app.name, window);
                }
            }

            self.record(
                &mut progress,
                AppLaunchStatus::success(&app.name, format!("{} launched", app.name)),
            );
            if position + 1 < total_apps {
                thread::sleep(self.timings.between_launches);
            }
        }

        self.complete(&progress);
        Ok(progress)
    }

    /// Close every app of the workspace, in order: graceful close request to
    /// every matching process, then force-terminate stragglers.
    pub fn close(&self, workspace_id: &str, cancel: &CancelToken) -> Result<Vec<AppLaunchStatus>> {
        let _flight = self.begin()?;
        let workspace = self.store.find(workspace_id)?;
        info!(
            "closing workspace '{}' ({} apps)",
            workspace.workspace_name,
            workspace.apps.len()
        );

        let mut progress: Vec<AppLaunchStatus> = Vec::new();
        let total_apps = workspace.apps.len();
        for (position, app) in workspace.apps.iter().enumerate() {
            if self.bail_if_cancelled(cancel, &mut progress) {
                return Ok(progress);
            }

            if !self.probe.is_running(&app.path) {
                self.record(
                    &mut progress,
                    AppLaunchStatus::error(&app.name, format!("{} is not running", app.name)),
                );
            } else {
                let status = match self.control.close_all(&app.path) {
                    Ok(_) => AppLaunchStatus::success(&app.name, format!("{} closed", app.name)),
                    Err(err) => {
                        AppLaunchStatus::error(&app.name, format!("failed to close: {err}"))
                    }
                };
                self.record(&mut progress, status);
            }
            if position + 1 < total_apps {
                thread::sleep(self.timings.between_closes);
            }
        }

        self.complete(&progress);
        Ok(progress)
    }

    fn begin(&self) -> Result<FlightGuard<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Busy);
        }
        Ok(FlightGuard(&self.in_flight))
    }

    /// Push to the listener and keep for the returned result; both channels
    /// always carry identical records in identical order.
    fn record(&self, progress: &mut Vec<AppLaunchStatus>, status: AppLaunchStatus) {
        let _ = self.events.send(LaunchEvent::Status(status.clone()));
        progress.push(status);
    }

    fn bail_if_cancelled(&self, cancel: &CancelToken, progress: &mut Vec<AppLaunchStatus>) -> bool {
        if !cancel.is_cancelled() {
            return false;
        }
        info!("operation cancelled, stopping");
        self.record(progress, AppLaunchStatus::cancelled());
        true
    }

    fn complete(&self, progress: &[AppLaunchStatus]) {
        let summary = LaunchSummary::tally(progress);
        let _ = self.events.send(LaunchEvent::Complete(summary));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::types::{LaunchStatus, WindowPlacement, Workspace, WorkspaceApp};

    #[derive(Clone, Default)]
    struct FakeProbe {
        running: Arc<Mutex<Vec<String>>>,
    }

    impl FakeProbe {
        fn running(paths: &[&str]) -> Self {
            Self {
                running: Arc::new(Mutex::new(
                    paths.iter().map(|p| p.to_string()).collect(),
                )),
            }
        }
    }

    impl SystemProbe for FakeProbe {
        fn is_running(&self, path: &str) -> bool {
            self.running
                .lock()
                .iter()
                .any(|p| p.eq_ignore_ascii_case(path))
        }
    }

    #[derive(Clone, Default)]
    struct FakeControl {
        spawned: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<Vec<String>>>,
        fail_spawns_of: Arc<Mutex<Vec<String>>>,
    }

    impl ProcessControl for FakeControl {
        fn spawn_detached(&self, path: &str) -> anyhow::Result<()> {
            if self.fail_spawns_of.lock().iter().any(|p| p == path) {
                anyhow::bail!("no such executable");
            }
            self.spawned.lock().push(path.to_string());
            Ok(())
        }

        fn close_all(&self, path: &str) -> anyhow::Result<usize> {
            self.closed.lock().push(path.to_string());
            Ok(1)
        }
    }

    #[derive(Clone, Default)]
    struct FakePlacer {
        placed: Arc<Mutex<Vec<(String, WindowInfo)>>>,
    }

    impl WindowPlacer for FakePlacer {
        fn place(&self, process_name: &str, window: &WindowInfo) {
            self.placed
                .lock()
                .push((process_name.to_string(), window.clone()));
        }
    }

    struct Rig {
        orchestrator: Orchestrator<FakeProbe, FakeControl, FakePlacer>,
        control: FakeControl,
        placer: FakePlacer,
        events: flume::Receiver<LaunchEvent>,
        _dir: tempfile::TempDir,
    }

    fn rig(apps: Vec<WorkspaceApp>, probe: FakeProbe) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::at(dir.path().join("workspaces.json"));
        let now = chrono::Utc::now();
        store
            .save_all(&[Workspace {
                id: "ws-1".into(),
                workspace_name: "Dev".into(),
                apps,
                created_at: now,
                updated_at: now,
            }])
            .unwrap();

        let control = FakeControl::default();
        let placer = FakePlacer::default();
        let (tx, rx) = flume::unbounded();
        let orchestrator = Orchestrator::new(
            store,
            probe.clone(),
            control.clone(),
            placer.clone(),
            Timings::immediate(),
            tx,
        );
        Rig {
            orchestrator,
            control,
            placer,
            events: rx,
            _dir: dir,
        }
    }

    fn app(name: &str, path: &str) -> WorkspaceApp {
        WorkspaceApp::new(name, path)
    }

    fn drain(events: &flume::Receiver<LaunchEvent>) -> (Vec<AppLaunchStatus>, Vec<LaunchSummary>) {
        let mut statuses = Vec::new();
        let mut summaries = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                LaunchEvent::Status(status) => statuses.push(status),
                LaunchEvent::Complete(summary) => summaries.push(summary),
            }
        }
        (statuses, summaries)
    }

    #[test]
    fn launch_emits_one_record_per_app_plus_summary() {
        let rig = rig(
            vec![
                app("Editor", "/apps/editor"),
                app("Browser", "/apps/browser"),
                app("Player", "/apps/player"),
            ],
            FakeProbe::running(&["/apps/browser"]),
        );

        let result = rig.orchestrator.launch("ws-1", &CancelToken::new()).unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[0].status, LaunchStatus::Success);
        assert_eq!(result[1].status, LaunchStatus::AlreadyRunning);
        assert_eq!(result[2].status, LaunchStatus::Success);

        let (statuses, summaries) = drain(&rig.events);
        // listener saw exactly what the caller got back, in the same order
        assert_eq!(statuses, result);
        assert_eq!(
            summaries,
            vec![LaunchSummary {
                total: 3,
                success: 2,
                already_running: 1,
                errors: 0,
            }]
        );
    }

    #[test]
    fn already_running_apps_are_never_respawned() {
        let rig = rig(
            vec![app("Editor", "/apps/editor")],
            FakeProbe::running(&["/apps/editor"]),
        );

        let result = rig.orchestrator.launch("ws-1", &CancelToken::new()).unwrap();

        assert_eq!(result[0].status, LaunchStatus::AlreadyRunning);
        assert!(rig.control.spawned.lock().is_empty());
        assert!(rig.placer.placed.lock().is_empty());
    }

    #[test]
    fn spawn_failure_is_recorded_and_loop_continues() {
        let rig = rig(
            vec![app("Ghost", "/apps/ghost"), app("Editor", "/apps/editor")],
            FakeProbe::default(),
        );
        rig.control.fail_spawns_of.lock().push("/apps/ghost".into());

        let result = rig.orchestrator.launch("ws-1", &CancelToken::new()).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].status, LaunchStatus::Error);
        assert_eq!(result[1].status, LaunchStatus::Success);

        let (_, summaries) = drain(&rig.events);
        assert_eq!(
            summaries,
            vec![LaunchSummary {
                total: 2,
                success: 1,
                already_running: 0,
                errors: 1,
            }]
        );
    }

    #[test]
    fn multi_window_app_spawns_one_instance_per_window() {
        let placement = WindowPlacement {
            x: 0,
            y: 0,
            width: 640,
            height: 480,
            is_maximized: false,
        };
        let rig = rig(
            vec![WorkspaceApp {
                name: "Editor".into(),
                path: "/apps/editor".into(),
                window_count: Some(3),
                windows: Some(vec![
                    WindowInfo {
                        title: "one".into(),
                        handle: None,
                        position: Some(placement),
                    },
                    WindowInfo {
                        title: "two".into(),
                        handle: None,
                        position: None,
                    },
                    // third placement missing entirely: tolerated
                ]),
            }],
            FakeProbe::default(),
        );

        let result = rig.orchestrator.launch("ws-1", &CancelToken::new()).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].status, LaunchStatus::Success);
        assert_eq!(rig.control.spawned.lock().len(), 3);
        // only the window with a recorded position was repositioned
        let placed = rig.placer.placed.lock();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].1.title, "one");
    }

    #[test]
    fn cancel_before_app_k_yields_k_records_and_no_summary() {
        #[derive(Clone)]
        struct CancelAfterFirst {
            inner: FakeProbe,
            cancel: CancelToken,
            probes: Arc<Mutex<u32>>,
        }
        impl SystemProbe for CancelAfterFirst {
            fn is_running(&self, path: &str) -> bool {
                let mut probes = self.probes.lock();
                *probes += 1;
                if *probes == 1 {
                    self.cancel.cancel();
                }
                self.inner.is_running(path)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::at(dir.path().join("workspaces.json"));
        let now = chrono::Utc::now();
        store
            .save_all(&[Workspace {
                id: "ws-1".into(),
                workspace_name: "Dev".into(),
                apps: vec![
                    app("Editor", "/apps/editor"),
                    app("Browser", "/apps/browser"),
                    app("Player", "/apps/player"),
                ],
                created_at: now,
                updated_at: now,
            }])
            .unwrap();

        let cancel = CancelToken::new();
        let probe = CancelAfterFirst {
            inner: FakeProbe::default(),
            cancel: cancel.clone(),
            probes: Arc::new(Mutex::new(0)),
        };
        let (tx, rx) = flume::unbounded();
        let orchestrator = Orchestrator::new(
            store,
            probe,
            FakeControl::default(),
            FakePlacer::default(),
            Timings::immediate(),
            tx,
        );

        let result = orchestrator.launch("ws-1", &cancel).unwrap();

        // app 0 was processed, then the checkpoint before app 1 tripped
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].status, LaunchStatus::Success);
        assert_eq!(result[1].app_name, "Cancelled");
        assert_eq!(result[1].status, LaunchStatus::Error);

        let mut statuses = Vec::new();
        let mut summaries = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                LaunchEvent::Status(status) => statuses.push(status),
                LaunchEvent::Complete(_) => summaries += 1,
            }
        }
        assert_eq!(statuses, result);
        assert_eq!(summaries, 0);
    }

    #[test]
    fn cancelling_up_front_emits_only_the_cancelled_record() {
        let rig = rig(
            vec![app("Editor", "/apps/editor")],
            FakeProbe::default(),
        );
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = rig.orchestrator.launch("ws-1", &cancel).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].app_name, "Cancelled");
        let (statuses, summaries) = drain(&rig.events);
        assert_eq!(statuses, result);
        assert!(summaries.is_empty());
        assert!(rig.control.spawned.lock().is_empty());
    }

    #[test]
    fn close_skips_apps_that_are_not_running() {
        let rig = rig(
            vec![app("Editor", "/apps/editor"), app("Browser", "/apps/browser")],
            FakeProbe::running(&["/apps/browser"]),
        );

        let result = rig.orchestrator.close("ws-1", &CancelToken::new()).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].status, LaunchStatus::Error);
        assert!(result[0].message.contains("not running"));
        assert_eq!(result[1].status, LaunchStatus::Success);
        // no terminate call for the app that was not running
        assert_eq!(rig.control.closed.lock().as_slice(), ["/apps/browser"]);

        let (statuses, summaries) = drain(&rig.events);
        assert_eq!(statuses, result);
        assert_eq!(
            summaries,
            vec![LaunchSummary {
                total: 2,
                success: 1,
                already_running: 0,
                errors: 1,
            }]
        );
    }

    #[test]
    fn unknown_workspace_fails_without_progress() {
        let rig = rig(vec![app("Editor", "/apps/editor")], FakeProbe::default());

        let err = rig
            .orchestrator
            .launch("no-such-id", &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        let (statuses, summaries) = drain(&rig.events);
        assert!(statuses.is_empty());
        assert!(summaries.is_empty());
    }

    #[test]
    fn single_app_end_to_end() {
        let rig = rig(vec![app("Editor", "/apps/editor")], FakeProbe::default());

        let result = rig.orchestrator.launch("ws-1", &CancelToken::new()).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].app_name, "Editor");
        assert_eq!(result[0].status, LaunchStatus::Success);
        assert!(result[0].message.contains("Editor"));

        let (_, summaries) = drain(&rig.events);
        assert_eq!(
            summaries,
            vec![LaunchSummary {
                total: 1,
                success: 1,
                already_running: 0,
                errors: 0,
            }]
        );
    }

    #[test]
    fn overlapping_operations_are_rejected() {
        let rig = rig(vec![app("Editor", "/apps/editor")], FakeProbe::default());

        let guard = rig.orchestrator.begin().unwrap();
        let err = rig
            .orchestrator
            .launch("ws-1", &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::Busy));
        drop(guard);

        // the guard released the slot, the next operation may start
        assert!(rig.orchestrator.launch("ws-1", &CancelToken::new()).is_ok());
    }
}
