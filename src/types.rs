use serde::{Deserialize, Serialize};

/// Recorded screen geometry for one window. Serialized with the camelCase
/// field names the workspace file has always used.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPlacement {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(rename = "isMaximized")]
    pub is_maximized: bool,
}

/// Snapshot of one OS window. `handle` is an opaque string kept for
/// diagnostics only; it is meaningless across process lifetimes.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<WindowPlacement>,
}

/// A persisted application entry of a workspace. `path` is the identity key
/// for running-state checks, `name` is what process lookups match against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceApp {
    pub name: String,
    pub path: String,
    #[serde(rename = "windowCount", skip_serializing_if = "Option::is_none")]
    pub window_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windows: Option<Vec<WindowInfo>>,
}

impl WorkspaceApp {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            window_count: None,
            windows: None,
        }
    }

    /// Desired instance count, at least 1.
    pub fn window_count(&self) -> usize {
        self.window_count.map_or(1, |c| c.max(1)) as usize
    }

    /// Recorded placements; may be shorter than `window_count()`, missing
    /// entries mean "no repositioning for that window".
    pub fn windows(&self) -> &[WindowInfo] {
        self.windows.as_deref().unwrap_or(&[])
    }
}

/// A named, ordered set of applications launched/closed together.
/// `id` is assigned at creation and never changes; `apps` order is launch
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub workspace_name: String,
    pub apps: Vec<WorkspaceApp>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Transient aggregate of one running GUI application, rebuilt on every
/// inspection. `pid` is 0 when unknown and never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningApp {
    pub name: String,
    pub path: String,
    pub pid: u32,
    #[serde(rename = "windowCount")]
    pub window_count: usize,
    pub windows: Vec<WindowInfo>,
}

impl RunningApp {
    /// The "save my current desktop" mapping: keep name, path, instance
    /// count and placements.
    pub fn to_workspace_app(&self) -> WorkspaceApp {
        WorkspaceApp {
            name: self.name.clone(),
            path: self.path.clone(),
            window_count: Some(self.window_count as u32),
            windows: Some(self.windows.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStatus {
    Launching,
    Success,
    Error,
    AlreadyRunning,
}

/// One per-app progress record. Produced by the orchestrator, consumed by a
/// listener, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppLaunchStatus {
    #[serde(rename = "appName")]
    pub app_name: String,
    pub status: LaunchStatus,
    pub message: String,
}

impl AppLaunchStatus {
    pub fn success(app_name: &str, message: impl Into<String>) -> Self {
        Self {
            app_name: app_name.to_string(),
            status: LaunchStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(app_name: &str, message: impl Into<String>) -> Self {
        Self {
            app_name: app_name.to_string(),
            status: LaunchStatus::Error,
            message: message.into(),
        }
    }

    pub fn already_running(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            status: LaunchStatus::AlreadyRunning,
            message: format!("{app_name} is already running"),
        }
    }

    /// Terminal pseudo-record for a cancelled operation.
    pub fn cancelled() -> Self {
        Self {
            app_name: "Cancelled".to_string(),
            status: LaunchStatus::Error,
            message: "operation cancelled, remaining apps were not processed".to_string(),
        }
    }
}

/// Final tally of one launch/close run. `already_running` is always 0 for
/// close runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSummary {
    pub total: usize,
    pub success: usize,
    #[serde(rename = "alreadyRunning")]
    pub already_running: usize,
    pub errors: usize,
}

impl LaunchSummary {
    pub fn tally(records: &[AppLaunchStatus]) -> Self {
        let mut summary = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.status {
                LaunchStatus::Success => summary.success += 1,
                LaunchStatus::AlreadyRunning => summary.already_running += 1,
                LaunchStatus::Error => summary.errors += 1,
                LaunchStatus::Launching => {}
            }
        }
        summary
    }
}

/// Everything the progress sink receives: per-app records while the run is
/// in flight, then exactly one `Complete` unless the run was cancelled.
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchEvent {
    Status(AppLaunchStatus),
    Complete(LaunchSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_json_shape() {
        let ws = Workspace {
            id: "1".into(),
            workspace_name: "Dev".into(),
            apps: vec![WorkspaceApp {
                name: "Editor".into(),
                path: "C:\\apps\\editor.exe".into(),
                window_count: Some(2),
                windows: Some(vec![WindowInfo {
                    title: "main".into(),
                    handle: None,
                    position: Some(WindowPlacement {
                        x: 10,
                        y: 20,
                        width: 800,
                        height: 600,
                        is_maximized: false,
                    }),
                }]),
            }],
            created_at: "2026-08-06T10:00:00Z".parse().unwrap(),
            updated_at: "2026-08-06T10:00:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&ws).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "1",
                "workspace_name": "Dev",
                "apps": [{
                    "name": "Editor",
                    "path": "C:\\apps\\editor.exe",
                    "windowCount": 2,
                    "windows": [{
                        "title": "main",
                        "position": {"x": 10, "y": 20, "width": 800, "height": 600, "isMaximized": false}
                    }]
                }],
                "created_at": "2026-08-06T10:00:00Z",
                "updated_at": "2026-08-06T10:00:00Z",
            })
        );
        let back: Workspace = serde_json::from_value(value).unwrap();
        assert_eq!(back, ws);
    }

    #[test]
    fn optional_fields_tolerated() {
        let app: WorkspaceApp =
            serde_json::from_str(r#"{"name":"Editor","path":"/apps/editor"}"#).unwrap();
        assert_eq!(app.window_count(), 1);
        assert!(app.windows().is_empty());
    }

    #[test]
    fn status_serializes_snake_case() {
        let st = AppLaunchStatus::already_running("Editor");
        let value = serde_json::to_value(&st).unwrap();
        assert_eq!(value["status"], "already_running");
        assert_eq!(value["appName"], "Editor");
    }

    #[test]
    fn tally_counts_by_status() {
        let records = vec![
            AppLaunchStatus::success("a", "a launched"),
            AppLaunchStatus::already_running("b"),
            AppLaunchStatus::error("c", "failed to start"),
            AppLaunchStatus::success("d", "d launched"),
        ];
        let summary = LaunchSummary::tally(&records);
        assert_eq!(
            summary,
            LaunchSummary {
                total: 4,
                success: 2,
                already_running: 1,
                errors: 1,
            }
        );
    }

    #[test]
    fn capture_mapping_keeps_placements() {
        let running = RunningApp {
            name: "editor.exe".into(),
            path: "C:\\apps\\editor.exe".into(),
            pid: 1234,
            window_count: 2,
            windows: vec![WindowInfo::default(), WindowInfo::default()],
        };
        let app = running.to_workspace_app();
        assert_eq!(app.name, "editor.exe");
        assert_eq!(app.path, "C:\\apps\\editor.exe");
        assert_eq!(app.window_count(), 2);
        assert_eq!(app.windows().len(), 2);
    }
}
