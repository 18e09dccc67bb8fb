//! Workspace persistence: one JSON document holding every saved workspace.
//!
//! The orchestrator only ever reads; create/update/delete live here and
//! nowhere else. Ids are assigned on create and never reused or changed.

use std::{fs, path::PathBuf};

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    types::{Workspace, WorkspaceApp},
};

#[derive(Clone)]
pub struct WorkspaceStore {
    path: PathBuf,
}

impl WorkspaceStore {
    /// Store under the per-user config directory.
    pub fn open_default() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("no config directory for this user"))?;
        Ok(Self {
            path: dir.join("winspace").join("workspaces.json"),
        })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Missing file means no workspaces yet, not an error.
    pub fn load_all(&self) -> Result<Vec<Workspace>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save_all(&self, workspaces: &[Workspace]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(workspaces)?)?;
        debug!("saved {} workspace(s) to {}", workspaces.len(), self.path.display());
        Ok(())
    }

    pub fn find(&self, id: &str) -> Result<Workspace> {
        self.load_all()?
            .into_iter()
            .find(|ws| ws.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub fn create(&self, name: &str, apps: Vec<WorkspaceApp>) -> Result<Workspace> {
        let mut all = self.load_all()?;
        let now = Utc::now();
        let workspace = Workspace {
            id: Uuid::new_v4().to_string(),
            workspace_name: name.to_string(),
            apps,
            created_at: now,
            updated_at: now,
        };
        all.push(workspace.clone());
        self.save_all(&all)?;
        Ok(workspace)
    }

    /// Replaces name and apps; id and created_at survive, updated_at moves.
    pub fn update(&self, id: &str, name: &str, apps: Vec<WorkspaceApp>) -> Result<Workspace> {
        let mut all = self.load_all()?;
        let workspace = all
            .iter_mut()
            .find(|ws| ws.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        workspace.workspace_name = name.to_string();
        workspace.apps = apps;
        workspace.updated_at = Utc::now();
        let updated = workspace.clone();
        self.save_all(&all)?;
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let mut all = self.load_all()?;
        let before = all.len();
        all.retain(|ws| ws.id != id);
        if all.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        self.save_all(&all)
    }
}
