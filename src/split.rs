//! Split view layouts
//!
//! A split view lays out two or more sessions side by side in one direction.
//! Views reference sessions by id and never own them: when the registry
//! removes a session, the manager prunes it from its view, renormalizes the
//! remaining ratios and collapses views left with a single session.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::SessionId;
use crate::session::{CreateSessionRequest, SessionObserver, SessionRegistry};

/// Tolerance when checking that ratios sum to one
const RATIO_EPSILON: f64 = 1e-9;

/// Orientation of a split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitDirection {
    /// Panes side by side
    Horizontal,
    /// Panes stacked
    Vertical,
}

/// One split layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitView {
    pub id: String,
    pub direction: SplitDirection,
    /// Sessions in display order
    pub sessions: Vec<SessionId>,
    /// Relative size of each session, summing to 1.0
    pub ratios: Vec<f64>,
}

impl SplitView {
    fn new(direction: SplitDirection, sessions: Vec<SessionId>) -> Self {
        let share = 1.0 / sessions.len() as f64;
        Self {
            id: Uuid::new_v4().to_string(),
            direction,
            ratios: vec![share; sessions.len()],
            sessions,
        }
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Place `new` right after `parent`, giving it half of the parent's share
    fn insert_after(&mut self, parent: SessionId, new: SessionId) -> bool {
        let Some(index) = self.sessions.iter().position(|id| *id == parent) else {
            return false;
        };
        let half = self.ratios[index] / 2.0;
        self.ratios[index] = half;
        self.sessions.insert(index + 1, new);
        self.ratios.insert(index + 1, half);
        true
    }

    /// Drop a session and rescale the rest. Returns whether it was present.
    fn remove(&mut self, id: SessionId) -> bool {
        let Some(index) = self.sessions.iter().position(|other| *other == id) else {
            return false;
        };
        self.sessions.remove(index);
        self.ratios.remove(index);
        normalize(&mut self.ratios);
        true
    }
}

/// Scale ratios so they sum to one. An all-zero list becomes equal shares.
fn normalize(ratios: &mut [f64]) {
    if ratios.is_empty() {
        return;
    }
    let total: f64 = ratios.iter().sum();
    if total <= 0.0 {
        let share = 1.0 / ratios.len() as f64;
        ratios.iter_mut().for_each(|r| *r = share);
    } else {
        ratios.iter_mut().for_each(|r| *r /= total);
    }
}

/// Bookkeeping of split layouts over registry sessions
pub struct SplitViewManager {
    registry: SessionRegistry,
    views: Mutex<Vec<SplitView>>,
}

impl std::fmt::Debug for SplitViewManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitViewManager")
            .field("views", &self.lock().len())
            .finish()
    }
}

impl SplitViewManager {
    /// Create a manager and subscribe it to session removals
    pub fn new(registry: SessionRegistry) -> Arc<Self> {
        let manager = Arc::new(Self {
            registry,
            views: Mutex::new(Vec::new()),
        });
        let observer: Weak<SplitViewManager> = Arc::downgrade(&manager);
        let observer: Weak<dyn SessionObserver> = observer;
        manager.registry.add_observer(observer);
        manager
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SplitView>> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new session next to `parent_id`, with the parent's profile,
    /// theme, working directory and size.
    ///
    /// If the parent already sits in a split of the same direction the new
    /// session joins it. Otherwise a new two-pane split is started and the
    /// parent leaves its previous split.
    pub async fn create_split(
        &self,
        parent_id: SessionId,
        direction: SplitDirection,
    ) -> Result<SessionId> {
        let parent = self.registry.get_session(parent_id)?;
        if !parent.is_running() {
            return Err(Error::InvalidSplit {
                reason: format!("session '{}' is not running", parent_id),
            });
        }

        let request = CreateSessionRequest::new()
            .profile(parent.profile_name.clone())
            .theme(parent.theme_name.clone())
            .cwd(parent.cwd.clone())
            .size(parent.size);
        let session = self.registry.create_session(request).await?;
        self.place(parent_id, session.id, direction)
    }

    /// Record `new_id` next to `parent_id`. Either may have ended while the
    /// new shell was starting.
    fn place(
        &self,
        parent_id: SessionId,
        new_id: SessionId,
        direction: SplitDirection,
    ) -> Result<SessionId> {
        // Removal notifications take this lock, so the checks below cannot
        // go stale before the view is updated
        let mut views = self.lock();
        if !self.is_live(new_id) {
            debug!("Split session {} ended before it was placed", new_id);
            return Err(Error::SessionNotFound { id: new_id });
        }
        if !self.is_live(parent_id) {
            debug!("Split parent {} ended, {} stays unsplit", parent_id, new_id);
            return Ok(new_id);
        }

        let existing = views.iter().position(|view| view.contains(parent_id));
        match existing {
            Some(index) if views[index].direction == direction => {
                views[index].insert_after(parent_id, new_id);
                debug!("Session {} joined split {}", new_id, views[index].id);
            }
            _ => {
                if let Some(index) = existing {
                    prune(&mut views, index, parent_id);
                }
                let view = SplitView::new(direction, vec![parent_id, new_id]);
                info!(
                    "Created {:?} split {} for sessions {} and {}",
                    direction, view.id, parent_id, new_id
                );
                views.push(view);
            }
        }
        Ok(new_id)
    }

    fn is_live(&self, id: SessionId) -> bool {
        self.registry
            .get_session(id)
            .is_ok_and(|session| session.is_running())
    }

    fn forget(&self, id: SessionId) {
        let mut views = self.lock();
        while let Some(index) = views.iter().position(|view| view.contains(id)) {
            prune(&mut views, index, id);
        }
    }

    /// Forget a split layout. Its sessions keep running.
    pub fn remove_split_view(&self, split_id: &str) -> Result<SplitView> {
        let mut views = self.lock();
        let index = views
            .iter()
            .position(|view| view.id == split_id)
            .ok_or_else(|| Error::SplitNotFound {
                split_id: split_id.to_string(),
            })?;
        Ok(views.remove(index))
    }

    /// Replace the ratios of a split. They are normalized to sum to one.
    pub fn update_split_view(&self, split_id: &str, ratios: Vec<f64>) -> Result<SplitView> {
        let mut views = self.lock();
        let view = views
            .iter_mut()
            .find(|view| view.id == split_id)
            .ok_or_else(|| Error::SplitNotFound {
                split_id: split_id.to_string(),
            })?;

        if ratios.len() != view.sessions.len() {
            return Err(Error::InvalidSplit {
                reason: format!(
                    "expected {} ratios, got {}",
                    view.sessions.len(),
                    ratios.len()
                ),
            });
        }
        if let Some(bad) = ratios.iter().find(|r| !r.is_finite() || **r <= 0.0) {
            return Err(Error::InvalidSplit {
                reason: format!("ratio {} must be positive", bad),
            });
        }

        let mut ratios = ratios;
        normalize(&mut ratios);
        view.ratios = ratios;
        Ok(view.clone())
    }

    pub fn get_split_view(&self, split_id: &str) -> Result<SplitView> {
        self.lock()
            .iter()
            .find(|view| view.id == split_id)
            .cloned()
            .ok_or_else(|| Error::SplitNotFound {
                split_id: split_id.to_string(),
            })
    }

    pub fn split_views(&self) -> Vec<SplitView> {
        self.lock().clone()
    }

    /// The split a session is laid out in, if any
    pub fn split_for_session(&self, id: SessionId) -> Option<SplitView> {
        self.lock().iter().find(|view| view.contains(id)).cloned()
    }
}

/// Remove `id` from `views[index]`, collapsing the view below two sessions
fn prune(views: &mut Vec<SplitView>, index: usize, id: SessionId) {
    views[index].remove(id);
    if views[index].len() < 2 {
        let collapsed = views.remove(index);
        debug!("Split {} collapsed", collapsed.id);
    }
}

impl SessionObserver for SplitViewManager {
    fn session_removed(&self, id: SessionId) {
        self.forget(id);
    }

    /// Retained exited sessions leave their layout too
    fn session_exited(&self, id: SessionId) {
        self.forget(id);
    }
}
