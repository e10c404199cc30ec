use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{Extension, Json, extract::State};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use dishwatch_auth::SESSION_TTL_DAYS;
use dishwatch_types::api::{Claims, SessionResponse};

use crate::auth::AppState;
use crate::error::ApiError;

/// Pending CSRF states are capped; an abandoned login just ages out of
/// the queue once enough newer attempts arrive.
const MAX_PENDING_STATES: usize = 64;

/// Explicit per-login state: the selected hall, selected meal, and the
/// set of dishes currently flagged missing. One object per session id
/// instead of ambient per-widget keys, so a hall or meal switch can
/// reset exactly the right things.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub hall: Option<String>,
    pub meal: Option<String>,
    pub checked: HashSet<i64>,
    pub username: Option<String>,
    /// Mirrors the JWT expiry, so the store entry dies with the token.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            hall: None,
            meal: None,
            checked: HashSet::new(),
            username: None,
            expires_at: Utc::now() + chrono::Duration::days(SESSION_TTL_DAYS),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Picking a hall resets the meal and any flagged dishes.
    pub fn select_hall(&mut self, hall: String) {
        self.hall = Some(hall);
        self.meal = None;
        self.checked.clear();
    }

    /// Picking a meal keeps the hall but resets flagged dishes.
    pub fn select_meal(&mut self, meal: String) {
        self.meal = Some(meal);
        self.checked.clear();
    }

    pub fn set_missing(&mut self, dish_id: i64, missing: bool) {
        if missing {
            self.checked.insert(dish_id);
        } else {
            self.checked.remove(&dish_id);
        }
    }

    pub fn snapshot(&self) -> SessionResponse {
        let mut checked: Vec<i64> = self.checked.iter().copied().collect();
        checked.sort_unstable();
        SessionResponse {
            hall: self.hall.clone(),
            meal: self.meal.clone(),
            checked,
            username: self.username.clone(),
        }
    }
}

/// All live sessions plus the pending OAuth CSRF states, behind one
/// mutex. Single-process, low-traffic; contention is not a concern.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    sessions: HashMap<Uuid, Session>,
    pending_states: VecDeque<String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_state(&self, state: String) -> Result<(), ApiError> {
        let mut guard = self.lock()?;
        guard.pending_states.push_back(state);
        while guard.pending_states.len() > MAX_PENDING_STATES {
            guard.pending_states.pop_front();
        }
        Ok(())
    }

    /// Consume a pending CSRF state. Always removes it, so a failed
    /// exchange can't be replayed with the same state.
    pub fn take_state(&self, state: &str) -> Result<bool, ApiError> {
        let mut guard = self.lock()?;
        match guard.pending_states.iter().position(|s| s == state) {
            Some(pos) => {
                guard.pending_states.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn create(&self, access_token: String) -> Result<Uuid, ApiError> {
        let id = Uuid::new_v4();
        let mut guard = self.lock()?;
        // Login is the natural moment to drop sessions whose tokens
        // have expired anyway.
        guard.sessions.retain(|_, s| !s.is_expired());
        guard.sessions.insert(id, Session::new(access_token));
        Ok(id)
    }

    pub fn remove(&self, id: Uuid) -> Result<(), ApiError> {
        self.lock()?.sessions.remove(&id);
        Ok(())
    }

    pub fn contains(&self, id: Uuid) -> Result<bool, ApiError> {
        let mut guard = self.lock()?;
        match guard.sessions.get(&id) {
            Some(s) if s.is_expired() => {
                guard.sessions.remove(&id);
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    /// Run `f` against the session, or 401 if it's gone (logout,
    /// restart, expiry).
    pub fn with<T>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> T) -> Result<T, ApiError> {
        let mut guard = self.lock()?;
        if guard.sessions.get(&id).is_some_and(|s| s.is_expired()) {
            guard.sessions.remove(&id);
        }
        let session = guard.sessions.get_mut(&id).ok_or(ApiError::Unauthorized)?;
        Ok(f(session))
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>, ApiError> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("session store lock poisoned: {}", e).into())
    }
}

// -- Handlers --

pub async fn get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<SessionResponse>, ApiError> {
    let snapshot = state.sessions.with(claims.sub, |s| s.snapshot())?;
    Ok(Json(snapshot))
}

pub async fn select_hall(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<dishwatch_types::api::SelectHallRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    if !dishwatch_types::models::halls().contains(&req.hall.as_str()) {
        return Err(ApiError::UnknownSelection(req.hall));
    }

    let snapshot = state.sessions.with(claims.sub, |s| {
        s.select_hall(req.hall);
        s.snapshot()
    })?;
    Ok(Json(snapshot))
}

pub async fn select_meal(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<dishwatch_types::api::SelectMealRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    if !dishwatch_types::models::meals().contains(&req.meal.as_str()) {
        return Err(ApiError::UnknownSelection(req.meal));
    }

    let snapshot = state.sessions.with(claims.sub, |s| {
        if s.hall.is_none() {
            return None;
        }
        s.select_meal(req.meal);
        Some(s.snapshot())
    })?;

    snapshot.map(Json).ok_or(ApiError::SelectionMissing)
}
