//! Session-scoped state.
//!
//! Everything a drill-down needs (the workbook reader, the naming state,
//! and the materialized tree) lives behind one per-session mutex, which is
//! what serializes concurrent UI requests against a single stateful workbook
//! handle. Sessions themselves sit in a store-level `RwLock` map, so work in
//! different sessions runs fully in parallel.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::Serializer;

use cellscope_io::WorkbookReader;

use crate::error::{EngineError, EngineResult};
use crate::naming::NamingState;
use crate::tree::DependencyTree;

/// Opaque session handle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(SessionId)
    }
}

impl serde::Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Clone, Debug)]
pub struct SessionMeta {
    pub id: SessionId,
    pub opened_at: DateTime<Utc>,
}

pub(crate) struct SessionInner<B> {
    pub reader: B,
    /// Sheet names cached at open; the workbook does not change underneath a
    /// session.
    pub sheets: Vec<String>,
    pub naming: NamingState,
    pub tree: DependencyTree,
}

pub struct Session<B> {
    pub meta: SessionMeta,
    pub(crate) inner: Mutex<SessionInner<B>>,
}

/// All live sessions, keyed by id.
pub struct SessionStore<B> {
    sessions: RwLock<FxHashMap<SessionId, Arc<Session<B>>>>,
    counter: AtomicU64,
    salt: u64,
}

impl<B: WorkbookReader> SessionStore<B> {
    pub fn new() -> Self {
        let salt = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9e3779b97f4a7c15);
        SessionStore {
            sessions: RwLock::new(FxHashMap::default()),
            counter: AtomicU64::new(1),
            salt,
        }
    }

    /// Register an opened reader as a new session. Reads and caches the sheet
    /// list up front; a workbook that cannot even list its sheets is
    /// unreadable.
    pub fn open(&self, mut reader: B) -> EngineResult<SessionId> {
        let sheets = reader
            .sheet_names()
            .map_err(|e| EngineError::WorkbookUnreadable(e.to_string()))?;
        let id = self.next_id();
        let session = Session {
            meta: SessionMeta {
                id,
                opened_at: Utc::now(),
            },
            inner: Mutex::new(SessionInner {
                reader,
                sheets,
                naming: NamingState::default(),
                tree: DependencyTree::default(),
            }),
        };
        self.sessions.write().insert(id, Arc::new(session));
        Ok(id)
    }

    pub fn get(&self, id: SessionId) -> EngineResult<Arc<Session<B>>> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or(EngineError::SessionNotFound)
    }

    /// Teardown: drops the workbook handle, naming state, and tree.
    pub fn close(&self, id: SessionId) -> EngineResult<()> {
        self.sessions
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::SessionNotFound)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    fn next_id(&self) -> SessionId {
        // Counter for uniqueness, salted so ids from different processes do
        // not collide in logs.
        const FNV_PRIME: u64 = 0x100000001b3;
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        SessionId((self.salt ^ n).wrapping_mul(FNV_PRIME))
    }
}

impl<B: WorkbookReader> Default for SessionStore<B> {
    fn default() -> Self {
        Self::new()
    }
}
