//! Compliance Gate - search-before-write enforcement
//!
//! Each session holds a one-shot token: a search issues it, the next write
//! (or an explicit compliance assertion) consumes it. Writes attempted while
//! the token is invalid fail with `ComplianceGateClosed`, which keeps agents
//! from creating duplicate or conflicting knowledge blindly.
//!
//! State machine per session:
//! `UNVERIFIED --search--> VERIFIED --write_or_assert--> UNVERIFIED`
//!
//! The state is process-local and never persisted; every client process has
//! its own gate.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Key used when the caller did not supply a session id
const DEFAULT_SESSION: &str = "default";

/// Per-session gate state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGate {
    /// When the last search in this session ran
    pub last_search_timestamp: Option<DateTime<Utc>>,
    /// Result count of the last search
    pub last_search_count: usize,
    /// Whether an unconsumed search token exists
    pub search_token_valid: bool,
}

/// Stamp minted by an explicit compliance assertion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceStamp {
    /// Session the stamp covers
    pub session_id: String,
    /// Timestamp of the search that opened the gate
    pub last_search_timestamp: DateTime<Utc>,
    /// Result count observed by that search
    pub last_search_count: usize,
    /// When the stamp was minted (and the token consumed)
    pub issued_at: DateTime<Utc>,
}

/// Process-local search-before-write gate
pub struct ComplianceGate {
    enforce: bool,
    sessions: Mutex<HashMap<String, SessionGate>>,
}

impl ComplianceGate {
    pub fn new(enforce: bool) -> Self {
        Self {
            enforce,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn key(session_id: Option<&str>) -> String {
        session_id.unwrap_or(DEFAULT_SESSION).to_string()
    }

    /// Record a completed search: the gate for this session opens
    pub fn record_search(&self, session_id: Option<&str>, result_count: usize) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let gate = sessions.entry(Self::key(session_id)).or_default();
        gate.last_search_timestamp = Some(Utc::now());
        gate.last_search_count = result_count;
        gate.search_token_valid = true;
    }

    /// Check that a write may proceed without consuming the token. Used at
    /// the top of a write so a failure later in the transaction leaves the
    /// token intact for a retry.
    pub fn require_open(&self, session_id: Option<&str>) -> Result<()> {
        if !self.enforce {
            return Ok(());
        }
        let key = Self::key(session_id);
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let open = sessions.get(&key).map(|g| g.search_token_valid).unwrap_or(false);
        if open {
            Ok(())
        } else {
            Err(CoreError::ComplianceGateClosed(key))
        }
    }

    /// Consume the token for a write. Fails with `ComplianceGateClosed` when
    /// no valid token exists and enforcement is on. The token is per write:
    /// each write needs its own preceding search.
    pub fn consume_for_write(&self, session_id: Option<&str>) -> Result<()> {
        if !self.enforce {
            return Ok(());
        }
        let key = Self::key(session_id);
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let gate = sessions.entry(key.clone()).or_default();
        if !gate.search_token_valid {
            return Err(CoreError::ComplianceGateClosed(key));
        }
        gate.search_token_valid = false;
        Ok(())
    }

    /// Mint a textual stamp: same gate semantics as a write, and consumes
    /// the token.
    pub fn assert_compliance(&self, session_id: Option<&str>) -> Result<ComplianceStamp> {
        let key = Self::key(session_id);
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let gate = sessions.entry(key.clone()).or_default();
        if !gate.search_token_valid {
            return Err(CoreError::ComplianceGateClosed(key));
        }
        gate.search_token_valid = false;
        Ok(ComplianceStamp {
            session_id: key,
            last_search_timestamp: gate.last_search_timestamp.unwrap_or_else(Utc::now),
            last_search_count: gate.last_search_count,
            issued_at: Utc::now(),
        })
    }

    /// Snapshot of a session's gate state
    pub fn state(&self, session_id: Option<&str>) -> SessionGate {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(&Self::key(session_id)).cloned().unwrap_or_default()
    }
}

// ============================================================================
// TESTS
// ============================================================================
