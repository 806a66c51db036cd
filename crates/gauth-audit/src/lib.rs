// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit trail for credential lifecycle events.
//!
//! Every mutation of the credential store (acquire, refresh, rotation,
//! revocation, deletion) records an [`AuditEntry`] through an injected
//! [`AuditSink`]. The production sink appends JSON-lines to a file and
//! fsyncs before the triggering operation reports success; entries are
//! never mutated or deleted. Tests use [`MemoryAuditLog`] to assert on
//! recorded events without filesystem side effects.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use gauth_core::{GauthError, SessionId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Credential lifecycle events recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    /// Initial OAuth exchange succeeded and a token pair was persisted.
    TokenAcquired,
    /// A refresh call succeeded and the new token pair was persisted.
    TokenRefreshed,
    /// A key rotation completed and was verified.
    KeyRotated,
    /// A key rotation failed and was rolled back.
    RotationFailed,
    /// The grant was revoked, either upstream or by the operator.
    TokenRevoked,
    /// Stored credentials were deleted.
    TokenDeleted,
}

/// One audit log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    /// Event-specific context. Never contains token material.
    pub metadata: serde_json::Value,
    pub session_id: String,
}

/// Destination for audit entries, injected into every component that
/// mutates credentials.
pub trait AuditSink: Send + Sync {
    /// Record one event. Must be durable before returning `Ok`.
    fn record(&self, event: AuditEvent, metadata: serde_json::Value) -> Result<(), GauthError>;
}

/// Production sink: append-only JSON-lines file, one object per line.
pub struct JsonlAuditLog {
    path: PathBuf,
    session_id: SessionId,
    // Serializes appends within this process; cross-process appends rely
    // on O_APPEND line atomicity for lines under PIPE_BUF.
    write_lock: Mutex<()>,
}

impl JsonlAuditLog {
    /// Open (creating parent directories if needed) an audit log at `path`.
    ///
    /// A fresh session id is generated for this process; all entries it
    /// records carry it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GauthError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(GauthError::storage)?;
        }
        Ok(Self {
            path,
            session_id: SessionId(uuid::Uuid::new_v4().to_string()),
            write_lock: Mutex::new(()),
        })
    }

    /// The session id stamped on entries from this process.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, event: AuditEvent, metadata: serde_json::Value) -> Result<(), GauthError> {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            metadata,
            session_id: self.session_id.0.clone(),
        };
        let mut line = serde_json::to_string(&entry)
            .map_err(|e| GauthError::Audit(format!("failed to serialize audit entry: {e}")))?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| GauthError::Audit("audit log lock poisoned".to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(GauthError::storage)?;
        file.write_all(line.as_bytes()).map_err(GauthError::storage)?;
        // Durable before the triggering operation reports success.
        file.sync_data().map_err(GauthError::storage)?;

        debug!(event = ?event, "audit entry recorded");
        Ok(())
    }
}

/// In-memory sink for deterministic tests.
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
    session_id: String,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            session_id: "test-session".to_string(),
        }
    }

    /// Snapshot of all recorded entries, in order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit lock").clone()
    }

    /// Events only, in order, for compact assertions.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.entries().into_iter().map(|e| e.event).collect()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, event: AuditEvent, metadata: serde_json::Value) -> Result<(), GauthError> {
        self.entries
            .lock()
            .map_err(|_| GauthError::Audit("audit lock poisoned".to_string()))?
            .push(AuditEntry {
                timestamp: Utc::now(),
                event,
                metadata,
                session_id: self.session_id.clone(),
            });
        Ok(())
    }
}
