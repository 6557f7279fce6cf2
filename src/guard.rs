//! Optional protection of the source database for the duration of a copy.
//!
//! A [`SourceGuard`] is either [`SourceGuard::Unguarded`], which never touches
//! the source, or [`SourceGuard::Locking`], which switches a read-write source
//! to read-only before the copy and switches it back afterwards. Protection is
//! scoped: [`SourceGuard::activate`] hands out a [`Protection`] that restores
//! the source when released or dropped.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::CopyError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    ReadWrite,
    ReadOnly,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::ReadWrite => "read-write",
            AccessMode::ReadOnly => "read-only",
        }
    }

    /// Accepts `read-write` / `read-only`, case-insensitive, with `-`, `_` or a space.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "read-write" => Some(AccessMode::ReadWrite),
            "read-only" => Some(AccessMode::ReadOnly),
            _ => None,
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational status of a database as reported by its host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatabaseStatus {
    Online,
    Offline,
    Other(String),
}

impl DatabaseStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "online" => DatabaseStatus::Online,
            "offline" => DatabaseStatus::Offline,
            other => DatabaseStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DatabaseStatus::Online => "online",
            DatabaseStatus::Offline => "offline",
            DatabaseStatus::Other(status) => status,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, DatabaseStatus::Online)
    }
}

impl fmt::Display for DatabaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub name: String,
    pub status: DatabaseStatus,
    pub access: AccessMode,
}

/// Administrative access to the host of the source database.
pub trait DatabaseAdmin {
    fn database_info(&self, name: &str) -> Result<DatabaseInfo, CopyError>;
    fn set_access_mode(&self, name: &str, mode: AccessMode) -> Result<(), CopyError>;
}

impl<A> DatabaseAdmin for &A
where
    A: DatabaseAdmin + ?Sized,
{
    fn database_info(&self, name: &str) -> Result<DatabaseInfo, CopyError> {
        (*self).database_info(name)
    }

    fn set_access_mode(&self, name: &str, mode: AccessMode) -> Result<(), CopyError> {
        (*self).set_access_mode(name, mode)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardPhase {
    Uninitialized,
    Inspected,
    Protected,
    AlreadyProtected,
    Restored,
}

/// What the guard observed when it was activated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectionState {
    pub database_name: String,
    pub current_status: DatabaseStatus,
    pub current_access: AccessMode,
    pub was_mutated_by_guard: bool,
}

struct GuardInner {
    phase: GuardPhase,
    state: Option<ProtectionState>,
}

/// Puts a read-write source into read-only mode and restores it afterwards.
pub struct LockingGuard<A> {
    admin: A,
    database: String,
    inner: Mutex<GuardInner>,
}

impl<A: DatabaseAdmin> LockingGuard<A> {
    pub fn new<S: Into<String>>(admin: A, database: S) -> Self {
        Self {
            admin,
            database: database.into(),
            inner: Mutex::new(GuardInner {
                phase: GuardPhase::Uninitialized,
                state: None,
            }),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn phase(&self) -> GuardPhase {
        self.inner.lock().phase
    }

    pub fn state(&self) -> Option<ProtectionState> {
        self.inner.lock().state.clone()
    }

    pub fn activate(&self) -> Result<(), CopyError> {
        let mut inner = self.inner.lock();
        if inner.phase != GuardPhase::Uninitialized {
            return Err(CopyError::guard_conflict(
                &self.database,
                format!("guard already activated ({:?})", inner.phase),
            ));
        }
        let info = self.admin.database_info(&self.database)?;
        inner.phase = GuardPhase::Inspected;
        if !info.status.is_online() {
            return Err(CopyError::SourceUnavailable {
                database: self.database.clone(),
                status: info.status.to_string(),
            });
        }
        let mut state = ProtectionState {
            database_name: self.database.clone(),
            current_status: info.status,
            current_access: info.access,
            was_mutated_by_guard: false,
        };
        match info.access {
            AccessMode::ReadWrite => {
                info!(
                    database = %self.database,
                    access = %AccessMode::ReadOnly,
                    "guard.access.change"
                );
                self.admin
                    .set_access_mode(&self.database, AccessMode::ReadOnly)?;
                state.was_mutated_by_guard = true;
                inner.phase = GuardPhase::Protected;
            }
            AccessMode::ReadOnly => {
                info!(database = %self.database, "guard.access.already_read_only");
                inner.phase = GuardPhase::AlreadyProtected;
            }
        }
        inner.state = Some(state);
        Ok(())
    }

    /// Restores read-write access if, and only if, `activate` removed it.
    /// Calling it again afterwards does nothing.
    pub fn deactivate(&self) -> Result<(), CopyError> {
        let mut inner = self.inner.lock();
        match inner.phase {
            GuardPhase::Protected => {
                info!(
                    database = %self.database,
                    access = %AccessMode::ReadWrite,
                    "guard.access.change"
                );
                self.admin
                    .set_access_mode(&self.database, AccessMode::ReadWrite)?;
                inner.phase = GuardPhase::Restored;
            }
            GuardPhase::AlreadyProtected => inner.phase = GuardPhase::Restored,
            GuardPhase::Uninitialized | GuardPhase::Inspected | GuardPhase::Restored => {}
        }
        Ok(())
    }
}

/// Source protection policy, chosen once per copy.
pub enum SourceGuard<A> {
    Unguarded,
    Locking(LockingGuard<A>),
}

impl<A: DatabaseAdmin> SourceGuard<A> {
    pub fn locking<S: Into<String>>(admin: A, database: S) -> Self {
        SourceGuard::Locking(LockingGuard::new(admin, database))
    }

    pub fn phase(&self) -> Option<GuardPhase> {
        match self {
            SourceGuard::Unguarded => None,
            SourceGuard::Locking(guard) => Some(guard.phase()),
        }
    }

    /// Protects the source and returns the scope that restores it.
    pub fn activate(&self) -> Result<Protection<'_, A>, CopyError> {
        if let SourceGuard::Locking(guard) = self {
            guard.activate()?;
        }
        Ok(Protection {
            guard: self,
            released: false,
        })
    }

    pub fn deactivate(&self) -> Result<(), CopyError> {
        match self {
            SourceGuard::Unguarded => Ok(()),
            SourceGuard::Locking(guard) => guard.deactivate(),
        }
    }
}

/// Live protection of the source. Restores the source on [`Protection::release`]
/// or, failing that, when dropped.
#[must_use = "dropping the protection restores the source immediately"]
pub struct Protection<'a, A: DatabaseAdmin> {
    guard: &'a SourceGuard<A>,
    released: bool,
}

impl<A: DatabaseAdmin> Protection<'_, A> {
    pub fn release(mut self) -> Result<(), CopyError> {
        self.released = true;
        self.guard.deactivate()
    }
}

impl<A: DatabaseAdmin> Drop for Protection<'_, A> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.guard.deactivate() {
            warn!(error = %err, "guard.restore.failed");
        }
    }
}
