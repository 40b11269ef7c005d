//! Lifecycle Module
//!
//! Process-wide networking subsystem shared by every socket handle.
//!
//! Each live handle holds a [`SubsystemGuard`]. The first guard taken runs the
//! platform start-up and the last one dropped reverses it. On Unix the start-up
//! ignores `SIGPIPE`, so a write to a peer that has gone away reports an error
//! instead of terminating the process. Winsock is started by socket2 on the
//! first socket it creates, so there is nothing to do on Windows.

use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Process-wide networking subsystem state
pub struct NetSubsystem {
    state: Mutex<SubsystemState>,
}

struct SubsystemState {
    users: usize,
    platform: Option<platform::Saved>,
}

static GLOBAL: NetSubsystem = NetSubsystem::new();

impl NetSubsystem {
    /// Create an unused subsystem. Handles use [`NetSubsystem::global`].
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(SubsystemState {
                users: 0,
                platform: None,
            }),
        }
    }

    /// The subsystem used by socket handles
    pub fn global() -> &'static NetSubsystem {
        &GLOBAL
    }

    /// Register one user, starting the platform layer on the first
    pub fn startup(&'static self) -> SubsystemGuard {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.users == 0 && state.platform.is_none() {
            debug!("starting network subsystem");
            state.platform = Some(platform::init());
        }
        state.users += 1;
        SubsystemGuard { subsystem: self }
    }

    /// Number of live users
    pub fn users(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .users
    }

    fn shutdown(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.users = state.users.saturating_sub(1);
        if state.users == 0 {
            if let Some(saved) = state.platform.take() {
                debug!("stopping network subsystem");
                platform::teardown(saved);
            }
        }
    }
}

impl Default for NetSubsystem {
    fn default() -> Self {
        Self::new()
    }
}

/// One registered user of the subsystem; dropping it unregisters
pub struct SubsystemGuard {
    subsystem: &'static NetSubsystem,
}

impl Drop for SubsystemGuard {
    fn drop(&mut self) {
        self.subsystem.shutdown();
    }
}

impl std::fmt::Debug for SubsystemGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsystemGuard").finish_non_exhaustive()
    }
}

#[cfg(unix)]
mod platform {
    /// SIGPIPE disposition in effect before start-up
    pub(super) struct Saved(libc::sighandler_t);

    pub(super) fn init() -> Saved {
        // SAFETY: SIG_IGN is a valid disposition and no handler code runs.
        let previous = unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            Saved(libc::SIG_DFL)
        } else {
            Saved(previous)
        }
    }

    pub(super) fn teardown(saved: Saved) {
        // SAFETY: restores the disposition returned by signal() in init().
        unsafe {
            libc::signal(libc::SIGPIPE, saved.0);
        }
    }
}

#[cfg(not(unix))]
mod platform {
    pub(super) struct Saved;

    pub(super) fn init() -> Saved {
        Saved
    }

    pub(super) fn teardown(_saved: Saved) {}
}
