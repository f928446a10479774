//! Redirect cycle protection
//!
//! Tracks how many consecutive redirects a single client has been served
//! via a counter carried in a cookie. Once the counter passes the configured
//! threshold the guard denies further redirects and resets the counter, so
//! a misconfigured rule loop degrades into serving the page instead of
//! bouncing the browser forever.

use crate::config::CycleProtectionConfig;

/// Name of the cookie that carries the cycle counter
pub const CYCLE_COOKIE: &str = "reroute-cycle";

/// Client-side cycle counter state
///
/// The caller owns the transport: it parses the inbound cookie value into a
/// `CycleState` and writes the value back out after the guard has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleState {
    count: u32,
}

impl CycleState {
    /// Starts a fresh counter for a client without the cookie
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a cookie value; tampered or garbage values restart at zero
    pub fn from_cookie_value(value: &str) -> Self {
        Self {
            count: value.trim().parse().unwrap_or(0),
        }
    }

    /// Serializes the counter for the outbound cookie
    pub fn to_cookie_value(&self) -> String {
        self.count.to_string()
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Whether the guard lets a redirect through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Denied,
}

/// Admits or denies redirects based on the client's cycle counter
#[derive(Debug, Clone)]
pub struct CycleGuard {
    enabled: bool,
    threshold: u32,
}

impl CycleGuard {
    pub fn new(config: &CycleProtectionConfig) -> Self {
        Self {
            enabled: config.enabled,
            threshold: config.max_attempts,
        }
    }

    /// Decides whether the next redirect may be served
    ///
    /// Admission increments the counter; denial resets it, so the client
    /// gets a full allowance again after the page it was left on.
    pub fn admit(&self, state: &mut CycleState) -> Admission {
        if !self.enabled {
            return Admission::Admitted;
        }

        if state.count >= self.threshold {
            state.count = 0;
            return Admission::Denied;
        }

        state.count += 1;
        Admission::Admitted
    }

    /// Clears the counter after a request that was served without a redirect
    pub fn reset(&self, state: &mut CycleState) {
        if self.enabled {
            state.count = 0;
        }
    }
}
