//! In-memory abuse protection: failed-login lockout and registration throttle.
//!
//! Flow overview:
//! 1) Track failed logins per (client IP, email); 5 failures inside a
//!    15-minute window lock the pair out until the window elapses.
//! 2) Track registrations per client IP; at most 3 inside a trailing 24 hours.
//! 3) Registration entries are pruned lazily on a small random fraction of
//!    calls instead of by a background sweeper.
//!
//! Both tables are process-local. Every read-modify-write happens under the
//! table lock, so concurrent requests never lose an increment. Scaling past
//! one instance requires moving these counters to a shared store.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;

pub const LOCKOUT_THRESHOLD: u32 = 5;
pub const LOCKOUT_WINDOW_SECONDS: i64 = 15 * 60;
pub const REGISTRATION_LIMIT: usize = 3;
pub const REGISTRATION_WINDOW_SECONDS: i64 = 24 * 60 * 60;
const PRUNE_PROBABILITY: f64 = 0.02;

#[derive(Debug, Clone, Copy)]
struct FailedAttempts {
    count: u32,
    last_attempt: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginGate {
    Allowed,
    Locked { retry_after_seconds: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationGate {
    Allowed,
    Limited { retry_after_seconds: u64 },
}

#[derive(Debug, Default)]
pub struct AbuseGuard {
    failed_logins: Mutex<HashMap<(String, String), FailedAttempts>>,
    registrations: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl AbuseGuard {
    /// Gate a login attempt. Read-only: a locked-out caller neither
    /// increments the counter nor refreshes the window, so the lock expires
    /// on its own schedule.
    pub fn check_login(&self, ip: &str, email: &str) -> LoginGate {
        self.check_login_at(ip, email, Utc::now())
    }

    pub(crate) fn check_login_at(&self, ip: &str, email: &str, now: DateTime<Utc>) -> LoginGate {
        let window = Duration::seconds(LOCKOUT_WINDOW_SECONDS);
        let mut table = lock(&self.failed_logins);
        let key = (ip.to_string(), email.to_string());

        match table.get(&key) {
            Some(entry) if entry.count >= LOCKOUT_THRESHOLD => {
                let elapsed = now - entry.last_attempt;
                if elapsed < window {
                    LoginGate::Locked {
                        retry_after_seconds: remaining_seconds(window - elapsed),
                    }
                } else {
                    // Window elapsed with no further failures: evaluate fresh.
                    table.remove(&key);
                    LoginGate::Allowed
                }
            }
            _ => LoginGate::Allowed,
        }
    }

    /// Record a failed login. The window is anchored to the time since the
    /// last attempt: a failure after a quiet window restarts the count at 1.
    pub fn record_login_failure(&self, ip: &str, email: &str) {
        self.record_login_failure_at(ip, email, Utc::now());
    }

    pub(crate) fn record_login_failure_at(&self, ip: &str, email: &str, now: DateTime<Utc>) {
        let window = Duration::seconds(LOCKOUT_WINDOW_SECONDS);
        let mut table = lock(&self.failed_logins);
        table
            .entry((ip.to_string(), email.to_string()))
            .and_modify(|entry| {
                if now - entry.last_attempt >= window {
                    entry.count = 1;
                } else {
                    entry.count += 1;
                }
                entry.last_attempt = now;
            })
            .or_insert(FailedAttempts {
                count: 1,
                last_attempt: now,
            });
    }

    /// Successful login wipes the counter for this (IP, email) pair.
    pub fn clear_login_failures(&self, ip: &str, email: &str) {
        let mut table = lock(&self.failed_logins);
        table.remove(&(ip.to_string(), email.to_string()));
    }

    /// Gate a registration attempt against the trailing 24-hour window.
    pub fn check_registration(&self, ip: &str) -> RegistrationGate {
        self.check_registration_at(ip, Utc::now())
    }

    pub(crate) fn check_registration_at(&self, ip: &str, now: DateTime<Utc>) -> RegistrationGate {
        let window = Duration::seconds(REGISTRATION_WINDOW_SECONDS);
        let cutoff = now - window;
        let table = lock(&self.registrations);

        let Some(attempts) = table.get(ip) else {
            return RegistrationGate::Allowed;
        };

        let recent: Vec<&DateTime<Utc>> =
            attempts.iter().filter(|stamp| **stamp > cutoff).collect();
        if recent.len() < REGISTRATION_LIMIT {
            return RegistrationGate::Allowed;
        }

        // Allowed again once the oldest in-window attempt falls out.
        let oldest = recent.iter().copied().min().copied().unwrap_or(now);
        RegistrationGate::Limited {
            retry_after_seconds: remaining_seconds(oldest + window - now),
        }
    }

    /// Record a successful registration attempt.
    pub fn record_registration(&self, ip: &str) {
        let now = Utc::now();
        self.record_registration_at(ip, now);
        // Lazy cleanup bounds memory without a dedicated sweeper.
        if rand::thread_rng().gen_bool(PRUNE_PROBABILITY) {
            self.prune_registrations_at(now);
        }
    }

    pub(crate) fn record_registration_at(&self, ip: &str, now: DateTime<Utc>) {
        let mut table = lock(&self.registrations);
        table.entry(ip.to_string()).or_default().push(now);
    }

    /// Drop timestamps older than the window and IP entries left empty.
    pub(crate) fn prune_registrations_at(&self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(REGISTRATION_WINDOW_SECONDS);
        let mut table = lock(&self.registrations);
        table.retain(|_, attempts| {
            attempts.retain(|stamp| *stamp > cutoff);
            !attempts.is_empty()
        });
    }

    #[cfg(test)]
    pub(crate) fn login_failure_count(&self, ip: &str, email: &str) -> u32 {
        lock(&self.failed_logins)
            .get(&(ip.to_string(), email.to_string()))
            .map_or(0, |entry| entry.count)
    }

    #[cfg(test)]
    pub(crate) fn registration_ip_count(&self) -> usize {
        lock(&self.registrations).len()
    }
}

fn remaining_seconds(remaining: Duration) -> u64 {
    u64::try_from(remaining.num_seconds()).unwrap_or(0).max(1)
}

// A poisoned table means another request panicked mid-update; the counters
// stay usable either way.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
