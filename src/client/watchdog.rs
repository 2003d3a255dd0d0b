//! Background session watchdog.
//!
//! Once a minute the watchdog peeks at the token's expiry and either does
//! nothing, refreshes ahead of time, or expires the session outright. The
//! loop holds only a `Weak` handle, so dropping the last [`SessionClient`]
//! reference stops the timer on its next tick.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Arc, Weak};
use tokio::time::{interval, Duration};
use tracing::{debug, warn};

use super::{ClientError, SessionClient};
use crate::token::peek_claims;

pub const TICK_SECONDS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Token has plenty of life left.
    Idle,
    /// Inside the renewal threshold; refresh now.
    Refresh,
    /// Past expiry; the session is over.
    ForceLogout,
}

/// Decide what to do with a token expiring at `expires_at`.
#[must_use]
pub fn evaluate(
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    refresh_threshold: ChronoDuration,
) -> Decision {
    if now >= expires_at {
        Decision::ForceLogout
    } else if now >= expires_at - refresh_threshold {
        Decision::Refresh
    } else {
        Decision::Idle
    }
}

/// Spawn the watchdog loop for `session`.
pub fn spawn(session: &Arc<SessionClient>, refresh_threshold: ChronoDuration) {
    let weak: Weak<SessionClient> = Arc::downgrade(session);

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(TICK_SECONDS));
        loop {
            tick.tick().await;

            let Some(session) = weak.upgrade() else {
                debug!("session dropped, stopping watchdog");
                return;
            };

            let Some(token) = session.token() else {
                continue;
            };

            // The watchdog never holds the signing secret; the unverified
            // exp is only used for scheduling.
            let expires_at = peek_claims(&token)
                .ok()
                .and_then(|claims| DateTime::from_timestamp(claims.exp, 0));
            let Some(expires_at) = expires_at else {
                warn!("session token is unreadable, expiring session");
                session.expire();
                continue;
            };

            match evaluate(Utc::now(), expires_at, refresh_threshold) {
                Decision::Idle => {}
                Decision::Refresh => {
                    debug!("token inside renewal threshold, refreshing");
                    match session.refresh().await {
                        Ok(()) => {}
                        // The server refused the token; the session is done.
                        Err(err @ ClientError::Rejected { .. }) => {
                            warn!("token refresh rejected, signing out: {err}");
                            session.expire();
                        }
                        // Transient failure; try again on the next tick.
                        Err(err) => warn!("token refresh failed: {err}"),
                    }
                }
                Decision::ForceLogout => {
                    warn!("session token expired, signing out");
                    session.expire();
                }
            }
        }
    });
}
