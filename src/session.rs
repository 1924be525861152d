//! Authenticated session lifecycle.
//!
//! A [`Session`] is created by a three step login handshake:
//!
//! 1. Exchange the account credentials for an access token
//! 2. Present the access token once, binding it to the cookie session
//! 3. Fetch user data through the gateway without a form token, which
//!    yields the form token and the license token
//!
//! # Concurrency
//!
//! The [`SessionManager`] serializes refreshes. When several callers find
//! the session missing or expired at the same time, exactly one of them
//! logs in while the others wait. The waiters then observe the outcome of
//! that login: the same new session, or a copy of the same failure.
//!
//! Sessions are shared as `Arc<Session>` and never mutated. Replacing the
//! current session swaps the pointer under the manager's lock.
//!
//! # Expiry
//!
//! Sessions expire [`SESSION_TTL`] after creation, or earlier when a call
//! that used them fails and [`SessionManager::invalidate`] is called.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::Mutex, time::Instant};
use veil::Redact;

use crate::{
    config::Credentials,
    error::{Error, Result},
    protocol::gateway::GetUserData,
    upstream::Upstream,
};

/// Maximum lifetime of a session.
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Credentials of one login.
#[derive(Redact)]
pub struct Session {
    #[redact]
    access_token: String,

    /// Form token for gateway calls.
    #[redact]
    api_token: String,

    #[redact]
    license_token: String,

    user_id: u64,

    created: Instant,
}

impl Session {
    #[must_use]
    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    #[must_use]
    pub fn license_token(&self) -> &str {
        &self.license_token
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.age() >= SESSION_TTL
    }
}

#[derive(Default)]
struct State {
    session: Option<Arc<Session>>,

    /// Number of completed login attempts.
    logins: u64,

    /// Failure of the latest login attempt, kept for waiters.
    last_failure: Option<Error>,
}

/// Owner of the current session.
pub struct SessionManager {
    upstream: Upstream,
    credentials: Credentials,
    state: Mutex<State>,

    /// Mirrors `State::logins` so it can be read before waiting for the
    /// lock.
    logins: AtomicU64,
}

impl SessionManager {
    #[must_use]
    pub fn new(upstream: Upstream, credentials: Credentials) -> Self {
        Self {
            upstream,
            credentials,
            state: Mutex::new(State::default()),
            logins: AtomicU64::new(0),
        }
    }

    /// Returns a valid session, logging in if there is none.
    ///
    /// The flag is `true` when this call performed the login, so the
    /// session cannot be stale.
    ///
    /// # Errors
    ///
    /// Returns the login failure. Callers that waited for another caller's
    /// login receive a copy of its failure instead of logging in again.
    pub async fn ensure_session(&self) -> Result<(Arc<Session>, bool)> {
        let observed = self.logins.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if let Some(session) = &state.session {
            if !session.is_expired() {
                return Ok((Arc::clone(session), false));
            }
            debug!("session expired after {}s", session.age().as_secs());
            state.session = None;
        }

        // A login finished while this caller was waiting: share its outcome.
        if state.logins != observed {
            if let Some(failure) = &state.last_failure {
                return Err(failure.replay());
            }
        }

        let outcome = self.login().await;

        state.logins += 1;
        self.logins.store(state.logins, Ordering::Release);

        match outcome {
            Ok(session) => {
                let session = Arc::new(session);
                state.session = Some(Arc::clone(&session));
                state.last_failure = None;
                Ok((session, true))
            }
            Err(e) => {
                state.last_failure = Some(e.replay());
                Err(e)
            }
        }
    }

    /// Discards `session` if it is still the current one.
    ///
    /// Sessions that were already replaced are left alone, so a late
    /// failure on an old session never evicts a newer one.
    pub async fn invalidate(&self, session: &Arc<Session>) {
        let mut state = self.state.lock().await;
        if state
            .session
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session))
        {
            debug!("invalidating session");
            state.session = None;
        }
    }

    async fn login(&self) -> Result<Session> {
        debug!("logging in as {}", self.credentials.email);

        let token = self.upstream.auth_token(&self.credentials).await?;
        self.upstream.probe(&token).await?;
        let user_data = self.upstream.call_gateway(&GetUserData {}, None).await?;

        if user_data.user.id == 0 {
            return Err(Error::unauthenticated("login was not accepted"));
        }

        info!("logged in as user id {}", user_data.user.id);

        Ok(Session {
            access_token: token.access_token,
            api_token: user_data.api_token,
            license_token: user_data.user.options.license_token,
            user_id: user_data.user.id,
            created: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            access_token: "access".to_owned(),
            api_token: "form".to_owned(),
            license_token: "license".to_owned(),
            user_id: 1,
            created: Instant::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expires_after_thirty_minutes() {
        let session = session();
        assert!(!session.is_expired());

        tokio::time::advance(SESSION_TTL - Duration::from_secs(1)).await;
        assert!(!session.is_expired());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(session.is_expired());
    }

    #[test]
    fn tokens_are_redacted() {
        let debug = format!("{:?}", session());
        assert!(!debug.contains("access\""));
        assert!(!debug.contains("form\""));
        assert!(!debug.contains("license\""));
    }
}
