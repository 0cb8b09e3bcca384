use std::time::{Duration, Instant};

/// Credentials plus the cached authentication token.
///
/// The token is acquired lazily and dropped on explicit invalidation (the
/// discovery retry path) or when its reported lifetime runs out. The
/// legacy API reports no lifetime, so its sessions only die through
/// invalidation.
pub(crate) struct Session {
    pub username: String,
    pub password: String,
    pub app_id: String,
    token: Option<AuthToken>,
}

pub(crate) struct AuthToken {
    pub value: String,
    pub user_id: String,
    acquired_at: Instant,
    ttl: Option<Duration>,
}

impl AuthToken {
    fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.acquired_at.elapsed() >= ttl,
            None => false,
        }
    }
}

impl Session {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            app_id: app_id.into(),
            token: None,
        }
    }

    /// The cached token, unless it is absent or past its lifetime.
    pub fn valid_token(&self) -> Option<&AuthToken> {
        self.token.as_ref().filter(|t| !t.is_expired())
    }

    pub fn store(&mut self, value: String, user_id: String, ttl: Option<Duration>) {
        self.token = Some(AuthToken {
            value,
            user_id,
            acquired_at: Instant::now(),
            ttl,
        });
    }

    pub fn invalidate(&mut self) {
        self.token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_without_ttl_never_expires() {
        let mut session = Session::new("user", "pass", "app");
        assert!(session.valid_token().is_none());
        session.store("tok".into(), "42".into(), None);
        assert_eq!(session.valid_token().unwrap().value, "tok");
    }

    #[test]
    fn zero_ttl_token_is_expired() {
        let mut session = Session::new("user", "pass", "app");
        session.store("tok".into(), "42".into(), Some(Duration::ZERO));
        assert!(session.valid_token().is_none());
    }

    #[test]
    fn invalidate_drops_token() {
        let mut session = Session::new("user", "pass", "app");
        session.store("tok".into(), "42".into(), None);
        session.invalidate();
        assert!(session.valid_token().is_none());
    }
}
