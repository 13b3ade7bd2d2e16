//! Time-bucketed HMAC nonces.
//!
//! A nonce binds an action name to an authenticated subject for a limited
//! time. The lifetime is split into two ticks; a nonce minted during tick
//! `n` verifies during ticks `n` and `n + 1`, so its effective validity is
//! between half and one full lifetime.

use crate::crypto::{hmac_sha256_hex, verify_hmac_sha256_hex};

/// Number of hex characters kept from the HMAC tag.
const NONCE_LENGTH: usize = 20;

/// Which tick a verified nonce belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceAge {
    /// Minted during the current tick.
    Current,
    /// Minted during the previous tick.
    Previous,
}

/// Issues and verifies nonces for a single secret.
#[derive(Clone)]
pub struct NonceIssuer {
    secret: Vec<u8>,
    lifetime_secs: i64,
}

impl std::fmt::Debug for NonceIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceIssuer")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl NonceIssuer {
    /// Creates an issuer. Lifetimes below two seconds are raised to two.
    pub fn new(secret: impl Into<Vec<u8>>, lifetime_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            lifetime_secs: lifetime_secs.max(2),
        }
    }

    fn tick(&self, now_unix: i64) -> i64 {
        let half = self.lifetime_secs / 2;
        (now_unix + half - 1).div_euclid(half)
    }

    fn token(&self, action: &str, subject: &str, tick: i64) -> String {
        let message = format!("{}|{}|{}", action, subject, tick);
        let mut tag = hmac_sha256_hex(&self.secret, &message);
        tag.truncate(NONCE_LENGTH);
        tag
    }

    /// Mints a nonce for `action` on behalf of `subject`.
    pub fn create(&self, action: &str, subject: &str, now_unix: i64) -> String {
        self.token(action, subject, self.tick(now_unix))
    }

    /// Verifies a nonce, returning the tick it was minted in.
    pub fn verify(
        &self,
        nonce: &str,
        action: &str,
        subject: &str,
        now_unix: i64,
    ) -> Option<NonceAge> {
        if nonce.len() != NONCE_LENGTH {
            return None;
        }

        let tick = self.tick(now_unix);
        if self.matches(nonce, action, subject, tick) {
            return Some(NonceAge::Current);
        }
        if self.matches(nonce, action, subject, tick - 1) {
            return Some(NonceAge::Previous);
        }
        None
    }

    fn matches(&self, nonce: &str, action: &str, subject: &str, tick: i64) -> bool {
        let expected = self.token(action, subject, tick);
        // Compare through the HMAC primitive so the check stays constant time.
        verify_hmac_sha256_hex(
            &self.secret,
            &expected,
            &hmac_sha256_hex(&self.secret, nonce),
        )
    }
}
