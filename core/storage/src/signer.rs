//! CDN URL signing and time source.

use chrono::{DateTime, Utc};

use stowage_common::Result;

/// Produces time-limited signed URLs for a CDN distribution.
///
/// The signature must cover `base_url` exactly as given; callers pass the
/// already-encoded URL the client will request.
pub trait CdnSigner: Send + Sync {
    /// Sign `base_url` so it stops being valid at unix time `expires_at`.
    fn signed_url(&self, base_url: &str, expires_at: i64) -> Result<String>;
}

/// Source of the current time for signed URL expiry.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
