//! Out-of-band shutdown trigger.

use tokio_util::sync::CancellationToken;

/// Requests shutdown of a running host from outside the protocol channel.
///
/// Clones share one trigger. Requesting shutdown more than once has no
/// further effect.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Creates an untriggered handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown.
    pub fn request(&self) {
        self.token.cancel();
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when shutdown is requested.
    pub async fn requested(&self) {
        self.token.cancelled().await;
    }
}
