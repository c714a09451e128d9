use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Parameters for one rate-limit tier.
#[derive(Debug, Clone, Copy)]
pub struct TierPolicy {
    pub name: &'static str,
    pub max_requests: u32,
    pub window: Duration,
}

/// Outcome of a tier check, carrying everything needed for the standard
/// `RateLimit-*` response headers.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

impl Decision {
    pub fn retry_after_secs(&self) -> u64 {
        // Round up so "retry after 0s" never appears while still limited
        self.reset_after.as_secs().max(1)
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
    rejected: u32,
}

/// Fixed-window rate limiter, one instance per tier, keyed by client address.
///
/// Windows are anchored at the first request observed for a key: the window
/// runs for `policy.window` from that request, then the counter resets
/// atomically on the next check. The counter increments before the
/// allow/deny decision; denials are tallied separately (`rejected`) and do
/// not extend the window.
pub struct FixedWindowLimiter {
    policy: TierPolicy,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(policy: TierPolicy) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> TierPolicy {
        self.policy
    }

    pub fn check(&self, client: IpAddr) -> Decision {
        self.check_at(client, Instant::now())
    }

    pub(crate) fn check_at(&self, client: IpAddr, now: Instant) -> Decision {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let window = windows.entry(client).or_insert(Window {
            started: now,
            count: 0,
            rejected: 0,
        });

        if now.duration_since(window.started) >= self.policy.window {
            window.started = now;
            window.count = 0;
            window.rejected = 0;
        }

        window.count += 1;

        let elapsed = now.duration_since(window.started);
        let reset_after = self.policy.window.saturating_sub(elapsed);
        let allowed = window.count <= self.policy.max_requests;

        if !allowed {
            window.rejected += 1;
            tracing::warn!(
                tier = self.policy.name,
                client = %client,
                rejected_in_window = window.rejected,
                "rate limit exceeded"
            );
        }

        Decision {
            allowed,
            limit: self.policy.max_requests,
            remaining: self.policy.max_requests.saturating_sub(window.count),
            reset_after,
        }
    }
}
