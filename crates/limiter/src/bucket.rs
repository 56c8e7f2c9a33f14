//! Bucket definitions and the token-bucket arithmetic shared by both
//! backends.

use common::UserId;

/// The rate-limited operations and their declared limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Order creation: 5 per minute.
    CreateOrder,
    /// Single-order read: 10 per minute.
    GetOrder,
    /// Status update: 5 per minute.
    UpdateOrder,
    /// List-by-user: 10 per minute.
    ListOrders,
}

impl Bucket {
    /// Stable name used in counter keys.
    pub fn name(&self) -> &'static str {
        match self {
            Bucket::CreateOrder => "create_order",
            Bucket::GetOrder => "get_order",
            Bucket::UpdateOrder => "update_order",
            Bucket::ListOrders => "list_orders",
        }
    }

    /// Bucket capacity; also the refill amount per minute.
    pub fn capacity(&self) -> u32 {
        match self {
            Bucket::CreateOrder | Bucket::UpdateOrder => 5,
            Bucket::GetOrder | Bucket::ListOrders => 10,
        }
    }

    /// Refill rate in tokens per millisecond.
    pub fn refill_per_ms(&self) -> f64 {
        f64::from(self.capacity()) / 60_000.0
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The identity a bucket is keyed on: the authenticated user when
/// available, otherwise the normalized client address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateKey {
    User(UserId),
    Addr(String),
}

impl RateKey {
    /// Builds an anonymous key from a client address, stripping any
    /// port suffix so one host maps to one key.
    pub fn from_addr(addr: &str) -> Self {
        let host = if let Some(rest) = addr.strip_prefix('[') {
            // Bracketed IPv6, with or without a port.
            rest.split_once(']').map_or(addr, |(host, _)| host)
        } else if let Some((host, port)) = addr.rsplit_once(':') {
            // Bare IPv6 addresses keep their colons.
            if !host.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) {
                host
            } else {
                addr
            }
        } else {
            addr
        };
        Self::Addr(host.to_ascii_lowercase())
    }
}

impl std::fmt::Display for RateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateKey::User(id) => write!(f, "user_{id}"),
            RateKey::Addr(addr) => write!(f, "anon_{addr}"),
        }
    }
}

/// Persisted bucket state: remaining tokens and the last refill time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    pub tokens: f64,
    pub updated_ms: u64,
}

/// One atomic check-and-decrement step.
///
/// Refills from elapsed time (capped at capacity), then takes one
/// token if available. Returns the new state and whether the request
/// is allowed. Both backends run exactly this arithmetic; the Redis
/// backend runs it inside a script so it stays a single atomic op.
pub fn take_token(
    state: Option<BucketState>,
    capacity: u32,
    refill_per_ms: f64,
    now_ms: u64,
) -> (BucketState, bool) {
    let capacity = f64::from(capacity);
    let (mut tokens, updated_ms) = match state {
        Some(s) => (s.tokens, s.updated_ms),
        None => (capacity, now_ms),
    };

    let elapsed = now_ms.saturating_sub(updated_ms) as f64;
    tokens = (tokens + elapsed * refill_per_ms).min(capacity);

    let allowed = tokens >= 1.0;
    if allowed {
        tokens -= 1.0;
    }

    (
        BucketState {
            tokens,
            updated_ms: now_ms,
        },
        allowed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_bucket_starts_full() {
        let (state, allowed) = take_token(None, 5, Bucket::CreateOrder.refill_per_ms(), 0);
        assert!(allowed);
        assert_eq!(state.tokens, 4.0);
    }

    #[test]
    fn sixth_take_in_the_same_instant_is_denied() {
        let rate = Bucket::CreateOrder.refill_per_ms();
        let mut state = None;
        for _ in 0..5 {
            let (next, allowed) = take_token(state, 5, rate, 1_000);
            assert!(allowed);
            state = Some(next);
        }
        let (_, allowed) = take_token(state, 5, rate, 1_000);
        assert!(!allowed);
    }

    #[test]
    fn tokens_refill_after_the_window() {
        let rate = Bucket::CreateOrder.refill_per_ms();
        let mut state = None;
        for _ in 0..5 {
            let (next, _) = take_token(state, 5, rate, 0);
            state = Some(next);
        }
        let (_, allowed) = take_token(state, 5, rate, 0);
        assert!(!allowed);

        // A full minute later the bucket is full again.
        let (refilled, allowed) = take_token(state, 5, rate, 60_000);
        assert!(allowed);
        assert_eq!(refilled.tokens, 4.0);
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let rate = Bucket::GetOrder.refill_per_ms();
        let (state, _) = take_token(None, 10, rate, 0);
        let (state, _) = take_token(Some(state), 10, rate, 3_600_000);
        assert!(state.tokens <= 10.0);
    }

    #[test]
    fn bucket_limits_match_the_declared_rates() {
        assert_eq!(Bucket::CreateOrder.capacity(), 5);
        assert_eq!(Bucket::GetOrder.capacity(), 10);
        assert_eq!(Bucket::UpdateOrder.capacity(), 5);
        assert_eq!(Bucket::ListOrders.capacity(), 10);
    }

    #[test]
    fn rate_key_display() {
        assert_eq!(RateKey::User(UserId::new(7)).to_string(), "user_7");
        assert_eq!(RateKey::from_addr("10.0.0.1:58342").to_string(), "anon_10.0.0.1");
    }

    #[test]
    fn addr_normalization_strips_port_and_case() {
        assert_eq!(RateKey::from_addr("HOST.Example:80"), RateKey::Addr("host.example".into()));
        assert_eq!(RateKey::from_addr("10.0.0.1"), RateKey::Addr("10.0.0.1".into()));
        assert_eq!(RateKey::from_addr("[::1]:8080"), RateKey::Addr("::1".into()));
    }
}
