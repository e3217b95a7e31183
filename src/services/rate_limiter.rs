//! Rate limiter for magic-link requests
//!
//! Protects the sign-in endpoint (and the mail quota behind it) by:
//! - Limiting link requests per email address (5 per 15 minutes)
//! - Limiting requests per IP address (10 per minute)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

const EMAIL_LIMIT: usize = 5;
const EMAIL_WINDOW_MINUTES: i64 = 15;
const IP_LIMIT: usize = 10;
const IP_WINDOW_MINUTES: i64 = 1;

type Hits<K> = HashMap<K, Vec<DateTime<Utc>>>;

/// Sliding-window request log keyed by `K`
struct Window<K> {
    limit: usize,
    span: Duration,
    hits: RwLock<Hits<K>>,
}

impl<K: Eq + Hash> Window<K> {
    fn new(limit: usize, span: Duration) -> Self {
        Self {
            limit,
            span,
            hits: RwLock::new(HashMap::new()),
        }
    }

    /// Seconds until `key` may be used again, if it is over the limit now
    fn retry_after(&self, hits: &Hits<K>, key: &K, now: DateTime<Utc>) -> Option<i64> {
        let times = hits.get(key)?;
        let cutoff = now - self.span;
        let recent: Vec<_> = times.iter().filter(|t| **t > cutoff).collect();
        if recent.len() < self.limit {
            return None;
        }
        let oldest = recent.into_iter().min()?;
        Some(((*oldest + self.span) - now).num_seconds().max(1))
    }

    fn record(&self, hits: &mut Hits<K>, key: K, now: DateTime<Utc>) {
        let cutoff = now - self.span;
        let times = hits.entry(key).or_default();
        times.retain(|t| *t > cutoff);
        times.push(now);
    }

    async fn clear(&self, key: &K) {
        self.hits.write().await.remove(key);
    }

    async fn cleanup(&self, now: DateTime<Utc>) {
        let cutoff = now - self.span;
        self.hits.write().await.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }
}

/// Magic-link request rate limiter
pub struct MagicLinkRateLimiter {
    by_email: Window<String>,
    by_ip: Window<IpAddr>,
}

impl MagicLinkRateLimiter {
    pub fn new() -> Self {
        Self {
            by_email: Window::new(EMAIL_LIMIT, Duration::minutes(EMAIL_WINDOW_MINUTES)),
            by_ip: Window::new(IP_LIMIT, Duration::minutes(IP_WINDOW_MINUTES)),
        }
    }

    /// Record a request, or return the seconds to wait when either the email
    /// or the IP address is over its limit. Rejected requests are not recorded.
    ///
    /// Both windows stay write-locked from check to record, IP first.
    pub async fn check(&self, email: &str, ip: Option<IpAddr>) -> Result<(), i64> {
        let now = Utc::now();
        let email = email.trim().to_lowercase();

        let mut ip_hits = self.by_ip.hits.write().await;
        let mut email_hits = self.by_email.hits.write().await;

        if let Some(ip) = ip {
            if let Some(wait) = self.by_ip.retry_after(&ip_hits, &ip, now) {
                tracing::warn!("Magic link requests from {} rate limited", ip);
                return Err(wait);
            }
        }
        if let Some(wait) = self.by_email.retry_after(&email_hits, &email, now) {
            tracing::warn!("Magic link requests for {} rate limited", email);
            return Err(wait);
        }

        if let Some(ip) = ip {
            self.by_ip.record(&mut ip_hits, ip, now);
        }
        self.by_email.record(&mut email_hits, email, now);
        Ok(())
    }

    /// Forget an email's requests (after a successful sign-in)
    pub async fn clear_email(&self, email: &str) {
        self.by_email.clear(&email.trim().to_lowercase()).await;
    }

    /// Drop entries outside their windows (called periodically)
    pub async fn cleanup(&self) {
        let now = Utc::now();
        self.by_email.cleanup(now).await;
        self.by_ip.cleanup(now).await;
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> (usize, usize) {
        (
            self.by_email.hits.read().await.len(),
            self.by_ip.hits.read().await.len(),
        )
    }
}

impl Default for MagicLinkRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_email_rate_limit() {
        let limiter = MagicLinkRateLimiter::new();

        for _ in 0..EMAIL_LIMIT {
            assert!(limiter.check("jane@4wdc.com.au", None).await.is_ok());
        }

        // Case and whitespace do not open a new bucket
        let wait = limiter.check(" JANE@4wdc.com.au", None).await.unwrap_err();
        assert!(wait > 0 && wait <= EMAIL_WINDOW_MINUTES * 60);

        // Other addresses are unaffected
        assert!(limiter.check("sam@4wdc.com.au", None).await.is_ok());

        limiter.clear_email("jane@4wdc.com.au").await;
        assert!(limiter.check("jane@4wdc.com.au", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_ip_rate_limit() {
        let limiter = MagicLinkRateLimiter::new();
        let ip = IpAddr::from_str("10.1.2.3").unwrap();

        for i in 0..IP_LIMIT {
            let email = format!("user{}@4wdc.com.au", i);
            assert!(limiter.check(&email, Some(ip)).await.is_ok());
        }

        let wait = limiter.check("another@4wdc.com.au", Some(ip)).await.unwrap_err();
        assert!(wait > 0 && wait <= 60);

        // A different IP is unaffected
        let other = IpAddr::from_str("10.1.2.4").unwrap();
        assert!(limiter.check("another@4wdc.com.au", Some(other)).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_recorded_for_email() {
        let limiter = MagicLinkRateLimiter::new();
        let ip = IpAddr::from_str("10.9.9.9").unwrap();

        for i in 0..IP_LIMIT {
            limiter.check(&format!("u{}@4wdc.com.au", i), Some(ip)).await.unwrap();
        }
        // Blocked by IP, so the email bucket stays untouched
        assert!(limiter.check("fresh@4wdc.com.au", Some(ip)).await.is_err());
        for _ in 0..EMAIL_LIMIT {
            assert!(limiter.check("fresh@4wdc.com.au", None).await.is_ok());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_cannot_overrun_limit() {
        let limiter = Arc::new(MagicLinkRateLimiter::new());
        let ip = IpAddr::from_str("10.4.4.4").unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check("burst@4wdc.com.au", Some(ip)).await })
            })
            .collect();
        let results = futures::future::join_all(handles).await;

        let allowed = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(()))))
            .count();
        assert_eq!(allowed, EMAIL_LIMIT);
        assert_eq!(limiter.tracked_keys().await, (1, 1));
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_entries() {
        let limiter = MagicLinkRateLimiter::new();
        let ip = IpAddr::from_str("192.168.1.1").unwrap();
        limiter.check("jane@4wdc.com.au", Some(ip)).await.unwrap();

        limiter.cleanup().await;
        assert_eq!(limiter.tracked_keys().await, (1, 1));
    }
}
