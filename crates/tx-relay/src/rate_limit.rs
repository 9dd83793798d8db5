// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use ipnet::IpNet;
use parking_lot::Mutex;
use tokio::time::Instant;

/// Counts requests per key in fixed windows.
///
/// The first request of a window starts the count at one; requests are let
/// through while the count is below the maximum. Once the window has elapsed
/// the record is replaced rather than incremented.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    records: Mutex<HashMap<String, RateLimitRecord>>,
}

#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    count: u32,
    reset_at: Instant,
}

impl RateLimiter {
    /// Allows `max_requests` per `window` for each key.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Records a request for `key`.
    ///
    /// Returns the time left in the current window when the request is
    /// refused.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut records = self.records.lock();
        match records.get_mut(key) {
            Some(record) if record.reset_at > now => {
                if record.count < self.max_requests {
                    record.count += 1;
                    Ok(())
                } else {
                    Err(record.reset_at - now)
                }
            }
            _ => {
                records.insert(
                    key.to_owned(),
                    RateLimitRecord {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                Ok(())
            }
        }
    }

    /// Like [`check`](Self::check) without the retry hint.
    pub fn allow(&self, key: &str) -> bool {
        self.check(key).is_ok()
    }

    /// Drops records whose window has elapsed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, r| r.reset_at > now);
        before - records.len()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

/// Reverse proxies allowed to name the client in `x-forwarded-for`.
///
/// Anyone else is keyed on their socket peer address, so rotating the
/// header does not open a fresh rate limit window.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    networks: Vec<IpNet>,
}

impl TrustedProxies {
    /// Parses ip addresses and cidr ranges ("127.0.0.1", "10.0.0.0/8").
    ///
    /// Entries that are neither are logged and skipped.
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        let networks = entries
            .iter()
            .map(AsRef::as_ref)
            .filter_map(|entry| {
                let entry = entry.trim();
                let parsed = entry
                    .parse::<IpNet>()
                    .ok()
                    .or_else(|| entry.parse::<IpAddr>().ok().and_then(host_net));
                if parsed.is_none() {
                    tracing::warn!(%entry, "Ignoring invalid trusted proxy");
                }
                parsed
            })
            .collect();
        Self { networks }
    }

    /// Whether `ip` belongs to a trusted proxy.
    pub fn is_trusted(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(&ip))
    }

    /// The rate limit key for a request from `peer`.
    ///
    /// The leftmost `x-forwarded-for` address is used only when the peer is a
    /// trusted proxy and the entry parses as an ip address.
    pub fn client_ip(&self, peer: IpAddr, forwarded_for: Option<&str>) -> IpAddr {
        if !self.is_trusted(peer) {
            return peer;
        }
        forwarded_for
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
            .unwrap_or(peer)
    }
}

fn host_net(ip: IpAddr) -> Option<IpNet> {
    let prefix = if ip.is_ipv4() { 32 } else { 128 };
    IpNet::new(ip, prefix).ok()
}

/// Whole seconds, rounded up, never zero.
pub fn retry_after_secs(left: Duration) -> u64 {
    let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test(start_paused = true)]
    async fn eleventh_request_is_refused() {
        let limiter = RateLimiter::new(10, HOUR);
        for _ in 0..10 {
            assert!(limiter.allow("10.0.0.1"));
        }
        let left = limiter.check("10.0.0.1").unwrap_err();
        assert_eq!(retry_after_secs(left), 3600);
        // other keys are independent.
        assert!(limiter.allow("10.0.0.2"));
    }

    #[tokio::test(start_paused = true)]
    async fn new_window_starts_over() {
        let limiter = RateLimiter::new(2, HOUR);
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));

        tokio::time::advance(Duration::from_secs(1800)).await;
        let left = limiter.check("a").unwrap_err();
        assert_eq!(retry_after_secs(left), 1800);

        tokio::time::advance(Duration::from_secs(1800)).await;
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_elapsed_windows_only() {
        let limiter = RateLimiter::new(5, HOUR);
        limiter.allow("old");
        tokio::time::advance(Duration::from_secs(3000)).await;
        limiter.allow("new");
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(limiter.sweep_expired(), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn forwarded_header_needs_a_trusted_peer() {
        let proxies = TrustedProxies::new(&["10.0.0.0/8", "::1", "not an ip"]);
        let proxy: IpAddr = "10.1.2.3".parse().unwrap();
        let stranger: IpAddr = "192.0.2.1".parse().unwrap();

        assert_eq!(
            proxies.client_ip(proxy, Some("203.0.113.7, 10.1.2.3")),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
        assert_eq!(proxies.client_ip(stranger, Some("203.0.113.7")), stranger);
        // garbage from a trusted proxy falls back to the proxy itself.
        assert_eq!(proxies.client_ip(proxy, Some("nonsense")), proxy);
        assert_eq!(proxies.client_ip(proxy, None), proxy);
        assert!(proxies.is_trusted("::1".parse().unwrap()));
        assert!(!TrustedProxies::default().is_trusted(proxy));
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }
}
