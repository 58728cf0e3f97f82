//! Runtime configuration loaded from the environment.

use std::net::SocketAddr;

use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: SocketAddr,
    /// Bound of each bill actor's inbox. Senders wait when it is full.
    pub mailbox_capacity: usize,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

impl BillingConfig {
    /// Load from `TALLY_BIND_ADDR` and `TALLY_MAILBOX_CAPACITY`.
    ///
    /// Missing values use the defaults; invalid values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("TALLY_BIND_ADDR") {
            match raw.parse::<SocketAddr>() {
                Ok(addr) => config.bind_addr = addr,
                Err(e) => warn!(value = %raw, error = %e, "invalid TALLY_BIND_ADDR; using default"),
            }
        }

        if let Some(raw) = lookup("TALLY_MAILBOX_CAPACITY") {
            match raw.parse::<usize>() {
                Ok(n) if n >= 1 => config.mailbox_capacity = n,
                _ => warn!(value = %raw, "invalid TALLY_MAILBOX_CAPACITY; using default"),
            }
        }

        config
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = BillingConfig::from_lookup(lookup(&[]));
        assert_eq!(config, BillingConfig::default());
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
    }

    #[test]
    fn reads_valid_values() {
        let config = BillingConfig::from_lookup(lookup(&[
            ("TALLY_BIND_ADDR", "127.0.0.1:9000"),
            ("TALLY_MAILBOX_CAPACITY", "8"),
        ]));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.mailbox_capacity, 8);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = BillingConfig::from_lookup(lookup(&[
            ("TALLY_BIND_ADDR", "not-an-addr"),
            ("TALLY_MAILBOX_CAPACITY", "0"),
        ]));
        assert_eq!(config, BillingConfig::default());
    }

    #[test]
    fn builder_clamps_capacity() {
        let config = BillingConfig::default().with_mailbox_capacity(0);
        assert_eq!(config.mailbox_capacity, 1);
    }
}
