use std::{
    net::{SocketAddr, ToSocketAddrs},
    sync::Arc,
    time::Duration,
};

use super::Error;

/// Where to reach the mixer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    host: Arc<str>,
    port: u16,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<Arc<str>>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &Arc<str> {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidConfig("mixer host is required"));
        }

        if self.port == 0 {
            return Err(Error::InvalidConfig("port must be between 1 and 65535"));
        }

        Ok(())
    }

    /// Resolves the mixer address, preferring IPv4.
    pub fn socket_addr(&self) -> Result<SocketAddr, Error> {
        let addrs: Vec<SocketAddr> = (self.host.as_ref(), self.port)
            .to_socket_addrs()
            .map_err(|err| {
                log::debug!("Resolving {}: {err}", self.host);
                Error::Resolve(self.host.clone())
            })?
            .collect();

        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| Error::Resolve(self.host.clone()))
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Timers of the UDP client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Interval between two remote-enable messages.
    pub keep_alive: Duration,
    /// Base interval between two subscription polls.
    pub interval: Duration,
    /// Upper bound of the random delay added to each poll interval.
    pub jitter: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(9),
            interval: Duration::from_millis(500),
            jitter: Duration::ZERO,
        }
    }
}

impl PollConfig {
    /// Delay until the next poll cycle.
    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }

        let jitter_ms = self.jitter.as_millis().min(u64::MAX as u128) as u64;
        self.interval + Duration::from_millis(fastrand::u64(0..=jitter_ms))
    }
}

/// Timers of the Mackie Control client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct McuConfig {
    /// Interval between two active sensing bytes.
    pub keep_alive: Duration,
}

impl Default for McuConfig {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        assert!(ConnectionConfig::new("192.168.1.100", 10023).validate().is_ok());
        assert!(matches!(
            ConnectionConfig::new(" ", 10023).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            ConnectionConfig::new("192.168.1.100", 0).validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn resolution() {
        let cfg = ConnectionConfig::new("127.0.0.1", 10111);
        assert_eq!(cfg.socket_addr().unwrap(), "127.0.0.1:10111".parse().unwrap());
        assert_eq!(cfg.to_string(), "127.0.0.1:10111");
    }

    #[test]
    fn jitter() {
        let cfg = PollConfig {
            jitter: Duration::from_millis(100),
            ..PollConfig::default()
        };

        for _ in 0..32 {
            let delay = cfg.next_delay();
            assert!(delay >= cfg.interval);
            assert!(delay <= cfg.interval + cfg.jitter);
        }

        assert_eq!(PollConfig::default().next_delay(), Duration::from_millis(500));
    }
}
