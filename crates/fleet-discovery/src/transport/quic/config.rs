use std::time::Duration;

/// QUIC endpoint configuration.
#[derive(Clone, Debug)]
pub struct QuicConfig {
    /// Local bind address. `None` binds the unspecified address on the
    /// advertised port.
    pub bind_addr: Option<std::net::SocketAddr>,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Idle timeout before connection close
    pub idle_timeout: Duration,
    /// Maximum concurrent bidirectional streams per connection
    pub max_streams: u32,
    /// Largest fleet request or response accepted, in bytes
    pub max_message_size: usize,
}

impl Default for QuicConfig {
    fn default() -> Self {
        Self {
            bind_addr: None,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
            max_streams: 16,
            max_message_size: 4 * 1024 * 1024,
        }
    }
}

impl QuicConfig {
    /// Create config for testing: loopback, ephemeral port, short timeouts.
    pub fn for_testing() -> Self {
        Self {
            bind_addr: Some(std::net::SocketAddr::from(([127, 0, 0, 1], 0))),
            connect_timeout: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(5),
            max_streams: 4,
            max_message_size: 1024 * 1024,
        }
    }

    /// Bind address for a server advertised on `port`.
    pub(crate) fn server_bind(&self, port: u16, ipv6: bool) -> std::net::SocketAddr {
        match self.bind_addr {
            Some(addr) => addr,
            None if ipv6 => std::net::SocketAddr::from(([0u16; 8], port)),
            None => std::net::SocketAddr::from(([0u8; 4], port)),
        }
    }

    /// Bind address for an outbound-only endpoint.
    pub(crate) fn client_bind(&self) -> std::net::SocketAddr {
        self.bind_addr
            .map(|addr| std::net::SocketAddr::new(addr.ip(), 0))
            .unwrap_or_else(|| std::net::SocketAddr::from(([0u8; 4], 0)))
    }

    pub(crate) fn transport(&self) -> quinn::TransportConfig {
        let mut transport = quinn::TransportConfig::default();
        if let Ok(idle) = quinn::IdleTimeout::try_from(self.idle_timeout) {
            transport.max_idle_timeout(Some(idle));
        }
        transport.max_concurrent_bidi_streams(self.max_streams.into());
        transport.max_concurrent_uni_streams(0u32.into());
        transport
    }
}
