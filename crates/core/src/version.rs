//! API protocol version negotiation.

/// Oldest client protocol version the gateway accepts.
pub const MIN_API_PROTOCOL_VERSION: u32 = 2;

/// Newest protocol version the gateway speaks.
pub const MAX_API_PROTOCOL_VERSION: u32 = 3;

/// Negotiate the protocol version for a new lease.
///
/// Returns `None` for clients below the minimum; otherwise the lease
/// speaks `min(client_version, MAX_API_PROTOCOL_VERSION)`.
pub fn negotiate(client_version: u32) -> Option<u32> {
    if client_version < MIN_API_PROTOCOL_VERSION {
        None
    } else {
        Some(client_version.min(MAX_API_PROTOCOL_VERSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate() {
        assert_eq!(negotiate(0), None);
        assert_eq!(negotiate(1), None);
        assert_eq!(negotiate(2), Some(2));
        assert_eq!(negotiate(3), Some(3));
        assert_eq!(negotiate(99), Some(MAX_API_PROTOCOL_VERSION));
    }
}
