//! Request correlation identifier.

use core::fmt;

/// Caller-assigned correlation tag for one in-flight request.
///
/// The caller guarantees uniqueness among concurrently in-flight requests;
/// the bridge never generates ids itself. Stored in the request record at a
/// discoverable offset and echoed back verbatim in the completion callback.
/// The maximum value (`u32::MAX`) is reserved as a sentinel for "no request".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RequestId(u32);

impl RequestId {
    /// Sentinel value indicating no request.
    pub const NONE: RequestId = RequestId(u32::MAX);

    /// Create a new RequestId from a raw value.
    #[inline]
    pub const fn new(id: u32) -> Self {
        RequestId(id)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get as u64 (for backend correlation fields, e.g. io_uring user_data).
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }

    /// Check if this is the NONE sentinel.
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

impl From<u32> for RequestId {
    #[inline]
    fn from(id: u32) -> Self {
        RequestId(id)
    }
}

impl From<RequestId> for u32 {
    #[inline]
    fn from(id: RequestId) -> Self {
        id.0
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "RequestId(NONE)")
        } else {
            write!(f, "RequestId({})", self.0)
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_basics() {
        let id = RequestId::new(42);
        assert_eq!(id.as_u32(), 42);
        assert_eq!(id.as_u64(), 42);
        assert!(!id.is_none());
    }

    #[test]
    fn test_request_id_sentinel() {
        assert!(RequestId::NONE.is_none());
        assert!(!RequestId::new(0).is_none());
    }

    #[test]
    fn test_request_id_conversions() {
        let id: RequestId = 100u32.into();
        let raw: u32 = id.into();
        assert_eq!(raw, 100);
    }
}
