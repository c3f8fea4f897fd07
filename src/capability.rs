//! Capability-gated access to locators and host objects (`spec.md` §6, §9).
//!
//! Adapted from `ouros::capability`: a sandbox session is granted an
//! immutable set of capabilities at construction time, checked at the
//! boundary where the evaluator is about to perform an effect the host may
//! want to deny (a locator read/write, a host-object method call).

use std::fmt;

/// A single permission grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Permission to read/write/delete through a locator whose scheme
    /// matches (`"file"`, `"http"`, `"https"`, `"fs"`).
    Locator(String),
    /// Permission to access any locator scheme.
    AnyLocator,
    /// Permission to invoke a host object's decorated methods.
    HostCall,
    /// Domain-specific permission the host interprets itself.
    Custom(String),
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locator(scheme) => write!(f, "locator:{scheme}"),
            Self::AnyLocator => f.write_str("locator:*"),
            Self::HostCall => f.write_str("host-call"),
            Self::Custom(key) => write!(f, "custom:{key}"),
        }
    }
}

/// Error returned when an operation is denied by the capability set.
#[derive(Debug, Clone)]
pub(crate) struct PermissionDenied {
    pub operation: String,
    pub required: String,
}

impl fmt::Display for PermissionDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "permission denied: {} (requires capability '{}')", self.operation, self.required)
    }
}

impl std::error::Error for PermissionDenied {}

/// An immutable set of granted capabilities. `CapabilitySet::default()`
/// (empty) denies every locator/host-call effect, making evaluation a pure
/// computation environment.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    granted: Vec<Capability>,
}

impl CapabilitySet {
    pub fn new(granted: Vec<Capability>) -> Self {
        Self { granted }
    }

    pub fn unrestricted() -> Self {
        Self {
            granted: vec![Capability::AnyLocator, Capability::HostCall],
        }
    }

    pub fn check_locator(&self, scheme: &str) -> Result<(), PermissionDenied> {
        for cap in &self.granted {
            match cap {
                Capability::AnyLocator => return Ok(()),
                Capability::Locator(s) if s == scheme => return Ok(()),
                _ => {}
            }
        }
        Err(PermissionDenied {
            operation: format!("access to '{scheme}' locator"),
            required: format!("locator:{scheme}"),
        })
    }

    pub fn check_host_call(&self) -> Result<(), PermissionDenied> {
        if self.granted.iter().any(|c| matches!(c, Capability::HostCall)) {
            Ok(())
        } else {
            Err(PermissionDenied {
                operation: "host-object method call".to_owned(),
                required: "host-call".to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_capability_set_denies_everything() {
        let caps = CapabilitySet::default();
        assert!(caps.check_locator("file").is_err());
        assert!(caps.check_host_call().is_err());
    }

    #[test]
    fn specific_locator_grant_only_allows_that_scheme() {
        let caps = CapabilitySet::new(vec![Capability::Locator("file".to_owned())]);
        assert!(caps.check_locator("file").is_ok());
        assert!(caps.check_locator("http").is_err());
    }
}
