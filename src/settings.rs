//! Settings that govern how bundles are decoded.

use serde::{Deserialize, Serialize};

use crate::bundle::BUNDLE_MAX_CERTS;

/// Decoder limits for an [`AnchorStore`](crate::AnchorStore).
///
/// Deserializable so hosts can keep it next to the rest of their TLS configuration. Missing fields
/// take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleSettings {
    /// Largest `num_certs` a bundle may declare.
    pub max_certs: u16,
    /// Reject bundles whose names are not strictly ascending.
    ///
    /// The offline packer sorts entries and lookup relies on that order. An unsorted bundle can
    /// only produce false negatives since the signature check decides trust, so the check is off
    /// unless bundles come from a source that is not the packer.
    pub check_order: bool,
}

impl Default for BundleSettings {
    fn default() -> Self {
        Self {
            max_certs: BUNDLE_MAX_CERTS,
            check_order: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bundle_limit() {
        let settings = BundleSettings::default();
        assert_eq!(BUNDLE_MAX_CERTS, settings.max_certs);
        assert!(!settings.check_order);
    }
}
