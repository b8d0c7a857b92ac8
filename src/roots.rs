//! The certificate bundle compiled into the crate.
//!
//! By default this is `certs/x509_crt_bundle`, packed from a system root store. Point the
//! `CRT_BUNDLE_PATH` environment variable at another packed bundle at build time to replace it.
//! The bundle is read-only for the lifetime of the program.

static X509_CRT_BUNDLE: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/x509_crt_bundle"));

/// Returns the embedded bundle. It is validated when first installed, not here.
pub fn default_bundle() -> &'static [u8] {
    X509_CRT_BUNDLE
}
