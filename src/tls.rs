//! The surface shared with the TLS stack: verification flags, the verify hook contract and the
//! pieces of client configuration the store touches.

use std::sync::Arc;

use crate::CertView;

/// The certificate validity has expired.
pub const BADCERT_EXPIRED: u32 = 0x01;
/// The certificate has been revoked (is on a CRL).
pub const BADCERT_REVOKED: u32 = 0x02;
/// The certificate Common Name (CN) does not match with the expected CN.
pub const BADCERT_CN_MISMATCH: u32 = 0x04;
/// The certificate is not correctly signed by the trusted CA.
pub const BADCERT_NOT_TRUSTED: u32 = 0x08;
/// The CRL is not correctly signed by the trusted CA.
pub const BADCRL_NOT_TRUSTED: u32 = 0x10;
/// The CRL is expired.
pub const BADCRL_EXPIRED: u32 = 0x20;
/// Certificate was missing.
pub const BADCERT_MISSING: u32 = 0x40;
/// Certificate verification was skipped.
pub const BADCERT_SKIP_VERIFY: u32 = 0x80;
/// Other reason (can be used by verify callback).
pub const BADCERT_OTHER: u32 = 0x0100;
/// The certificate validity starts in the future.
pub const BADCERT_FUTURE: u32 = 0x0200;
/// The certificate was signed with an unacceptable hash.
pub const BADCERT_BAD_MD: u32 = 0x4000;
/// The certificate was signed with an unacceptable PK alg.
pub const BADCERT_BAD_PK: u32 = 0x8000;
/// The certificate was signed with an unacceptable key.
pub const BADCERT_BAD_KEY: u32 = 0x01_0000;

/// Returned by a verify hook to abort the handshake.
pub const X509_FATAL_ERROR: i32 = -0x3000;

/// Placeholder CA chain.
///
/// TLS stacks refuse to start peer verification without a CA chain. The store hands them this
/// instead of real certificates; it carries no trust, every decision happens in the hook.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DummyAnchor {
    _priv: (),
}

/// Per-certificate verification callback, invoked once for every element of the peer's chain.
///
/// `flags` holds the `BADCERT_*` bits the TLS stack accumulated for the element. Returns `0` to
/// continue, or [`X509_FATAL_ERROR`] to abort the handshake.
pub trait VerifyHook: Send + Sync {
    fn verify(&self, crt: &CertView<'_>, depth: i32, flags: &mut u32) -> i32;
}

/// The parts of a TLS client configuration the store needs to attach itself.
pub trait SslConfig {
    fn set_ca_chain(&mut self, ca_chain: Option<Arc<DummyAnchor>>);
    fn set_verify(&mut self, hook: Option<Arc<dyn VerifyHook>>);
}

/// A minimal client configuration holding a CA chain and a verify hook.
#[derive(Clone, Default)]
pub struct ClientConfig {
    ca_chain: Option<Arc<DummyAnchor>>,
    verify: Option<Arc<dyn VerifyHook>>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ca_chain(&self) -> Option<&Arc<DummyAnchor>> {
        self.ca_chain.as_ref()
    }

    pub fn has_verify_hook(&self) -> bool {
        self.verify.is_some()
    }

    /// Runs the registered hook on one chain element, as the handshake would.
    ///
    /// Without a hook the flags are left for the stack's own decision and `0` is returned.
    pub fn run_verify(&self, crt: &CertView<'_>, depth: i32, flags: &mut u32) -> i32 {
        match &self.verify {
            Some(hook) => hook.verify(crt, depth, flags),
            None => 0,
        }
    }
}

impl SslConfig for ClientConfig {
    fn set_ca_chain(&mut self, ca_chain: Option<Arc<DummyAnchor>>) {
        self.ca_chain = ca_chain;
    }

    fn set_verify(&mut self, hook: Option<Arc<dyn VerifyHook>>) {
        self.verify = hook;
    }
}
