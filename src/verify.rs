//! The verify hook the store installs into TLS client configurations.
//!
//! The TLS stack calls the hook for every certificate in the peer's chain. If the chain is proper,
//! each intermediate is already validated through its parent by the stack, so the hook only has to
//! establish that the first untrusted link was signed by a root in the bundle.

use log::{debug, error, info};

use crate::signature::check_signature;
use crate::tls::{VerifyHook, BADCERT_BAD_MD, BADCERT_NOT_TRUSTED, X509_FATAL_ERROR};
use crate::{AnchorStore, CertView, Error, Result};

impl AnchorStore {
    /// Decides whether `crt` is signed by a root in the active bundle.
    ///
    /// Elements whose flags say anything other than "not trusted" (ignoring a weak hash) are
    /// passed through untouched: either the stack already trusts them or they failed for a reason
    /// the caller must handle. On success all flags are cleared.
    pub fn verify_certificate(
        &self,
        crt: &CertView<'_>,
        depth: i32,
        flags: &mut u32,
    ) -> Result<()> {
        // It's OK for a trusted cert to have a weak signature hash alg.
        // as we already trust this certificate
        let flags_filtered = *flags & !BADCERT_BAD_MD;
        if flags_filtered != BADCERT_NOT_TRUSTED {
            return Ok(());
        }

        let bundle = match self.snapshot() {
            Some(bundle) => bundle,
            None => {
                error!("No certificates in bundle");
                return Err(Error::NoBundle);
            }
        };
        debug!("{} certificates in bundle", bundle.len());

        let anchor = match bundle.find(crt.issuer_raw) {
            Some(anchor) => anchor,
            None => {
                error!("Issuer of certificate at depth {depth} is not in the bundle");
                return Err(Error::NotFound);
            }
        };

        if let Err(e) = check_signature(crt, anchor.key) {
            error!("Failed to verify certificate at depth {depth}: {e}");
            return Err(e);
        }

        info!("Certificate at depth {depth} validated");
        *flags = 0;
        Ok(())
    }
}

impl VerifyHook for AnchorStore {
    fn verify(&self, crt: &CertView<'_>, depth: i32, flags: &mut u32) -> i32 {
        match self.verify_certificate(crt, depth, flags) {
            Ok(()) => 0,
            Err(_) => X509_FATAL_ERROR,
        }
    }
}
