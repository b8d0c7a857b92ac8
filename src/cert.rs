//! The slice of a peer certificate that the verify hook works with.

use crate::asn1::RawCertificate;
use crate::signature::{signature_params, MdType, PkType, PssOptions};
use crate::{Error, Result};

/// A certificate from the peer's chain, split into the fields the verify hook needs.
///
/// All byte slices borrow from the DER encoding the view was built from. `issuer_raw`,
/// `subject_raw` and `spki_raw` are complete TLVs; `tbs` is the exact region the signature covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertView<'a> {
    pub issuer_raw: &'a [u8],
    pub subject_raw: &'a [u8],
    pub spki_raw: &'a [u8],
    pub tbs: &'a [u8],
    pub sig: &'a [u8],
    pub sig_md: MdType,
    pub sig_pk: PkType,
    pub sig_opts: Option<PssOptions>,
}

impl<'a> CertView<'a> {
    /// Splits a DER certificate.
    ///
    /// Fails when the encoding is not a well formed certificate or its signature algorithm is
    /// not one the hook can verify.
    pub fn from_der(der: &'a [u8]) -> Result<Self> {
        let raw = RawCertificate::from_der(der)?;
        let (sig_md, sig_pk, sig_opts) = signature_params(&raw.signature_algorithm)?;
        // Signatures are always whole octets.
        let sig = raw.signature.as_bytes().ok_or(Error::BadSignature)?;

        Ok(Self {
            issuer_raw: raw.issuer,
            subject_raw: raw.subject,
            spki_raw: raw.spki,
            tbs: raw.tbs,
            sig,
            sig_md,
            sig_pk,
            sig_opts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intermediate_names_its_root() {
        let root = CertView::from_der(include_bytes!("../tests/data/ec_root.der")).unwrap();
        let inter = CertView::from_der(include_bytes!("../tests/data/ec_inter.der")).unwrap();
        assert_eq!(root.subject_raw, inter.issuer_raw);
        assert_eq!(root.subject_raw, root.issuer_raw);
        assert_ne!(root.spki_raw, inter.spki_raw);
    }

    #[test]
    fn rejects_garbage() {
        assert!(CertView::from_der(b"not a certificate").is_err());
    }
}
