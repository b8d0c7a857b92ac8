//! Verifies that a certificate was signed by the holder of a given SubjectPublicKeyInfo.

use const_oid::{
    db::rfc5912::{
        ECDSA_WITH_SHA_224, ECDSA_WITH_SHA_256, ECDSA_WITH_SHA_384, ECDSA_WITH_SHA_512,
        ID_EC_PUBLIC_KEY, ID_MGF_1, ID_RSASSA_PSS, ID_SHA_1, ID_SHA_224, ID_SHA_256, ID_SHA_384,
        ID_SHA_512, RSA_ENCRYPTION, SECP_256_R_1, SECP_384_R_1, SHA_1_WITH_RSA_ENCRYPTION,
        SHA_224_WITH_RSA_ENCRYPTION, SHA_256_WITH_RSA_ENCRYPTION, SHA_384_WITH_RSA_ENCRYPTION,
        SHA_512_WITH_RSA_ENCRYPTION,
    },
    ObjectIdentifier,
};
use der::{Decode, Encode};
use log::error;
use rsa::{pkcs8::DecodePublicKey, Pkcs1v15Sign, Pss, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use x509_cert::spki::{AlgorithmIdentifierOwned, AlgorithmIdentifierRef, SubjectPublicKeyInfoRef};

use crate::asn1::RsaPssParams;
use crate::{CertView, Error, Result};

/// ecdsa-with-SHA1, from RFC 3279.
pub const ECDSA_WITH_SHA_1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");

/// Message digest a certificate signature was computed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MdType {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl MdType {
    pub fn from_oid(oid: ObjectIdentifier) -> Result<Self> {
        match [
            (ID_SHA_1, MdType::Sha1),
            (ID_SHA_224, MdType::Sha224),
            (ID_SHA_256, MdType::Sha256),
            (ID_SHA_384, MdType::Sha384),
            (ID_SHA_512, MdType::Sha512),
        ]
        .into_iter()
        .find(|(candidate, _)| *candidate == oid)
        {
            Some((_, md)) => Ok(md),
            None => Err(Error::UnsupportedAlgorithm(oid)),
        }
    }

    /// Hashes `data`.
    pub fn digest(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            MdType::Sha1 => Ok(Sha1::digest(data).to_vec()),
            MdType::Sha224 => Ok(Sha224::digest(data).to_vec()),
            MdType::Sha256 => Ok(Sha256::digest(data).to_vec()),
            MdType::Sha384 => Ok(Sha384::digest(data).to_vec()),
            MdType::Sha512 => Ok(Sha512::digest(data).to_vec()),
        }
    }

    fn pkcs1v15(self) -> Result<Pkcs1v15Sign> {
        match self {
            MdType::Sha1 => Ok(Pkcs1v15Sign::new::<Sha1>()),
            MdType::Sha224 => Ok(Pkcs1v15Sign::new::<Sha224>()),
            MdType::Sha256 => Ok(Pkcs1v15Sign::new::<Sha256>()),
            MdType::Sha384 => Ok(Pkcs1v15Sign::new::<Sha384>()),
            MdType::Sha512 => Ok(Pkcs1v15Sign::new::<Sha512>()),
        }
    }

    fn pss(self, salt_len: usize) -> Result<Pss> {
        match self {
            MdType::Sha1 => Ok(Pss::new_with_salt::<Sha1>(salt_len)),
            MdType::Sha224 => Ok(Pss::new_with_salt::<Sha224>(salt_len)),
            MdType::Sha256 => Ok(Pss::new_with_salt::<Sha256>(salt_len)),
            MdType::Sha384 => Ok(Pss::new_with_salt::<Sha384>(salt_len)),
            MdType::Sha512 => Ok(Pss::new_with_salt::<Sha512>(salt_len)),
        }
    }
}

/// Public key algorithm a certificate signature was produced with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PkType {
    Rsa,
    RsaPss,
    Ecdsa,
}

/// Extra verification options carried by RSASSA-PSS signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PssOptions {
    pub mgf1_md: MdType,
    pub expected_salt_len: usize,
}

/// Maps a certificate's signatureAlgorithm onto the digest, key type and options used to verify it.
pub fn signature_params(
    alg: &AlgorithmIdentifierRef<'_>,
) -> Result<(MdType, PkType, Option<PssOptions>)> {
    if alg.oid == ID_RSASSA_PSS {
        return pss_params(alg);
    }

    let known = [
        (SHA_1_WITH_RSA_ENCRYPTION, MdType::Sha1, PkType::Rsa),
        (SHA_224_WITH_RSA_ENCRYPTION, MdType::Sha224, PkType::Rsa),
        (SHA_256_WITH_RSA_ENCRYPTION, MdType::Sha256, PkType::Rsa),
        (SHA_384_WITH_RSA_ENCRYPTION, MdType::Sha384, PkType::Rsa),
        (SHA_512_WITH_RSA_ENCRYPTION, MdType::Sha512, PkType::Rsa),
        (ECDSA_WITH_SHA_1, MdType::Sha1, PkType::Ecdsa),
        (ECDSA_WITH_SHA_224, MdType::Sha224, PkType::Ecdsa),
        (ECDSA_WITH_SHA_256, MdType::Sha256, PkType::Ecdsa),
        (ECDSA_WITH_SHA_384, MdType::Sha384, PkType::Ecdsa),
        (ECDSA_WITH_SHA_512, MdType::Sha512, PkType::Ecdsa),
    ];
    match known.into_iter().find(|(oid, _, _)| *oid == alg.oid) {
        Some((_, md, pk)) => Ok((md, pk, None)),
        None => Err(Error::UnsupportedAlgorithm(alg.oid)),
    }
}

fn pss_params(alg: &AlgorithmIdentifierRef<'_>) -> Result<(MdType, PkType, Option<PssOptions>)> {
    // Absent parameters mean every field takes its default.
    let params = match &alg.parameters {
        Some(any) => RsaPssParams::from_der(&any.to_der()?)?,
        None => RsaPssParams {
            hash_algorithm: None,
            mask_gen_algorithm: None,
            salt_length: None,
            trailer_field: None,
        },
    };

    let md = match &params.hash_algorithm {
        Some(hash) => MdType::from_oid(hash.oid)?,
        None => MdType::Sha1,
    };
    let mgf1_md = match &params.mask_gen_algorithm {
        Some(mgf) => {
            if mgf.oid != ID_MGF_1 {
                return Err(Error::UnsupportedAlgorithm(mgf.oid));
            }
            match &mgf.parameters {
                Some(hash) => {
                    MdType::from_oid(AlgorithmIdentifierOwned::from_der(&hash.to_der()?)?.oid)?
                }
                None => MdType::Sha1,
            }
        }
        None => MdType::Sha1,
    };
    if params.trailer_field.unwrap_or(1) != 1 {
        return Err(Error::UnsupportedAlgorithm(alg.oid));
    }

    Ok((
        md,
        PkType::RsaPss,
        Some(PssOptions {
            mgf1_md,
            expected_salt_len: params.salt_length.unwrap_or(20) as usize,
        }),
    ))
}

/// A parsed root public key.
#[derive(Clone, Debug)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Parses a DER SubjectPublicKeyInfo.
    pub fn from_spki_der(spki: &[u8]) -> Result<Self> {
        let info = SubjectPublicKeyInfoRef::from_der(spki).map_err(|e| {
            error!("Failed to parse SubjectPublicKeyInfo: {e:?}");
            Error::KeyParse
        })?;

        let key = if info.algorithm.oid == RSA_ENCRYPTION {
            RsaPublicKey::from_public_key_der(spki).map(PublicKey::Rsa).ok()
        } else if info.algorithm.oid == ID_EC_PUBLIC_KEY {
            let curve = info
                .algorithm
                .parameters
                .and_then(|p| p.decode_as::<ObjectIdentifier>().ok());
            if curve == Some(SECP_256_R_1) {
                p256::ecdsa::VerifyingKey::from_public_key_der(spki)
                    .map(PublicKey::P256)
                    .ok()
            } else if curve == Some(SECP_384_R_1) {
                p384::ecdsa::VerifyingKey::from_public_key_der(spki)
                    .map(PublicKey::P384)
                    .ok()
            } else {
                None
            }
        } else {
            None
        };

        key.ok_or_else(|| {
            error!("Unsupported or invalid public key {}", info.algorithm.oid);
            Error::KeyParse
        })
    }

    /// Whether this key can check signatures of kind `pk`.
    pub fn can_do(&self, pk: PkType) -> bool {
        match self {
            PublicKey::Rsa(_) => matches!(pk, PkType::Rsa | PkType::RsaPss),
            PublicKey::P256(_) | PublicKey::P384(_) => pk == PkType::Ecdsa,
        }
    }

    /// Checks `sig` over the already computed digest `hash`.
    ///
    /// `opts` is required for [`PkType::RsaPss`] and ignored otherwise. ECDSA signatures are
    /// expected in their X.509 form, a DER `Ecdsa-Sig-Value`.
    pub fn verify_ext(
        &self,
        pk: PkType,
        opts: Option<&PssOptions>,
        md: MdType,
        hash: &[u8],
        sig: &[u8],
    ) -> Result<()> {
        if !self.can_do(pk) {
            return Err(Error::KeyMismatch(pk));
        }
        match self {
            PublicKey::Rsa(key) => {
                let verified = match pk {
                    PkType::RsaPss => {
                        let opts = opts.ok_or(Error::UnsupportedAlgorithm(ID_RSASSA_PSS))?;
                        // MGF1 always runs over the message digest here.
                        if opts.mgf1_md != md {
                            return Err(Error::UnsupportedDigest(opts.mgf1_md));
                        }
                        key.verify(md.pss(opts.expected_salt_len)?, hash, sig)
                    }
                    _ => key.verify(md.pkcs1v15()?, hash, sig),
                };
                verified.map_err(|e| {
                    error!("RSA verify failed with error {e:?}");
                    Error::BadSignature
                })
            }
            PublicKey::P256(key) => {
                use p256::ecdsa::signature::hazmat::PrehashVerifier;
                let sig = p256::ecdsa::Signature::from_der(sig).map_err(|_| Error::BadSignature)?;
                key.verify_prehash(hash, &sig).map_err(|e| {
                    error!("ECDSA P-256 verify failed with error {e:?}");
                    Error::BadSignature
                })
            }
            PublicKey::P384(key) => {
                use p384::ecdsa::signature::hazmat::PrehashVerifier;
                let sig = p384::ecdsa::Signature::from_der(sig).map_err(|_| Error::BadSignature)?;
                key.verify_prehash(hash, &sig).map_err(|e| {
                    error!("ECDSA P-384 verify failed with error {e:?}");
                    Error::BadSignature
                })
            }
        }
    }
}

/// Checks that `child` was signed by the key in `spki`.
///
/// The key type is compared against the certificate's signature algorithm before anything is
/// hashed, so an obvious mismatch costs no digest computation.
pub fn check_signature(child: &CertView<'_>, spki: &[u8]) -> Result<()> {
    let parent = PublicKey::from_spki_der(spki)?;

    // Fast check to avoid expensive computations when not necessary
    if !parent.can_do(child.sig_pk) {
        error!("Simple compare failed: key cannot verify {:?}", child.sig_pk);
        return Err(Error::KeyMismatch(child.sig_pk));
    }

    let hash = child.sig_md.digest(child.tbs).map_err(|e| {
        error!("Failed to hash certificate: {e}");
        e
    })?;

    parent.verify_ext(
        child.sig_pk,
        child.sig_opts.as_ref(),
        child.sig_md,
        &hash,
        child.sig,
    )
}
