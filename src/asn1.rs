//! Minimal DER walking for certificates presented during the handshake.
//!
//! Nothing here decodes names or keys. The verify hook needs the exact bytes that were signed and
//! the exact issuer bytes, so fields are sliced out of the original encoding rather than decoded
//! and re-encoded.

use der::{
    asn1::BitStringRef, Decode, ErrorKind, Header, Reader, Sequence, SliceReader, Tag, TagNumber,
};
use x509_cert::spki::{AlgorithmIdentifierOwned, AlgorithmIdentifierRef};

/// `[0] EXPLICIT Version` at the head of a v2/v3 TBSCertificate.
const VERSION_TAG: Tag = Tag::ContextSpecific {
    constructed: true,
    number: TagNumber::N0,
};

/// Raw slices of a DER certificate.
///
/// ```text
/// Certificate  ::=  SEQUENCE  {
///      tbsCertificate       TBSCertificate,
///      signatureAlgorithm   AlgorithmIdentifier,
///      signatureValue       BIT STRING  }
///
/// TBSCertificate  ::=  SEQUENCE  {
///      version         [0]  EXPLICIT Version DEFAULT v1,
///      serialNumber         CertificateSerialNumber,
///      signature            AlgorithmIdentifier,
///      issuer               Name,
///      validity             Validity,
///      subject              Name,
///      subjectPublicKeyInfo SubjectPublicKeyInfo,
///      ... }
/// ```
#[derive(Clone, Debug)]
pub(crate) struct RawCertificate<'a> {
    /// Full TLV of the TBSCertificate, i.e., the signed bytes.
    pub tbs: &'a [u8],
    pub issuer: &'a [u8],
    pub subject: &'a [u8],
    pub spki: &'a [u8],
    pub signature_algorithm: AlgorithmIdentifierRef<'a>,
    pub signature: BitStringRef<'a>,
}

impl<'a> RawCertificate<'a> {
    pub fn from_der(der: &'a [u8]) -> der::Result<Self> {
        let mut reader = SliceReader::new(der)?;
        let header = Header::decode(&mut reader)?;
        header.tag.assert_eq(Tag::Sequence)?;
        if header.length != reader.remaining_len() {
            return Err(ErrorKind::Length { tag: Tag::Sequence }.into());
        }

        let tbs = reader.tlv_bytes()?;
        let signature_algorithm = AlgorithmIdentifierRef::decode(&mut reader)?;
        let signature = BitStringRef::decode(&mut reader)?;
        let (issuer, subject, spki) = split_tbs(tbs)?;

        reader.finish(Self {
            tbs,
            issuer,
            subject,
            spki,
            signature_algorithm,
            signature,
        })
    }
}

fn split_tbs(tbs: &[u8]) -> der::Result<(&[u8], &[u8], &[u8])> {
    let mut reader = SliceReader::new(tbs)?;
    Header::decode(&mut reader)?.tag.assert_eq(Tag::Sequence)?;
    if reader.peek_tag()? == VERSION_TAG {
        reader.tlv_bytes()?;
    }
    let _serial_number = reader.tlv_bytes()?;
    let _signature = reader.tlv_bytes()?;

    reader.peek_tag()?.assert_eq(Tag::Sequence)?;
    let issuer = reader.tlv_bytes()?;
    let _validity = reader.tlv_bytes()?;

    reader.peek_tag()?.assert_eq(Tag::Sequence)?;
    let subject = reader.tlv_bytes()?;

    reader.peek_tag()?.assert_eq(Tag::Sequence)?;
    let spki = reader.tlv_bytes()?;

    Ok((issuer, subject, spki))
}

/// RSASSA-PSS parameters as defined in RFC 4055.
///
/// ```text
/// RSASSA-PSS-params  ::=  SEQUENCE  {
///     hashAlgorithm      [0] HashAlgorithm DEFAULT sha1Identifier,
///     maskGenAlgorithm   [1] MaskGenAlgorithm DEFAULT mgf1SHA1Identifier,
///     saltLength         [2] INTEGER DEFAULT 20,
///     trailerField       [3] INTEGER DEFAULT 1  }
/// ```
///
/// Defaults are modeled as absent fields and resolved by the caller.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub(crate) struct RsaPssParams {
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub hash_algorithm: Option<AlgorithmIdentifierOwned>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    pub mask_gen_algorithm: Option<AlgorithmIdentifierOwned>,
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", optional = "true")]
    pub salt_length: Option<u32>,
    #[asn1(context_specific = "3", tag_mode = "EXPLICIT", optional = "true")]
    pub trailer_field: Option<u32>,
}
