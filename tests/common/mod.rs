#![allow(dead_code)]

use crt_bundle::CertView;

pub const RSA_ROOT: &[u8] = include_bytes!("../data/rsa_root.der");
pub const EC_ROOT: &[u8] = include_bytes!("../data/ec_root.der");
pub const P384_ROOT: &[u8] = include_bytes!("../data/p384_root.der");
/// Same subject as `EC_ROOT`, different key.
pub const IMPOSTER_ROOT: &[u8] = include_bytes!("../data/imposter.der");

pub const RSA_INTER: &[u8] = include_bytes!("../data/rsa_inter.der");
pub const PSS_INTER: &[u8] = include_bytes!("../data/pss_inter.der");
pub const EC_INTER: &[u8] = include_bytes!("../data/ec_inter.der");
pub const P384_INTER: &[u8] = include_bytes!("../data/p384_inter.der");
/// Signed with SHA-1 by `RSA_ROOT`, `RSA_ROOT` with default RSASSA-PSS parameters, and `EC_ROOT`.
pub const SHA1_RSA_INTER: &[u8] = include_bytes!("../data/sha1_rsa_inter.der");
pub const SHA1_PSS_INTER: &[u8] = include_bytes!("../data/sha1_pss_inter.der");
pub const SHA1_EC_INTER: &[u8] = include_bytes!("../data/sha1_ec_inter.der");
/// Issued by a root that is in no test bundle.
pub const STRAY_INTER: &[u8] = include_bytes!("../data/stray_inter.der");

pub fn view(der: &[u8]) -> CertView<'_> {
    CertView::from_der(der).unwrap()
}

/// Packs (name, key) pairs into a bundle, sorting by name the way the offline packer does.
pub fn pack(entries: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut entries = entries.to_vec();
    entries.sort();
    let mut blob = (entries.len() as u16).to_be_bytes().to_vec();
    for (name, key) in entries {
        blob.extend_from_slice(&(name.len() as u16).to_be_bytes());
        blob.extend_from_slice(&(key.len() as u16).to_be_bytes());
        blob.extend_from_slice(name);
        blob.extend_from_slice(key);
    }
    blob
}

/// Packs the subject and key of each root certificate.
pub fn pack_roots(roots: &[&[u8]]) -> Vec<u8> {
    let views: Vec<CertView<'_>> = roots.iter().map(|&der| view(der)).collect();
    let entries: Vec<(&[u8], &[u8])> = views.iter().map(|v| (v.subject_raw, v.spki_raw)).collect();
    pack(&entries)
}
