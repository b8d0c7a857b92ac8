//! Decodes the packed certificate bundle into an indexable table of (subject name, public key)
//! entries.
//!
//! The layout mirrors what the offline packer emits:
//!
//! ```text
//! struct BUNDLE
//! {
//!   u2  num_certs     /* number of entries that follow */
//!   ENTRY entries[num_certs]
//! };
//!
//! struct ENTRY
//! {
//!   u2  name_len      /* length of name */
//!   u2  key_len       /* length of key */
//!   u1  name[]        /* DER encoded subject Name of the root */
//!   u1  key[]         /* DER encoded SubjectPublicKeyInfo of the root */
//! };
//! ```
//!
//! All integers are big-endian. Entries are sorted by `name`. Nothing past the last entry is
//! inspected.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;

use bincode::Options;
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::{BundleSettings, Error, Result};

/// Default limit on the number of entries in a bundle.
pub const BUNDLE_MAX_CERTS: u16 = 200;

pub(crate) const BUNDLE_HEADER_OFFSET: usize = 2;
pub(crate) const CRT_HEADER_OFFSET: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BundleHeader {
    pub num_certs: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EntryHeader {
    pub name_len: u16,
    pub key_len: u16,
}

impl EntryHeader {
    fn entry_len(&self) -> usize {
        CRT_HEADER_OFFSET + usize::from(self.name_len) + usize::from(self.key_len)
    }
}

/// Big-endian, fixed width, and tolerant of the bytes that follow each header.
pub(crate) fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// Location of one entry inside the blob.
#[derive(Clone, Copy, Debug)]
struct Slot {
    offset: usize,
    header: EntryHeader,
}

impl Slot {
    fn name_span(&self) -> Range<usize> {
        let start = self.offset + CRT_HEADER_OFFSET;
        start..start + usize::from(self.header.name_len)
    }

    fn key_span(&self) -> Range<usize> {
        let start = self.name_span().end;
        start..start + usize::from(self.header.key_len)
    }

    fn name<'a>(&self, blob: &'a [u8]) -> &'a [u8] {
        &blob[self.name_span()]
    }

    fn key<'a>(&self, blob: &'a [u8]) -> &'a [u8] {
        &blob[self.key_span()]
    }
}

/// One trust anchor: the DER subject name of a root and its DER SubjectPublicKeyInfo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry<'a> {
    pub name: &'a [u8],
    pub key: &'a [u8],
}

/// A validated bundle.
///
/// The blob is borrowed when it is `'static` (the embedded default) and owned otherwise. Entry
/// offsets are computed once at decode time, so every lookup probe is constant time.
pub struct Bundle {
    blob: Cow<'static, [u8]>,
    crts: Vec<Slot>,
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("len", &self.blob.len())
            .field("num_certs", &self.crts.len())
            .finish()
    }
}

impl Bundle {
    /// Validates `blob` with the default [`BundleSettings`].
    pub fn decode<B>(blob: B) -> Result<Self>
    where
        B: Into<Cow<'static, [u8]>>,
    {
        Self::decode_with(blob, &BundleSettings::default())
    }

    /// Validates `blob` and builds the entry table.
    ///
    /// Fails with [`Error::Malformed`] when the blob is shorter than a bundle header plus one
    /// entry header, declares zero entries, or has an entry running past its end;
    /// [`Error::TooMany`] when it declares more than `settings.max_certs` entries;
    /// [`Error::NoMemory`] when the entry table cannot be allocated; and [`Error::Unsorted`] when
    /// `settings.check_order` is set and names are not strictly ascending.
    pub fn decode_with<B>(blob: B, settings: &BundleSettings) -> Result<Self>
    where
        B: Into<Cow<'static, [u8]>>,
    {
        let blob = blob.into();
        let crts = index_entries(&blob, settings)?;
        debug!("{} certificates in bundle", crts.len());
        Ok(Self { blob, crts })
    }

    pub fn len(&self) -> usize {
        self.crts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crts.is_empty()
    }

    /// The blob the bundle was decoded from, trailing bytes included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }

    pub fn get(&self, index: usize) -> Option<Entry<'_>> {
        self.crts.get(index).map(|slot| self.entry(slot))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Entry<'_>> + '_ {
        self.crts.iter().map(|slot| self.entry(slot))
    }

    /// Binary search for the entry whose name is exactly `name`.
    ///
    /// Names compare bytewise over their common prefix and then by length, so an issuer that
    /// merely shares a prefix with a stored name never matches it.
    pub fn position(&self, name: &[u8]) -> Option<usize> {
        let mut start = 0;
        let mut end = self.crts.len();
        while start < end {
            let middle = start + (end - start) / 2;
            match self.crts[middle].name(&self.blob).cmp(name) {
                Ordering::Equal => {
                    debug!("found issuer at bundle index {middle}");
                    return Some(middle);
                }
                Ordering::Greater => end = middle,
                Ordering::Less => start = middle + 1,
            }
        }
        None
    }

    /// Byte ranges of the name and key of entry `index` within [`as_bytes`](Self::as_bytes).
    pub(crate) fn spans(&self, index: usize) -> Option<(Range<usize>, Range<usize>)> {
        self.crts
            .get(index)
            .map(|slot| (slot.name_span(), slot.key_span()))
    }

    pub fn find(&self, name: &[u8]) -> Option<Entry<'_>> {
        self.position(name).and_then(|index| self.get(index))
    }

    fn entry(&self, slot: &Slot) -> Entry<'_> {
        Entry {
            name: slot.name(&self.blob),
            key: slot.key(&self.blob),
        }
    }
}

fn index_entries(blob: &[u8], settings: &BundleSettings) -> Result<Vec<Slot>> {
    if blob.len() < BUNDLE_HEADER_OFFSET + CRT_HEADER_OFFSET {
        error!("Invalid certificate bundle: {} bytes is too short", blob.len());
        return Err(Error::Malformed);
    }

    let header: BundleHeader = match codec().deserialize(blob) {
        Ok(header) => header,
        Err(e) => {
            error!("Failed to parse bundle header: {e:?}");
            return Err(Error::Malformed);
        }
    };

    if header.num_certs > settings.max_certs {
        error!(
            "No. of certificates in the bundle = {} exceeds the maximum allowed = {}",
            header.num_certs, settings.max_certs
        );
        return Err(Error::TooMany {
            found: header.num_certs,
            max: settings.max_certs,
        });
    }
    if header.num_certs == 0 {
        error!("Invalid certificate bundle: no certificates");
        return Err(Error::Malformed);
    }

    let mut crts: Vec<Slot> = Vec::new();
    if let Err(e) = crts.try_reserve_exact(usize::from(header.num_certs)) {
        error!("Unable to allocate memory for bundle: {e:?}");
        return Err(Error::NoMemory);
    }

    let mut cur = BUNDLE_HEADER_OFFSET;
    for index in 0..usize::from(header.num_certs) {
        let rest = &blob[cur..];
        if rest.len() < CRT_HEADER_OFFSET {
            error!("Invalid certificate bundle: entry {index} header at offset {cur} is truncated");
            return Err(Error::Malformed);
        }
        let entry: EntryHeader = match codec().deserialize(rest) {
            Ok(entry) => entry,
            Err(e) => {
                error!("Failed to parse header of entry {index}: {e:?}");
                return Err(Error::Malformed);
            }
        };
        if rest.len() < entry.entry_len() {
            error!(
                "Invalid certificate bundle: entry {index} needs {} bytes, {} remain",
                entry.entry_len(),
                rest.len()
            );
            return Err(Error::Malformed);
        }

        let slot = Slot {
            offset: cur,
            header: entry,
        };
        if settings.check_order {
            if let Some(prev) = crts.last() {
                if prev.name(blob) >= slot.name(blob) {
                    error!("Invalid certificate bundle: entry {index} is out of order");
                    return Err(Error::Unsorted { index });
                }
            }
        }
        crts.push(slot);
        cur += entry.entry_len();
    }

    Ok(crts)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Packs `entries` in the order given.
    pub(crate) fn pack(entries: &[(&[u8], &[u8])]) -> Vec<u8> {
        let num_certs = u16::try_from(entries.len()).unwrap();
        let mut blob = codec().serialize(&BundleHeader { num_certs }).unwrap();
        for (name, key) in entries {
            let header = EntryHeader {
                name_len: u16::try_from(name.len()).unwrap(),
                key_len: u16::try_from(key.len()).unwrap(),
            };
            blob.extend(codec().serialize(&header).unwrap());
            blob.extend_from_slice(name);
            blob.extend_from_slice(key);
        }
        blob
    }

    #[test]
    fn header_layout_is_big_endian() {
        let bytes = codec()
            .serialize(&EntryHeader {
                name_len: 0x0102,
                key_len: 0x0304,
            })
            .unwrap();
        assert_eq!(vec![1, 2, 3, 4], bytes);
    }

    #[test]
    fn rejects_short_blobs() {
        assert!(matches!(Bundle::decode(vec![0x00, 0x00]), Err(Error::Malformed)));
        assert!(matches!(
            Bundle::decode(vec![0x00, 0x01, 0x00, 0x00, 0x00]),
            Err(Error::Malformed)
        ));
    }

    #[test]
    fn rejects_zero_certs() {
        assert!(matches!(Bundle::decode(vec![0u8; 6]), Err(Error::Malformed)));
    }

    #[test]
    fn one_cert() {
        let blob = vec![0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x41, 0x4B];
        let bundle = Bundle::decode(blob).unwrap();
        assert_eq!(1, bundle.len());
        assert_eq!(
            Some(Entry {
                name: b"A",
                key: b"K"
            }),
            bundle.find(b"A")
        );
        assert_eq!(None, bundle.find(b"B"));
    }

    #[test]
    fn two_sorted_certs() {
        let blob = pack(&[(b"A", b"K1"), (b"B", b"K2")]);
        let bundle = Bundle::decode(blob).unwrap();
        assert_eq!(Some(1), bundle.position(b"B"));
        assert_eq!(b"K2", bundle.find(b"B").unwrap().key);
        assert_eq!(Some(0), bundle.position(b"A"));
    }

    #[test]
    fn name_length_past_end() {
        let blob = vec![0x00, 0x01, 0x00, 0x05, 0x00, 0x01, 0x41, 0x4B];
        assert!(matches!(Bundle::decode(blob), Err(Error::Malformed)));
    }

    #[test]
    fn too_many() {
        let blob = vec![0x00, 0xC9, 0x00, 0x01, 0x00, 0x01, 0x41, 0x4B];
        match Bundle::decode(blob) {
            Err(Error::TooMany { found, max }) => {
                assert_eq!(201, found);
                assert_eq!(BUNDLE_MAX_CERTS, max);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn limit_is_inclusive() {
        let names: Vec<[u8; 2]> = (0u16..200).map(|i| i.to_be_bytes()).collect();
        let entries: Vec<(&[u8], &[u8])> = names.iter().map(|n| (&n[..], &b"key"[..])).collect();
        let bundle = Bundle::decode(pack(&entries)).unwrap();
        assert_eq!(200, bundle.len());

        let settings = BundleSettings {
            max_certs: 199,
            ..Default::default()
        };
        assert!(matches!(
            Bundle::decode_with(pack(&entries), &settings),
            Err(Error::TooMany { found: 200, max: 199 })
        ));
    }

    #[test]
    fn every_truncation_is_malformed() {
        let blob = pack(&[(b"Alpha", b"key-a"), (b"Beta", b""), (b"Gamma", b"key-gamma")]);
        assert!(Bundle::decode(blob.clone()).is_ok());
        for k in 0..blob.len() {
            assert!(
                matches!(Bundle::decode(blob[..k].to_vec()), Err(Error::Malformed)),
                "prefix of {k} bytes was accepted"
            );
        }
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut blob = pack(&[(b"A", b"K")]);
        blob.extend_from_slice(&[0xFF; 3]);
        let bundle = Bundle::decode(blob).unwrap();
        assert_eq!(1, bundle.len());
        assert_eq!(11, bundle.as_bytes().len());
    }

    #[test]
    fn prefixes_and_extensions_do_not_match() {
        let bundle =
            Bundle::decode(pack(&[(b"AB", b"K1"), (b"ABD", b"K2"), (b"B", b"K3")])).unwrap();
        assert_eq!(None, bundle.position(b"A"));
        assert_eq!(None, bundle.position(b"ABC"));
        assert_eq!(None, bundle.position(b"ABDE"));
        assert_eq!(None, bundle.position(b""));
        assert_eq!(Some(0), bundle.position(b"AB"));
        assert_eq!(Some(1), bundle.position(b"ABD"));
        assert_eq!(Some(2), bundle.position(b"B"));
    }

    #[test]
    fn order_check_is_opt_in() {
        let blob = pack(&[(b"B", b"K2"), (b"A", b"K1")]);
        assert!(Bundle::decode(blob.clone()).is_ok());

        let settings = BundleSettings {
            check_order: true,
            ..Default::default()
        };
        assert!(matches!(
            Bundle::decode_with(blob, &settings),
            Err(Error::Unsorted { index: 1 })
        ));

        let duplicate = pack(&[(b"A", b"K1"), (b"A", b"K2")]);
        assert!(matches!(
            Bundle::decode_with(duplicate, &settings),
            Err(Error::Unsorted { index: 1 })
        ));
    }

    #[test]
    fn error_codes() {
        assert_eq!(-crate::EINVAL, Error::Malformed.code());
        assert_eq!(-crate::E2BIG, Error::TooMany { found: 201, max: 200 }.code());
        assert_eq!(-crate::ENOMEM, Error::NoMemory.code());
    }
}
