//! Holds the active bundle and attaches it to TLS client configurations.

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use log::{error, info};
use parking_lot::RwLock;

use crate::roots::default_bundle;
use crate::tls::{DummyAnchor, SslConfig, VerifyHook};
use crate::{Bundle, BundleSettings, Error, Result};

/// A trust anchor found by [`AnchorStore::lookup`].
///
/// Keeps the bundle it came from alive, so it remains usable after the store switches bundles.
#[derive(Clone, Debug)]
pub struct Anchor {
    bundle: Arc<Bundle>,
    index: usize,
    name: Range<usize>,
    key: Range<usize>,
}

impl Anchor {
    pub fn index(&self) -> usize {
        self.index
    }

    /// DER subject name of the root.
    pub fn name(&self) -> &[u8] {
        &self.bundle.as_bytes()[self.name.clone()]
    }

    /// DER SubjectPublicKeyInfo of the root.
    pub fn key(&self) -> &[u8] {
        &self.bundle.as_bytes()[self.key.clone()]
    }
}

/// Owner of at most one active [`Bundle`].
///
/// Replacing the bundle publishes the new one under a write lock. Readers only hold the lock long
/// enough to clone an `Arc`, so a bundle being used by an in-flight verification is released when
/// that verification finishes rather than when it is replaced.
pub struct AnchorStore {
    settings: BundleSettings,
    default_bundle: &'static [u8],
    current: RwLock<Option<Arc<Bundle>>>,
    dummy: Arc<DummyAnchor>,
}

impl fmt::Debug for AnchorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnchorStore")
            .field("settings", &self.settings)
            .field("default_bundle_len", &self.default_bundle.len())
            .field("current", &*self.current.read())
            .finish()
    }
}

impl Default for AnchorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnchorStore {
    /// An empty store that falls back to the bundle compiled into the crate.
    pub fn new() -> Self {
        Self::with_settings(BundleSettings::default())
    }

    pub fn with_settings(settings: BundleSettings) -> Self {
        Self {
            settings,
            default_bundle: default_bundle(),
            current: RwLock::new(None),
            dummy: Arc::new(DummyAnchor::default()),
        }
    }

    /// Replaces the bundle loaded by [`ensure_installed`](Self::ensure_installed) and
    /// [`attach`](Self::attach) when nothing has been installed.
    pub fn with_default_bundle(mut self, blob: &'static [u8]) -> Self {
        self.default_bundle = blob;
        self
    }

    pub fn settings(&self) -> &BundleSettings {
        &self.settings
    }

    /// Validates `blob` and makes it the active bundle.
    ///
    /// On failure the previously active bundle, if any, stays in place and the decoder's error is
    /// returned.
    pub fn install<B>(&self, blob: B) -> Result<()>
    where
        B: Into<Cow<'static, [u8]>>,
    {
        let bundle = Arc::new(Bundle::decode_with(blob, &self.settings)?);
        info!("Installed certificate bundle with {} certificates", bundle.len());
        // The previous bundle is dropped here, or later by whoever still holds a snapshot.
        let _previous = self.current.write().replace(bundle);
        Ok(())
    }

    /// Installs the default bundle unless a bundle is already active.
    pub fn ensure_installed(&self) -> Result<()> {
        let mut current = self.current.write();
        if current.is_none() {
            let bundle = Bundle::decode_with(self.default_bundle, &self.settings).map_err(|e| {
                error!("Failed to load default certificate bundle: {e}");
                e
            })?;
            info!("Loaded default certificate bundle with {} certificates", bundle.len());
            *current = Some(Arc::new(bundle));
        }
        Ok(())
    }

    /// Points `config` at this store.
    ///
    /// Loads the default bundle if none is installed, sets the placeholder CA chain, and
    /// registers the store as the verify hook.
    pub fn attach<C>(self: &Arc<Self>, config: &mut C) -> Result<()>
    where
        C: SslConfig + ?Sized,
    {
        self.ensure_installed()?;
        config.set_ca_chain(Some(self.dummy.clone()));
        let hook: Arc<dyn VerifyHook> = self.clone();
        config.set_verify(Some(hook));
        Ok(())
    }

    /// Clears the verify hook on `config` and releases the active bundle.
    pub fn detach<C>(&self, config: &mut C)
    where
        C: SslConfig + ?Sized,
    {
        self.release();
        config.set_verify(None);
    }

    /// Releases the active bundle without touching any configuration.
    pub fn release(&self) {
        self.current.write().take();
    }

    pub fn is_installed(&self) -> bool {
        self.current.read().is_some()
    }

    /// The active bundle, if any.
    pub fn snapshot(&self) -> Option<Arc<Bundle>> {
        self.current.read().clone()
    }

    /// The placeholder chain handed to configurations by [`attach`](Self::attach).
    pub fn dummy_anchor(&self) -> &Arc<DummyAnchor> {
        &self.dummy
    }

    /// Finds the anchor whose subject name is exactly `issuer`.
    pub fn lookup(&self, issuer: &[u8]) -> Result<Anchor> {
        let bundle = self.snapshot().ok_or(Error::NoBundle)?;
        let (index, (name, key)) = bundle
            .position(issuer)
            .and_then(|index| bundle.spans(index).map(|spans| (index, spans)))
            .ok_or(Error::NotFound)?;
        Ok(Anchor {
            bundle,
            index,
            name,
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::tests::pack;
    use crate::tls::ClientConfig;

    const NAMES: [&[u8]; 4] = [b"Alpha", b"Bravo", b"Charlie", b"Delta"];

    fn store_with(entries: &[(&[u8], &[u8])]) -> AnchorStore {
        let store = AnchorStore::new();
        store.install(pack(entries)).unwrap();
        store
    }

    #[test]
    fn lookup_without_bundle() {
        let store = AnchorStore::new();
        assert!(!store.is_installed());
        assert!(matches!(store.lookup(b"A"), Err(Error::NoBundle)));
    }

    #[test]
    fn lookup_returns_spans() {
        let store = store_with(&[(b"A", b"K")]);
        let anchor = store.lookup(b"A").unwrap();
        assert_eq!(b"A", anchor.name());
        assert_eq!(b"K", anchor.key());
        assert!(matches!(store.lookup(b"B"), Err(Error::NotFound)));
    }

    #[test]
    fn anchors_resolve_to_their_own_entry() {
        let store = store_with(&[
            (NAMES[0], b"k0"),
            (NAMES[1], b"key-1"),
            (NAMES[2], b""),
            (NAMES[3], b"k3"),
        ]);
        let bundle = store.snapshot().unwrap();
        for name in NAMES {
            let anchor = store.lookup(name).unwrap();
            let entry = bundle.get(anchor.index()).unwrap();
            assert_eq!(entry.name, anchor.name());
            assert_eq!(entry.key, anchor.key());
            assert_eq!(name, anchor.name());
        }
        assert_eq!(b"key-1", store.lookup(NAMES[1]).unwrap().key());
        assert!(store.lookup(NAMES[2]).unwrap().key().is_empty());
    }

    #[test]
    fn failed_install_keeps_previous_bundle() {
        let store = store_with(&[
            (NAMES[0], b"k0"),
            (NAMES[1], b"k1"),
            (NAMES[2], b"k2"),
            (NAMES[3], b"k3"),
        ]);
        let before: Vec<_> = NAMES
            .iter()
            .chain([&b"Echo"[..]].iter())
            .map(|n| store.lookup(n).map(|a| a.key().to_vec()).ok())
            .collect();

        assert!(matches!(store.install(vec![0x00, 0x01]), Err(Error::Malformed)));
        assert!(matches!(
            store.install(vec![0x00, 0xC9, 0, 1, 0, 1, b'A', b'K']),
            Err(Error::TooMany { .. })
        ));

        let after: Vec<_> = NAMES
            .iter()
            .chain([&b"Echo"[..]].iter())
            .map(|n| store.lookup(n).map(|a| a.key().to_vec()).ok())
            .collect();
        assert_eq!(before, after);
        assert_eq!(Some(b"k2".to_vec()), after[2]);
        assert_eq!(None, after[4]);
    }

    #[test]
    fn anchors_outlive_replacement() {
        let store = store_with(&[(b"A", b"old")]);
        let anchor = store.lookup(b"A").unwrap();
        store.install(pack(&[(b"A", b"new")])).unwrap();
        assert_eq!(b"old", anchor.key());
        assert_eq!(b"new", store.lookup(b"A").unwrap().key());
    }

    #[test]
    fn attach_loads_default_once() {
        let store = Arc::new(AnchorStore::new());
        let mut config = ClientConfig::new();
        store.attach(&mut config).unwrap();
        assert!(store.is_installed());
        assert!(config.has_verify_hook());
        assert!(Arc::ptr_eq(store.dummy_anchor(), config.ca_chain().unwrap()));

        // a user supplied bundle is not overwritten by a later attach
        store.install(pack(&[(b"A", b"K")])).unwrap();
        store.attach(&mut ClientConfig::new()).unwrap();
        assert_eq!(1, store.snapshot().unwrap().len());
    }

    #[test]
    fn attach_fails_with_bad_default() {
        static BROKEN: [u8; 3] = [0x00, 0x01, 0x00];
        let store = Arc::new(AnchorStore::new().with_default_bundle(&BROKEN));
        let mut config = ClientConfig::new();
        assert_eq!(-crate::EINVAL, store.attach(&mut config).unwrap_err().code());
        assert!(!config.has_verify_hook());
        assert!(config.ca_chain().is_none());
    }

    #[test]
    fn detach_releases_bundle() {
        let store = Arc::new(AnchorStore::new());
        let mut config = ClientConfig::new();
        store.attach(&mut config).unwrap();
        store.detach(&mut config);
        assert!(!store.is_installed());
        assert!(!config.has_verify_hook());
    }
}
