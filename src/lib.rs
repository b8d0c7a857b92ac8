//! A compact trust anchor store for TLS clients that cannot afford to keep a full set of root
//! certificates in memory.
//!
//! Instead of whole certificates, the store holds a packed bundle of (subject name,
//! SubjectPublicKeyInfo) pairs, presorted by subject name. When the TLS stack reports a chain
//! element that is not yet trusted, the verify hook looks up the element's issuer name in the
//! bundle and checks the element's signature with the matching root key.
//!
//! The bundle layout is big-endian with no magic or version:
//!
//! ```text
//! u16 num_certs
//! num_certs times:
//!   u16 name_len
//!   u16 key_len
//!   u8  name[name_len]   /* DER encoded subject Name */
//!   u8  key[key_len]     /* DER encoded SubjectPublicKeyInfo */
//! ```
//!
//! Typical use attaches the process-wide store to a TLS client configuration:
//!
//! ```
//! use crt_bundle::tls::ClientConfig;
//!
//! let mut config = ClientConfig::new();
//! crt_bundle::attach(&mut config)?;
//! assert!(config.ca_chain().is_some());
//! crt_bundle::detach(&mut config);
//! # Ok::<(), crt_bundle::Error>(())
//! ```

pub(crate) mod asn1;
pub mod bundle;
pub mod cert;
pub mod roots;
pub mod settings;
pub mod signature;
pub mod store;
pub mod tls;
mod verify;

use std::sync::{Arc, OnceLock};

use const_oid::ObjectIdentifier;

pub use bundle::{Bundle, Entry, BUNDLE_MAX_CERTS};
pub use cert::CertView;
pub use settings::BundleSettings;
pub use signature::{check_signature, MdType, PkType, PssOptions, PublicKey};
pub use store::{Anchor, AnchorStore};
pub use tls::{ClientConfig, DummyAnchor, SslConfig, VerifyHook};

/// `EINVAL` as returned at the C-style boundary.
pub const EINVAL: i32 = 22;
/// `E2BIG` as returned at the C-style boundary.
pub const E2BIG: i32 = 7;
/// `ENOMEM` as returned at the C-style boundary.
pub const ENOMEM: i32 = 12;

/// Errors raised while loading a bundle or verifying a certificate against it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The blob is too short, an entry overruns the blob, or the entry count is zero.
    #[error("invalid certificate bundle")]
    Malformed,
    /// The blob declares more entries than the configured limit.
    #[error("{found} certificates in bundle exceed the maximum of {max}")]
    TooMany { found: u16, max: u16 },
    /// The entry table could not be allocated.
    #[error("unable to allocate memory for bundle")]
    NoMemory,
    /// Entry `index` does not sort strictly after its predecessor.
    #[error("bundle entry {index} is out of order")]
    Unsorted { index: usize },
    #[error("no certificates in bundle")]
    NoBundle,
    #[error("issuer not found in bundle")]
    NotFound,
    #[error("failed to parse public key")]
    KeyParse,
    /// The anchor's key cannot produce signatures of the kind the certificate carries.
    #[error("public key cannot verify {0:?} signatures")]
    KeyMismatch(PkType),
    #[error("unsupported message digest {0:?}")]
    UnsupportedDigest(MdType),
    #[error("unsupported signature algorithm {0}")]
    UnsupportedAlgorithm(ObjectIdentifier),
    #[error("signature verification failed")]
    BadSignature,
    #[error(transparent)]
    Asn1(#[from] der::Error),
}

impl Error {
    /// Maps the error onto the integer codes used at the TLS stack boundary.
    ///
    /// Bundle loading failures become negative errno values. Everything else can only arise
    /// while verifying a certificate and becomes [`tls::X509_FATAL_ERROR`].
    pub fn code(&self) -> i32 {
        match self {
            Error::Malformed | Error::Unsorted { .. } => -EINVAL,
            Error::TooMany { .. } => -E2BIG,
            Error::NoMemory => -ENOMEM,
            _ => tls::X509_FATAL_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

static GLOBAL_STORE: OnceLock<Arc<AnchorStore>> = OnceLock::new();

/// Returns the process-wide store, creating it with the embedded default bundle on first use.
///
/// The bundle itself is only parsed once [`attach`] or [`set`] is called.
pub fn global() -> &'static Arc<AnchorStore> {
    GLOBAL_STORE.get_or_init(|| Arc::new(AnchorStore::new()))
}

/// Attaches the process-wide store to `config`, loading the embedded bundle if nothing has been
/// set yet.
pub fn attach<C: SslConfig + ?Sized>(config: &mut C) -> Result<()> {
    global().attach(config)
}

/// Clears the verify hook on `config` and releases the process-wide bundle.
pub fn detach<C: SslConfig + ?Sized>(config: &mut C) {
    global().detach(config)
}

/// Replaces the process-wide bundle with a copy of `blob`.
///
/// The previous bundle stays active if `blob` does not validate.
pub fn set(blob: &[u8]) -> Result<()> {
    global().install(blob.to_vec())
}

/// Same as [`set`] but borrows a blob that lives for the rest of the program.
pub fn set_static(blob: &'static [u8]) -> Result<()> {
    global().install(blob)
}
