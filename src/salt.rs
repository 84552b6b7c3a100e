//! Keyed, deterministic one-way hashing of sensitive values.
//!
//! A [`Salt`] owns a secret key and turns a value into an HMAC digest that is
//! stable for that key. Equal inputs produce equal digests, so entries can be
//! correlated without ever recording the input itself.
//!
//! The formatter never holds a key directly. It asks a [`SaltProvider`] for
//! one on every call, which lets key storage (lazy generation, persistence,
//! pre-warming) vary independently of formatting:
//!
//! - [`FixedSaltProvider`]: an already-built salt
//! - [`LazySaltProvider`]: loads or generates the key on first use
//! - any `Fn() -> Result<Arc<Salt>>` closure

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::error::{Error, ErrorKind, Result};
use crate::secret::Secret;

/// Length in bytes of generated salt keys.
pub const KEY_LENGTH: usize = 32;

/// HMAC construction used to salt values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HmacType {
    /// HMAC-SHA-256
    #[default]
    Sha256,
    /// HMAC-SHA-512
    Sha512,
}

impl HmacType {
    /// Returns the identifier prefixed to identified digests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "hmac-sha256",
            Self::Sha512 => "hmac-sha512",
        }
    }
}

impl fmt::Display for HmacType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a salt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaltConfig {
    /// HMAC construction
    pub hmac: HmacType,
}

#[derive(Clone)]
enum KeyedMac {
    Sha256(Hmac<Sha256>),
    Sha512(Hmac<Sha512>),
}

impl KeyedMac {
    fn new(hmac: HmacType, key: &[u8]) -> Result<Self> {
        let keyed = match hmac {
            HmacType::Sha256 => Hmac::<Sha256>::new_from_slice(key).map(Self::Sha256),
            HmacType::Sha512 => Hmac::<Sha512>::new_from_slice(key).map(Self::Sha512),
        };
        keyed.map_err(|_| Error::salt_unavailable("salt key rejected by HMAC"))
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        // Each call works on a clone of the keyed state, so `Salt` stays
        // immutable and shareable across threads.
        match self.clone() {
            Self::Sha256(mut mac) => {
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            Self::Sha512(mut mac) => {
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }
}

/// A secret key plus the functions that salt values with it.
///
/// # Examples
///
/// ```
/// use audit_core::salt::{Salt, SaltConfig};
///
/// let salt = Salt::new(b"0123456789abcdef".to_vec(), SaltConfig::default()).unwrap();
///
/// let a = salt.get_identified_hmac("s.client-token");
/// let b = salt.get_identified_hmac("s.client-token");
/// assert_eq!(a, b);
/// assert!(a.starts_with("hmac-sha256:"));
/// assert!(!a.contains("client-token"));
/// ```
pub struct Salt {
    key: Secret<Vec<u8>>,
    mac: KeyedMac,
    config: SaltConfig,
    generated: bool,
}

impl Salt {
    /// Builds a salt from existing key material.
    ///
    /// # Errors
    ///
    /// Returns `SaltUnavailable` if the key is empty.
    pub fn new(key: Vec<u8>, config: SaltConfig) -> Result<Self> {
        Self::from_parts(key, config, false)
    }

    /// Builds a salt around a freshly generated random key.
    pub fn generate(config: SaltConfig) -> Result<Self> {
        let mut key = vec![0u8; KEY_LENGTH];
        rand::thread_rng()
            .try_fill_bytes(&mut key)
            .map_err(|e| {
                Error::with_source(ErrorKind::SaltUnavailable, "failed to generate salt key", e)
            })?;
        Self::from_parts(key, config, true)
    }

    fn from_parts(key: Vec<u8>, config: SaltConfig, generated: bool) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::salt_unavailable("salt key is empty"));
        }
        let mac = KeyedMac::new(config.hmac, &key)?;
        Ok(Self {
            key: Secret::new(key),
            mac,
            config,
            generated,
        })
    }

    /// Returns the salt parameters.
    pub fn config(&self) -> SaltConfig {
        self.config
    }

    /// Returns `true` if the key was generated rather than loaded.
    pub fn did_generate(&self) -> bool {
        self.generated
    }

    /// Returns the lowercase hex HMAC of `data`.
    pub fn get_hmac(&self, data: &str) -> String {
        hex::encode(self.mac.digest(data.as_bytes()))
    }

    /// Returns the HMAC of `data` prefixed with the HMAC type, e.g.
    /// `hmac-sha256:5c0d…`.
    pub fn get_identified_hmac(&self, data: &str) -> String {
        format!("{}:{}", self.config.hmac, self.get_hmac(data))
    }

    /// Returns a keyed identifier for `id`: the hex SHA-256 of key ‖ id.
    pub fn salt_id(&self, id: &str) -> String {
        let digest = Sha256::new()
            .chain_update(self.key.expose_secret())
            .chain_update(id.as_bytes())
            .finalize();
        hex::encode(digest)
    }

    pub(crate) fn key(&self) -> &Secret<Vec<u8>> {
        &self.key
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Salt")
            .field("key", &self.key)
            .field("config", &self.config)
            .field("generated", &self.generated)
            .finish()
    }
}

/// Source of the current salt.
///
/// Implementations must be safe to call concurrently; the formatter does not
/// serialize access. A call may block on I/O the first time a key is resolved.
pub trait SaltProvider: Send + Sync {
    /// Returns the current salt.
    ///
    /// # Errors
    ///
    /// Returns `SaltUnavailable` if no key can be supplied.
    fn salt(&self) -> Result<Arc<Salt>>;
}

impl<F> SaltProvider for F
where
    F: Fn() -> Result<Arc<Salt>> + Send + Sync,
{
    fn salt(&self) -> Result<Arc<Salt>> {
        self()
    }
}

/// Provider that always returns the same, already-built salt.
#[derive(Debug, Clone)]
pub struct FixedSaltProvider {
    salt: Arc<Salt>,
}

impl FixedSaltProvider {
    /// Wraps a salt.
    pub fn new(salt: Salt) -> Self {
        Self {
            salt: Arc::new(salt),
        }
    }

    /// Builds a provider around the given key bytes.
    pub fn from_key(key: impl Into<Vec<u8>>, config: SaltConfig) -> Result<Self> {
        Salt::new(key.into(), config).map(Self::new)
    }
}

impl SaltProvider for FixedSaltProvider {
    fn salt(&self) -> Result<Arc<Salt>> {
        Ok(Arc::clone(&self.salt))
    }
}

/// Storage for the salt key.
///
/// This is the seam to whatever persists keys across restarts. Errors
/// returned here surface to formatter callers as `SaltUnavailable`.
pub trait SaltKeyStore: Send + Sync {
    /// Loads the stored key, `None` if no key has been stored yet.
    fn load(&self) -> Result<Option<Vec<u8>>>;

    /// Persists a newly generated key.
    fn store(&self, key: &[u8]) -> Result<()>;
}

/// Process-local key store.
#[derive(Default)]
pub struct MemoryKeyStore {
    key: Mutex<Option<Secret<Vec<u8>>>>,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `key`.
    pub fn with_key(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: Mutex::new(Some(Secret::new(key.into()))),
        }
    }

    /// Returns `true` if a key has been stored.
    pub fn has_key(&self) -> bool {
        self.key.lock().map(|k| k.is_some()).unwrap_or(false)
    }
}

impl fmt::Debug for MemoryKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryKeyStore")
            .field("has_key", &self.has_key())
            .finish()
    }
}

impl SaltKeyStore for MemoryKeyStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        let guard = self
            .key
            .lock()
            .map_err(|_| Error::salt_unavailable("key store lock poisoned"))?;
        Ok(guard.as_ref().map(|k| k.expose_secret().clone()))
    }

    fn store(&self, key: &[u8]) -> Result<()> {
        let mut guard = self
            .key
            .lock()
            .map_err(|_| Error::salt_unavailable("key store lock poisoned"))?;
        *guard = Some(Secret::new(key.to_vec()));
        Ok(())
    }
}

/// Provider that resolves its key on first use and caches the salt.
///
/// On first call the key is loaded from the store; if the store is empty a
/// new key is generated and persisted. Concurrent first calls resolve to a
/// single key. A failed resolution is not cached, so the next call retries.
///
/// # Examples
///
/// ```
/// use audit_core::salt::{LazySaltProvider, MemoryKeyStore, SaltConfig, SaltProvider};
///
/// let provider = LazySaltProvider::new(MemoryKeyStore::new(), SaltConfig::default());
/// provider.warm().unwrap();
///
/// let first = provider.salt().unwrap();
/// let second = provider.salt().unwrap();
/// assert_eq!(first.get_hmac("x"), second.get_hmac("x"));
/// assert!(first.did_generate());
/// ```
pub struct LazySaltProvider<S> {
    store: S,
    config: SaltConfig,
    cached: RwLock<Option<Arc<Salt>>>,
}

impl<S: SaltKeyStore> LazySaltProvider<S> {
    /// Creates a provider backed by `store`.
    pub fn new(store: S, config: SaltConfig) -> Self {
        Self {
            store,
            config,
            cached: RwLock::new(None),
        }
    }

    /// Resolves the key now so later format calls never block on the store.
    pub fn warm(&self) -> Result<()> {
        self.salt().map(|_| ())
    }

    /// Returns the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn resolve(&self) -> Result<Arc<Salt>> {
        let loaded = self.store.load().map_err(|e| {
            Error::with_source(ErrorKind::SaltUnavailable, "failed to load salt key", e)
        })?;

        let salt = match loaded {
            Some(key) => {
                let salt = Salt::new(key, self.config)?;
                tracing::debug!(
                    target: "audit_core::salt",
                    hmac = %self.config.hmac,
                    "loaded salt key from store"
                );
                salt
            }
            None => {
                let salt = Salt::generate(self.config)?;
                self.store.store(salt.key().expose_secret()).map_err(|e| {
                    Error::with_source(ErrorKind::SaltUnavailable, "failed to persist salt key", e)
                })?;
                tracing::debug!(
                    target: "audit_core::salt",
                    hmac = %self.config.hmac,
                    "generated new salt key"
                );
                salt
            }
        };

        Ok(Arc::new(salt))
    }
}

impl<S: SaltKeyStore> SaltProvider for LazySaltProvider<S> {
    fn salt(&self) -> Result<Arc<Salt>> {
        {
            let cached = self
                .cached
                .read()
                .map_err(|_| Error::salt_unavailable("salt cache lock poisoned"))?;
            if let Some(salt) = cached.as_ref() {
                return Ok(Arc::clone(salt));
            }
        }

        let mut cached = self
            .cached
            .write()
            .map_err(|_| Error::salt_unavailable("salt cache lock poisoned"))?;
        // Another caller may have resolved the key while we waited.
        if let Some(salt) = cached.as_ref() {
            return Ok(Arc::clone(salt));
        }

        let salt = self.resolve()?;
        *cached = Some(Arc::clone(&salt));
        Ok(salt)
    }
}

impl<S> fmt::Debug for LazySaltProvider<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved = self.cached.read().map(|c| c.is_some()).unwrap_or(false);
        f.debug_struct("LazySaltProvider")
            .field("config", &self.config)
            .field("resolved", &resolved)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_salt() -> Salt {
        Salt::new(b"fixed-test-key-0123456789".to_vec(), SaltConfig::default()).unwrap()
    }

    struct FailingStore;

    impl SaltKeyStore for FailingStore {
        fn load(&self) -> Result<Option<Vec<u8>>> {
            Err(Error::new(ErrorKind::SaltUnavailable, "storage offline"))
        }

        fn store(&self, _key: &[u8]) -> Result<()> {
            Err(Error::new(ErrorKind::SaltUnavailable, "storage offline"))
        }
    }

    struct FlakyStore {
        attempts: AtomicUsize,
        inner: MemoryKeyStore,
    }

    impl SaltKeyStore for FlakyStore {
        fn load(&self) -> Result<Option<Vec<u8>>> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(Error::new(ErrorKind::SaltUnavailable, "transient"));
            }
            self.inner.load()
        }

        fn store(&self, key: &[u8]) -> Result<()> {
            self.inner.store(key)
        }
    }

    #[test]
    fn hmac_is_deterministic() {
        let salt = test_salt();
        assert_eq!(salt.get_hmac("foo"), salt.get_hmac("foo"));
        assert_ne!(salt.get_hmac("foo"), salt.get_hmac("bar"));
    }

    #[test]
    fn hmac_depends_on_key() {
        let a = Salt::new(b"key-a".to_vec(), SaltConfig::default()).unwrap();
        let b = Salt::new(b"key-b".to_vec(), SaltConfig::default()).unwrap();
        assert_ne!(a.get_hmac("foo"), b.get_hmac("foo"));
    }

    #[test]
    fn hmac_matches_reference_construction() {
        let salt = Salt::new(b"key".to_vec(), SaltConfig::default()).unwrap();
        // Well-known HMAC-SHA-256 test vector.
        let mut mac = Hmac::<Sha256>::new_from_slice(b"key").unwrap();
        mac.update(b"The quick brown fox jumps over the lazy dog");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(
            salt.get_hmac("The quick brown fox jumps over the lazy dog"),
            expected
        );
        assert_eq!(
            expected,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn identified_hmac_carries_type() {
        let sha256 = test_salt();
        assert!(sha256.get_identified_hmac("v").starts_with("hmac-sha256:"));

        let sha512 = Salt::new(
            b"k".to_vec(),
            SaltConfig {
                hmac: HmacType::Sha512,
            },
        )
        .unwrap();
        let digest = sha512.get_identified_hmac("v");
        assert!(digest.starts_with("hmac-sha512:"));
        assert_eq!(digest.len(), "hmac-sha512:".len() + 128);
    }

    #[test]
    fn salt_id_is_keyed() {
        let a = Salt::new(b"key-a".to_vec(), SaltConfig::default()).unwrap();
        let b = Salt::new(b"key-b".to_vec(), SaltConfig::default()).unwrap();
        assert_eq!(a.salt_id("req-1"), a.salt_id("req-1"));
        assert_ne!(a.salt_id("req-1"), b.salt_id("req-1"));
        assert_eq!(a.salt_id("req-1").len(), 64);
    }

    #[test]
    fn empty_key_is_rejected() {
        let err = Salt::new(Vec::new(), SaltConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SaltUnavailable);
    }

    #[test]
    fn generated_keys_differ() {
        let a = Salt::generate(SaltConfig::default()).unwrap();
        let b = Salt::generate(SaltConfig::default()).unwrap();
        assert!(a.did_generate());
        assert_eq!(a.key().len(), KEY_LENGTH);
        assert_ne!(a.get_hmac("x"), b.get_hmac("x"));
    }

    #[test]
    fn debug_never_shows_key() {
        let salt = Salt::new(b"super-secret-key".to_vec(), SaltConfig::default()).unwrap();
        let debug = format!("{:?}", salt);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret-key"));
    }

    #[test]
    fn closure_is_a_provider() {
        let salt = Arc::new(test_salt());
        let provider = move || -> Result<Arc<Salt>> { Ok(Arc::clone(&salt)) };
        assert!(provider.salt().is_ok());
    }

    #[test]
    fn lazy_provider_generates_and_persists() {
        let provider = LazySaltProvider::new(MemoryKeyStore::new(), SaltConfig::default());
        assert!(!provider.store().has_key());

        let salt = provider.salt().unwrap();
        assert!(salt.did_generate());
        assert!(provider.store().has_key());

        let again = provider.salt().unwrap();
        assert!(Arc::ptr_eq(&salt, &again));
    }

    #[test]
    fn lazy_provider_loads_existing_key() {
        let provider = LazySaltProvider::new(
            MemoryKeyStore::with_key(b"persisted-key".to_vec()),
            SaltConfig::default(),
        );
        let salt = provider.salt().unwrap();
        let expected = Salt::new(b"persisted-key".to_vec(), SaltConfig::default()).unwrap();

        assert!(!salt.did_generate());
        assert_eq!(salt.get_hmac("foo"), expected.get_hmac("foo"));
    }

    #[test]
    fn lazy_provider_surfaces_store_failure() {
        let provider = LazySaltProvider::new(FailingStore, SaltConfig::default());
        let err = provider.salt().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SaltUnavailable);
        assert!(provider.warm().is_err());
    }

    #[test]
    fn lazy_provider_retries_after_failure() {
        let provider = LazySaltProvider::new(
            FlakyStore {
                attempts: AtomicUsize::new(0),
                inner: MemoryKeyStore::new(),
            },
            SaltConfig::default(),
        );
        assert!(provider.salt().is_err());
        assert!(provider.salt().is_ok());
    }

    #[test]
    fn lazy_provider_resolves_one_key_under_contention() {
        let provider = LazySaltProvider::new(MemoryKeyStore::new(), SaltConfig::default());

        let digests: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| provider.salt().unwrap().get_hmac("same")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(digests.windows(2).all(|w| w[0] == w[1]));
    }
}
