//! Entity identities.
//!
//! An [`Identity`] names an entity independently of where it is stored. It is
//! derived deterministically from the data of one of four kinds:
//!
//! - **Local**: a store-local counter value
//! - **Managed**: an owner type plus the owner's native id
//! - **Relative**: a managed parent plus a relative path
//! - **External**: an opaque absolute URI
//!
//! Each identity carries a canonical URI computed by a [`UriSynthesizer`].
//! Equality and hashing use the kind data only, so two identities never compare
//! equal just because two different kinds happen to synthesize the same URI.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DataError, DataResult};

static ABSOLUTE_URI: OnceLock<Regex> = OnceLock::new();

/// Returns true if `uri` is an absolute URI (`scheme:rest`, no whitespace).
pub(crate) fn is_absolute_uri(uri: &str) -> bool {
    let re = ABSOLUTE_URI.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:[^\s]+$").expect("absolute URI pattern is valid")
    });
    re.is_match(uri)
}

fn require_non_empty(value: String, field: &'static str) -> DataResult<String> {
    if value.trim().is_empty() {
        return Err(DataError::EmptyField { field });
    }
    Ok(value)
}

/// Owner-type plus native-id key of a managed identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManagedKey {
    /// Type of the object that owns the entity.
    pub owner: String,
    /// The owner's own identifier for the entity.
    pub native_id: String,
}

impl ManagedKey {
    /// Creates a key, rejecting empty components.
    pub fn new(owner: impl Into<String>, native_id: impl Into<String>) -> DataResult<Self> {
        Ok(Self {
            owner: require_non_empty(owner.into(), "owner")?,
            native_id: require_non_empty(native_id.into(), "native_id")?,
        })
    }
}

/// The kind-specific data an identity is derived from.
///
/// Match on this instead of visiting: the four kinds are exhaustive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityKey {
    /// Store-local identity from a counter.
    Local {
        /// Counter value.
        counter: u64,
    },
    /// Identity of an entity owned by an external object.
    Managed(ManagedKey),
    /// Identity nested under a managed parent.
    Relative {
        /// Key of the managed parent.
        parent: ManagedKey,
        /// Path below the parent, without a leading slash.
        path: String,
    },
    /// Opaque absolute URI.
    External {
        /// The URI.
        uri: String,
    },
}

/// Discriminant of an [`IdentityKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// See [`IdentityKey::Local`].
    Local,
    /// See [`IdentityKey::Managed`].
    Managed,
    /// See [`IdentityKey::Relative`].
    Relative,
    /// See [`IdentityKey::External`].
    External,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Managed => write!(f, "managed"),
            Self::Relative => write!(f, "relative"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Maps identity data to a canonical URI.
///
/// Implementations must be pure: the same key always yields the same URI.
pub trait UriSynthesizer: Send + Sync {
    /// Synthesizes the canonical URI for `key`.
    fn synthesize(&self, key: &IdentityKey) -> String;
}

/// Default synthesizer producing `urn:` URIs.
///
/// Managed keys are hashed into a name-based (v5) UUID so owner and id strings
/// never need escaping.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrnSynthesizer;

impl UrnSynthesizer {
    const NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_8d3b_5e07_9a61_c4d2_b8e0_f315);

    fn managed_uri(key: &ManagedKey) -> String {
        let mut name = Vec::with_capacity(key.owner.len() + key.native_id.len() + 1);
        name.extend_from_slice(key.owner.as_bytes());
        name.push(0x1f);
        name.extend_from_slice(key.native_id.as_bytes());
        format!("urn:managed:{}", Uuid::new_v5(&Self::NAMESPACE, &name))
    }
}

impl UriSynthesizer for UrnSynthesizer {
    fn synthesize(&self, key: &IdentityKey) -> String {
        match key {
            IdentityKey::Local { counter } => format!("urn:local:{counter}"),
            IdentityKey::Managed(managed) => Self::managed_uri(managed),
            IdentityKey::Relative { parent, path } => {
                format!("{}/{path}", Self::managed_uri(parent))
            }
            IdentityKey::External { uri } => uri.clone(),
        }
    }
}

/// Immutable, structurally derived entity identity.
///
/// # Examples
///
/// ```
/// use entigraph::Identity;
///
/// let a = Identity::managed("Person", "42").unwrap();
/// let b = Identity::managed("Person", "42").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.uri(), b.uri());
/// ```
///
/// Identities serialize as their [`IdentityKey`]. Decoding validates the key and
/// recomputes the URI with [`UrnSynthesizer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "IdentityKey", into = "IdentityKey")]
pub struct Identity {
    key: IdentityKey,
    uri: Arc<str>,
}

impl Identity {
    /// Builds an identity from `key`, computing its URI with `synthesizer`.
    ///
    /// Validates the key first: empty components and non-absolute external URIs
    /// are rejected.
    pub fn from_key(key: IdentityKey, synthesizer: &dyn UriSynthesizer) -> DataResult<Self> {
        let key = match key {
            IdentityKey::Local { counter } => IdentityKey::Local { counter },
            IdentityKey::Managed(managed) => {
                IdentityKey::Managed(ManagedKey::new(managed.owner, managed.native_id)?)
            }
            IdentityKey::Relative { parent, path } => {
                let parent = ManagedKey::new(parent.owner, parent.native_id)?;
                let path = path.trim_start_matches('/').to_string();
                IdentityKey::Relative {
                    parent,
                    path: require_non_empty(path, "path")?,
                }
            }
            IdentityKey::External { uri } => {
                if !is_absolute_uri(&uri) {
                    return Err(DataError::InvalidUri { uri });
                }
                IdentityKey::External { uri }
            }
        };
        let uri = synthesizer.synthesize(&key);
        Ok(Self {
            key,
            uri: uri.into(),
        })
    }

    /// Creates a local identity from a counter value.
    #[must_use]
    pub fn local(counter: u64) -> Self {
        let key = IdentityKey::Local { counter };
        let uri = UrnSynthesizer.synthesize(&key);
        Self {
            key,
            uri: uri.into(),
        }
    }

    /// Creates a managed identity from an owner type and native id.
    pub fn managed(owner: impl Into<String>, native_id: impl Into<String>) -> DataResult<Self> {
        Self::from_key(
            IdentityKey::Managed(ManagedKey::new(owner, native_id)?),
            &UrnSynthesizer,
        )
    }

    /// Creates an identity nested under a managed `parent`.
    ///
    /// Fails with [`DataError::InvalidParent`] if `parent` is not a managed identity.
    pub fn relative(parent: &Identity, path: impl Into<String>) -> DataResult<Self> {
        let IdentityKey::Managed(parent_key) = &parent.key else {
            return Err(DataError::InvalidParent {
                parent: parent.clone(),
            });
        };
        Self::from_key(
            IdentityKey::Relative {
                parent: parent_key.clone(),
                path: path.into(),
            },
            &UrnSynthesizer,
        )
    }

    /// Creates an identity for an opaque absolute URI.
    pub fn external(uri: impl Into<String>) -> DataResult<Self> {
        Self::from_key(IdentityKey::External { uri: uri.into() }, &UrnSynthesizer)
    }

    /// Returns the kind data.
    #[must_use]
    pub const fn key(&self) -> &IdentityKey {
        &self.key
    }

    /// Returns the identity kind.
    #[must_use]
    pub const fn kind(&self) -> IdentityKind {
        match self.key {
            IdentityKey::Local { .. } => IdentityKind::Local,
            IdentityKey::Managed(_) => IdentityKind::Managed,
            IdentityKey::Relative { .. } => IdentityKind::Relative,
            IdentityKey::External { .. } => IdentityKind::External,
        }
    }

    /// Returns the canonical URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl TryFrom<IdentityKey> for Identity {
    type Error = DataError;

    fn try_from(key: IdentityKey) -> Result<Self, Self::Error> {
        Self::from_key(key, &UrnSynthesizer)
    }
}

impl From<Identity> for IdentityKey {
    fn from(identity: Identity) -> Self {
        identity.key
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.uri)
    }
}

/// Builds identities with a shared synthesizer and a local counter.
pub struct IdentityFactory {
    synthesizer: Box<dyn UriSynthesizer>,
    next_local: AtomicU64,
}

impl IdentityFactory {
    /// Creates a factory using `synthesizer`.
    #[must_use]
    pub fn new(synthesizer: impl UriSynthesizer + 'static) -> Self {
        Self {
            synthesizer: Box::new(synthesizer),
            next_local: AtomicU64::new(0),
        }
    }

    /// Returns a fresh local identity.
    pub fn next_local(&self) -> Identity {
        let counter = self.next_local.fetch_add(1, Ordering::Relaxed);
        let key = IdentityKey::Local { counter };
        let uri = self.synthesizer.synthesize(&key);
        Identity {
            key,
            uri: uri.into(),
        }
    }

    /// Creates a managed identity.
    pub fn managed(
        &self,
        owner: impl Into<String>,
        native_id: impl Into<String>,
    ) -> DataResult<Identity> {
        Identity::from_key(
            IdentityKey::Managed(ManagedKey::new(owner, native_id)?),
            self.synthesizer.as_ref(),
        )
    }

    /// Creates a relative identity under a managed `parent`.
    pub fn relative(&self, parent: &Identity, path: impl Into<String>) -> DataResult<Identity> {
        let IdentityKey::Managed(parent_key) = parent.key() else {
            return Err(DataError::InvalidParent {
                parent: parent.clone(),
            });
        };
        Identity::from_key(
            IdentityKey::Relative {
                parent: parent_key.clone(),
                path: path.into(),
            },
            self.synthesizer.as_ref(),
        )
    }

    /// Creates an external identity.
    pub fn external(&self, uri: impl Into<String>) -> DataResult<Identity> {
        Identity::from_key(
            IdentityKey::External { uri: uri.into() },
            self.synthesizer.as_ref(),
        )
    }
}

impl Default for IdentityFactory {
    fn default() -> Self {
        Self::new(UrnSynthesizer)
    }
}

impl fmt::Debug for IdentityFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityFactory")
            .field("next_local", &self.next_local.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managed_identity_is_deterministic() {
        let a = Identity::managed("Person", "42").unwrap();
        let b = Identity::managed("Person", "42").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.uri(), b.uri());
        assert!(a.uri().starts_with("urn:managed:"));
        assert_eq!(a.kind(), IdentityKind::Managed);
    }

    #[test]
    fn test_managed_identity_differs_by_component() {
        let a = Identity::managed("Person", "42").unwrap();
        let b = Identity::managed("Person", "43").unwrap();
        let c = Identity::managed("Place", "42").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.uri(), c.uri());
    }

    #[test]
    fn test_managed_key_separator_prevents_collisions() {
        let a = Identity::managed("ab", "c").unwrap();
        let b = Identity::managed("a", "bc").unwrap();
        assert_ne!(a.uri(), b.uri());
    }

    #[test]
    fn test_local_identity_uri() {
        let id = Identity::local(7);
        assert_eq!(id.uri(), "urn:local:7");
        assert_eq!(id, Identity::local(7));
        assert_ne!(id, Identity::local(8));
    }

    #[test]
    fn test_relative_identity() {
        let parent = Identity::managed("Person", "42").unwrap();
        let child = Identity::relative(&parent, "/address").unwrap();
        assert_eq!(child.kind(), IdentityKind::Relative);
        assert_eq!(child.uri(), format!("{}/address", parent.uri()));
        assert_eq!(child, Identity::relative(&parent, "address").unwrap());
    }

    #[test]
    fn test_relative_requires_managed_parent() {
        let parent = Identity::local(1);
        let err = Identity::relative(&parent, "x").unwrap_err();
        assert!(matches!(err, DataError::InvalidParent { .. }));
    }

    #[test]
    fn test_relative_rejects_empty_path() {
        let parent = Identity::managed("Person", "42").unwrap();
        let err = Identity::relative(&parent, "/").unwrap_err();
        assert!(matches!(err, DataError::EmptyField { field: "path" }));
    }

    #[test]
    fn test_external_identity_validates_uri() {
        let id = Identity::external("http://example.org/resource").unwrap();
        assert_eq!(id.uri(), "http://example.org/resource");
        assert!(Identity::external("not a uri").is_err());
        assert!(Identity::external("relative/path").is_err());
    }

    #[test]
    fn test_equality_ignores_uri_coincidence() {
        struct Constant;
        impl UriSynthesizer for Constant {
            fn synthesize(&self, _key: &IdentityKey) -> String {
                "urn:same".to_string()
            }
        }

        let a = Identity::from_key(IdentityKey::Local { counter: 1 }, &Constant).unwrap();
        let b = Identity::from_key(
            IdentityKey::External {
                uri: "urn:same".to_string(),
            },
            &Constant,
        )
        .unwrap();
        assert_eq!(a.uri(), b.uri());
        assert_ne!(a, b);
    }

    #[test]
    fn test_exhaustive_match_on_key() {
        let parent = Identity::managed("Person", "42").unwrap();
        let identities = [
            Identity::local(0),
            parent.clone(),
            Identity::relative(&parent, "a").unwrap(),
            Identity::external("urn:x:y").unwrap(),
        ];
        let kinds: Vec<&str> = identities
            .iter()
            .map(|id| match id.key() {
                IdentityKey::Local { .. } => "local",
                IdentityKey::Managed(_) => "managed",
                IdentityKey::Relative { .. } => "relative",
                IdentityKey::External { .. } => "external",
            })
            .collect();
        assert_eq!(kinds, ["local", "managed", "relative", "external"]);
    }

    #[test]
    fn test_factory_local_counter_advances() {
        let factory = IdentityFactory::default();
        let a = factory.next_local();
        let b = factory.next_local();
        assert_ne!(a, b);
        assert_eq!(a.uri(), "urn:local:0");
        assert_eq!(b.uri(), "urn:local:1");
    }

    #[test]
    fn test_identity_serde_roundtrip() {
        let id = Identity::managed("Person", "42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.contains("\"kind\":\"managed\""));
        let decoded: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, id);
        assert_eq!(decoded.uri(), id.uri());
    }

    #[test]
    fn test_identity_decode_recomputes_uri() {
        let decoded: Identity =
            serde_json::from_str(r#"{"kind":"local","counter":1,"uri":"urn:bogus"}"#).unwrap();
        assert_eq!(decoded, Identity::local(1));
        assert_eq!(decoded.uri(), "urn:local:1");
    }

    #[test]
    fn test_identity_decode_validates_key() {
        let empty_owner: Result<Identity, _> =
            serde_json::from_str(r#"{"kind":"managed","owner":"","native_id":"1"}"#);
        assert!(empty_owner.is_err());
        let bad_uri: Result<Identity, _> =
            serde_json::from_str(r#"{"kind":"external","uri":"not a uri"}"#);
        assert!(bad_uri.is_err());
        let relative: Identity = serde_json::from_str(
            r#"{"kind":"relative","parent":{"owner":"Person","native_id":"42"},"path":"/a"}"#,
        )
        .unwrap();
        let parent = Identity::managed("Person", "42").unwrap();
        assert_eq!(relative, Identity::relative(&parent, "a").unwrap());
    }
}
