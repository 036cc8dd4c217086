//! Property values.
//!
//! A property value is either a [`Literal`] scalar or an [`EntityRef`]
//! pointing at another entity. Properties are keyed by [`Predicate`] URIs.

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DataError, DataResult};
use crate::identity::{is_absolute_uri, Identity};

/// Absolute URI naming a property.
///
/// # Examples
///
/// ```
/// use entigraph::Predicate;
///
/// let name = Predicate::new("http://xmlns.com/foaf/0.1/name").unwrap();
/// assert_eq!(name.as_str(), "http://xmlns.com/foaf/0.1/name");
/// assert!(Predicate::new("name").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Predicate(Arc<str>);

impl Predicate {
    /// Creates a predicate, rejecting anything but an absolute URI.
    pub fn new(uri: impl Into<String>) -> DataResult<Self> {
        let uri = uri.into();
        if !is_absolute_uri(&uri) {
            return Err(DataError::InvalidUri { uri });
        }
        Ok(Self(uri.into()))
    }

    /// Returns the predicate URI.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Predicate {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Predicate> for String {
    fn from(value: Predicate) -> Self {
        value.0.to_string()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// Scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 string
    String(String),
}

impl Literal {
    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }

    /// Returns the string payload, if this is a string literal.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

#[derive(Clone)]
enum Target {
    /// The reference keeps its target alive.
    Owned(Arc<dyn Entity>),
    /// The target is owned elsewhere, normally by a datasource.
    Linked(Weak<dyn Entity>),
}

/// Reference to another entity, used as a property value.
///
/// References created by callers own their target. References stored inside a
/// datasource are links to surrogates the datasource owns, so cyclic graphs in a
/// store never keep themselves alive. Two references are equal when their
/// targets share an identity.
#[derive(Clone)]
pub struct EntityRef {
    identity: Identity,
    target: Target,
}

impl EntityRef {
    /// Creates a reference that keeps `entity` alive.
    pub fn new(entity: Arc<dyn Entity>) -> Self {
        Self {
            identity: entity.identity().clone(),
            target: Target::Owned(entity),
        }
    }

    /// Creates a non-owning link to `entity`.
    pub(crate) fn linked(entity: &Arc<dyn Entity>) -> Self {
        Self {
            identity: entity.identity().clone(),
            target: Target::Linked(Arc::downgrade(entity)),
        }
    }

    /// Returns the identity of the referenced entity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the referenced entity, or `None` if a linked target was dropped.
    #[must_use]
    pub fn resolve(&self) -> Option<Arc<dyn Entity>> {
        match &self.target {
            Target::Owned(entity) => Some(Arc::clone(entity)),
            Target::Linked(weak) => weak.upgrade(),
        }
    }

    /// Like [`resolve`](Self::resolve), failing with [`DataError::DanglingReference`].
    pub fn try_resolve(&self) -> DataResult<Arc<dyn Entity>> {
        self.resolve().ok_or_else(|| DataError::DanglingReference {
            identity: self.identity.clone(),
        })
    }

    /// Returns true if this reference does not own its target.
    #[must_use]
    pub const fn is_linked(&self) -> bool {
        matches!(self.target, Target::Linked(_))
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("identity", &self.identity)
            .field("linked", &self.is_linked())
            .finish()
    }
}

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A scalar.
    Literal(Literal),
    /// A reference to another entity.
    Entity(EntityRef),
}

impl Value {
    /// Creates a literal value.
    pub fn literal(literal: impl Into<Literal>) -> Self {
        Self::Literal(literal.into())
    }

    /// Creates an entity value that keeps `entity` alive.
    pub fn entity(entity: Arc<dyn Entity>) -> Self {
        Self::Entity(EntityRef::new(entity))
    }

    /// Returns true for scalar values.
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Returns true for entity references.
    pub const fn is_entity(&self) -> bool {
        matches!(self, Self::Entity(_))
    }

    /// Returns the scalar, if this is one.
    pub const fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(v) => Some(v),
            Self::Entity(_) => None,
        }
    }

    /// Returns the entity reference, if this is one.
    pub const fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Self::Entity(v) => Some(v),
            Self::Literal(_) => None,
        }
    }

    /// Returns true if this is an entity value referencing `identity`.
    #[must_use]
    pub fn references(&self, identity: &Identity) -> bool {
        self.as_entity().is_some_and(|r| r.identity() == identity)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v}"),
            Self::Entity(v) => write!(f, "{}", v.identity()),
        }
    }
}

impl From<Literal> for Value {
    fn from(v: Literal) -> Self {
        Self::Literal(v)
    }
}

impl From<EntityRef> for Value {
    fn from(v: EntityRef) -> Self {
        Self::Entity(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Literal(Literal::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Literal(Literal::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Literal(Literal::Int(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Literal(Literal::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Literal(Literal::Bool(v))
    }
}

impl<E: Entity + 'static> From<Arc<E>> for Value {
    fn from(entity: Arc<E>) -> Self {
        Self::entity(entity)
    }
}
