//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier, if one has been assigned yet.
    ///
    /// Entities that are persisted by a backend which assigns identity
    /// (e.g. a database-generated key) have no id until the first write.
    fn id(&self) -> Option<&Self::Id>;
}
