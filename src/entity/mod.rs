//! Entity declaration storage, resolution, and expansion guards.
//!
//! General and parameter entities declared in DTD subsets live in an
//! [`EntityTable`] owned by the parse session. Declaration follows DTD
//! semantics: the first declaration for a name wins and later duplicates
//! are silently ignored. The five built-in entities are seeded at table
//! construction, so no document declaration can override them.
//!
//! The table also owns the expansion recursion guard — a stack-disciplined
//! set of the entity names currently being expanded. Re-entering a name
//! raises a well-formedness error naming the entity, which is what turns
//! `<!ENTITY e "&e;">` into an error instead of an infinite loop.
//!
//! [`SubsetCache`] memoizes parsed external DTD subsets keyed by their
//! public/system identifiers. It is owned by one [`crate::parser::Parser`]
//! session, never process-global, and a hit always hands out a detached
//! clone so independent documents cannot observe each other's mutations.

use std::collections::{HashMap, HashSet};

use crate::error::{ErrorKind, Position, XmlError};

/// An external identifier: a public id, a system id, or both. Legacy
/// doctypes may carry a PUBLIC identifier with no system literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalId {
    /// The PUBLIC identifier, if any.
    pub public_id: Option<String>,
    /// The SYSTEM identifier, if any.
    pub system_id: Option<String>,
}

/// Whether an entity is usable in content or only within DTD markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Usable in document content and attribute values.
    General,
    /// Usable only within DTD markup (`%name;`).
    Parameter,
}

/// An entity's replacement source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValue {
    /// Inline replacement text.
    Internal(String),
    /// An external resource to fetch and expand.
    External(ExternalId),
}

/// A declared entity. Immutable once created.
#[derive(Debug, Clone)]
pub struct Entity {
    /// The entity name (without `&`/`%` and `;`).
    pub name: String,
    /// General or parameter.
    pub kind: EntityKind,
    /// Inline text or external identifier.
    pub value: EntityValue,
    /// Where the entity was declared. Expansion seeds fresh readers with
    /// this position so nested errors report the declaration site.
    pub position: Position,
}

impl Entity {
    /// Creates an internal entity with inline replacement text.
    #[must_use]
    pub fn internal(
        name: impl Into<String>,
        kind: EntityKind,
        text: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            value: EntityValue::Internal(text.into()),
            position,
        }
    }

    /// Creates an external entity referencing a fetchable resource.
    #[must_use]
    pub fn external(
        name: impl Into<String>,
        kind: EntityKind,
        external_id: ExternalId,
        position: Position,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            value: EntityValue::External(external_id),
            position,
        }
    }
}

/// The result of looking up a general entity reference.
#[derive(Debug, Clone)]
pub enum GeneralLookup {
    /// The entity is declared.
    Declared(Entity),
    /// Undeclared, and that is a well-formedness error: every declaration
    /// the document can see has been read, or the document declared itself
    /// standalone.
    Undeclared,
    /// Undeclared but not an error: the document references an external
    /// subset that was never fetched, so the declaration may live there.
    /// The caller emits the literal `&name;` text.
    Placeholder,
}

/// Returns the replacement character of a predefined XML entity, if `name`
/// is one of the five (`amp`, `lt`, `gt`, `apos`, `quot`).
pub(crate) fn builtin_char(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

/// The entity table for one parse: general and parameter declarations plus
/// the expansion recursion guard.
#[derive(Debug, Clone, Default)]
pub struct EntityTable {
    general: HashMap<String, Entity>,
    parameter: HashMap<String, Entity>,
    /// Names currently being expanded, stack-disciplined. Parameter
    /// entities are keyed with a `%` prefix so the two namespaces cannot
    /// collide.
    expanding: HashSet<String>,
}

impl EntityTable {
    /// Creates a table seeded with the five built-in entities. Being
    /// registered first, they win over any document declaration.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut table = Self::default();
        let builtin = Position::start("<builtin>");
        for (name, text) in [
            ("amp", "&"),
            ("lt", "<"),
            ("gt", ">"),
            ("apos", "'"),
            ("quot", "\""),
        ] {
            table.declare_general(Entity::internal(
                name,
                EntityKind::General,
                text,
                builtin.clone(),
            ));
        }
        table
    }

    /// Declares a general entity. The first declaration for a name wins;
    /// duplicates are silently ignored (DTD semantics, not an error).
    pub fn declare_general(&mut self, entity: Entity) {
        self.general.entry(entity.name.clone()).or_insert(entity);
    }

    /// Declares a parameter entity. First declaration wins.
    pub fn declare_parameter(&mut self, entity: Entity) {
        self.parameter.entry(entity.name.clone()).or_insert(entity);
    }

    /// Returns the declared general entity, if any.
    #[must_use]
    pub fn general(&self, name: &str) -> Option<&Entity> {
        self.general.get(name)
    }

    /// Resolves a general entity reference.
    ///
    /// `unread_subset` is whether the document references an external
    /// subset that was never fetched; `standalone` is the XML-declaration
    /// flag. Together they decide whether an undeclared name is an error
    /// or yields the literal reference text as a placeholder.
    #[must_use]
    pub fn resolve_general(
        &self,
        name: &str,
        unread_subset: bool,
        standalone: bool,
    ) -> GeneralLookup {
        match self.general.get(name) {
            Some(entity) => GeneralLookup::Declared(entity.clone()),
            None if unread_subset && !standalone => GeneralLookup::Placeholder,
            None => GeneralLookup::Undeclared,
        }
    }

    /// Resolves a parameter entity reference. Undeclared parameter
    /// entities are always a hard error at the call site.
    #[must_use]
    pub fn resolve_parameter(&self, name: &str) -> Option<&Entity> {
        self.parameter.get(name)
    }

    /// Marks an entity as being expanded. `key` is the entity name, with a
    /// `%` prefix for parameter entities.
    ///
    /// # Errors
    ///
    /// Well-formedness error naming the entity if it is already being
    /// expanded (direct or indirect recursion).
    pub fn begin_expansion(&mut self, key: &str, position: &Position) -> Result<(), XmlError> {
        if !self.expanding.insert(key.to_string()) {
            let display = key.trim_start_matches('%');
            return Err(XmlError::new(
                ErrorKind::WellFormedness,
                format!("recursive expansion of entity '{display}'"),
                position.clone(),
            ));
        }
        Ok(())
    }

    /// Clears the expansion marker set by
    /// [`begin_expansion`](Self::begin_expansion).
    pub fn end_expansion(&mut self, key: &str) {
        self.expanding.remove(key);
    }

    /// Merges another table's general entities into this one,
    /// first-registered-wins. Used when an external subset's declarations
    /// join the document's table.
    pub fn merge_general_first_wins(&mut self, other: &EntityTable) {
        for entity in other.general.values() {
            self.declare_general(entity.clone());
        }
    }

    /// Returns a parent-detached clone suitable for caching: declarations
    /// are copied, the expansion guard is empty.
    #[must_use]
    pub fn detached_clone(&self) -> Self {
        Self {
            general: self.general.clone(),
            parameter: self.parameter.clone(),
            expanding: HashSet::new(),
        }
    }
}

/// A memo of parsed external DTD subsets, keyed by public/system id.
///
/// Scoped to one parser session. Hits return detached clones, never the
/// cached instance.
#[derive(Debug, Default)]
pub struct SubsetCache {
    map: HashMap<(Option<String>, Option<String>), EntityTable>,
}

impl SubsetCache {
    /// Looks up a cached subset. Returns a detached clone on a hit.
    #[must_use]
    pub fn get(&self, external_id: &ExternalId) -> Option<EntityTable> {
        self.map
            .get(&(
                external_id.public_id.clone(),
                external_id.system_id.clone(),
            ))
            .map(EntityTable::detached_clone)
    }

    /// Stores a detached clone of a freshly parsed subset.
    pub fn insert(&mut self, external_id: &ExternalId, table: &EntityTable) {
        self.map.insert(
            (
                external_id.public_id.clone(),
                external_id.system_id.clone(),
            ),
            table.detached_clone(),
        );
    }

    /// Number of cached subsets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing has been cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
