//! Operation → handler-name resolution.
//!
//! [`HandlerNameTable::defaults`] is rebuilt from the constant
//! [`Operation::default_handler_name`] mapping on every call; nothing shared is
//! ever mutated, so one instance's renames cannot leak into another's.
//!
//! Two operations may resolve to the same name.  That is allowed: both then
//! route to the one member bound under it, and that member tells them apart by
//! the shape of its [`crate::operation::TrapArgs`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::object_model::PropertyKey;
use crate::operation::Operation;

/// `BTreeMap<Operation, PropertyKey>` as a sequence of pairs.
mod names_as_seq {
    use super::{BTreeMap, Operation, PropertyKey};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<Operation, PropertyKey>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let pairs: Vec<(&Operation, &PropertyKey)> = map.iter().collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Operation, PropertyKey>, D::Error> {
        let pairs: Vec<(Operation, PropertyKey)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }

    /// Like [`deserialize`], but operations missing from the input keep their
    /// built-in names so a resolved table is always complete.
    pub fn deserialize_complete<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Operation, PropertyKey>, D::Error> {
        let mut names: BTreeMap<Operation, PropertyKey> = Operation::ALL
            .into_iter()
            .map(|op| (op, PropertyKey::from(op.default_handler_name())))
            .collect();
        names.extend(deserialize(deserializer)?);
        Ok(names)
    }
}

// ---------------------------------------------------------------------------
// HandlerNameOverrides: caller input
// ---------------------------------------------------------------------------

/// A partial renaming supplied at construction time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerNameOverrides {
    #[serde(with = "names_as_seq")]
    names: BTreeMap<Operation, PropertyKey>,
}

impl HandlerNameOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `operation` to `name` instead of its built-in name.  A later call
    /// for the same operation replaces the earlier one.
    pub fn rename(mut self, operation: Operation, name: impl Into<PropertyKey>) -> Self {
        self.names.insert(operation, name.into());
        self
    }

    pub fn get(&self, operation: Operation) -> Option<&PropertyKey> {
        self.names.get(&operation)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Load string renames keyed by trap name, e.g.
    /// `{"get": "__fetch__", "deleteProperty": "__drop__"}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, String> =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut overrides = Self::new();
        for (trap, name) in raw {
            let operation =
                Operation::from_trap_name(&trap).ok_or_else(|| ConfigError::UnknownTrap(trap.clone()))?;
            if name.is_empty() {
                return Err(ConfigError::EmptyHandlerName { trap });
            }
            overrides = overrides.rename(operation, name);
        }
        Ok(overrides)
    }
}

// ---------------------------------------------------------------------------
// HandlerNameTable: resolved, immutable
// ---------------------------------------------------------------------------

/// Every operation's resolved handler name.  Always complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerNameTable {
    #[serde(
        serialize_with = "names_as_seq::serialize",
        deserialize_with = "names_as_seq::deserialize_complete"
    )]
    names: BTreeMap<Operation, PropertyKey>,
}

impl Default for HandlerNameTable {
    fn default() -> Self {
        Self::defaults()
    }
}

impl HandlerNameTable {
    /// A fresh copy of the built-in names.
    pub fn defaults() -> Self {
        let names = Operation::ALL
            .into_iter()
            .map(|op| (op, PropertyKey::from(op.default_handler_name())))
            .collect();
        Self { names }
    }

    /// Explicit overrides win; every other operation keeps its built-in name.
    pub fn resolve(overrides: &HandlerNameOverrides) -> Self {
        let mut table = Self::defaults();
        table
            .names
            .extend(overrides.names.iter().map(|(op, name)| (*op, name.clone())));
        table
    }

    pub fn name_for(&self, operation: Operation) -> &PropertyKey {
        // Construction and deserialization both fill all 13 entries.
        &self.names[&operation]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Operation, &PropertyKey)> {
        self.names.iter().map(|(op, name)| (*op, name))
    }

    /// Operations bound to `name`, in `Operation` order.
    pub fn operations_named(&self, name: &PropertyKey) -> Vec<Operation> {
        self.iter()
            .filter(|(_, n)| *n == name)
            .map(|(op, _)| op)
            .collect()
    }

    /// Names shared by more than one operation.
    pub fn aliased_names(&self) -> BTreeMap<PropertyKey, Vec<Operation>> {
        let mut by_name: BTreeMap<PropertyKey, Vec<Operation>> = BTreeMap::new();
        for (op, name) in self.iter() {
            by_name.entry(name.clone()).or_default().push(op);
        }
        by_name.retain(|_, ops| ops.len() > 1);
        by_name
    }

    /// Operations whose name differs from the built-in one.
    pub fn renamed_operations(&self) -> Vec<Operation> {
        self.iter()
            .filter(|(op, name)| name.as_str() != Some(op.default_handler_name()))
            .map(|(op, _)| op)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_model::SymbolId;

    #[test]
    fn defaults_cover_every_operation() {
        let table = HandlerNameTable::defaults();
        assert_eq!(table.iter().count(), 13);
        assert_eq!(table.name_for(Operation::Get), &PropertyKey::from("__get__"));
        assert!(table.aliased_names().is_empty());
        assert!(table.renamed_operations().is_empty());
    }

    #[test]
    fn explicit_entries_win() {
        let overrides = HandlerNameOverrides::new()
            .rename(Operation::Get, "__fetch__")
            .rename(Operation::Has, SymbolId(40));
        let table = HandlerNameTable::resolve(&overrides);
        assert_eq!(table.name_for(Operation::Get), &PropertyKey::from("__fetch__"));
        assert_eq!(
            table.name_for(Operation::Has),
            &PropertyKey::Symbol(SymbolId(40))
        );
        assert_eq!(table.name_for(Operation::Set), &PropertyKey::from("__set__"));
        assert_eq!(
            table.renamed_operations(),
            vec![Operation::Get, Operation::Has]
        );
    }

    #[test]
    fn resolving_does_not_touch_later_defaults() {
        let renamed =
            HandlerNameTable::resolve(&HandlerNameOverrides::new().rename(Operation::Get, "x"));
        assert_eq!(renamed.name_for(Operation::Get), &PropertyKey::from("x"));
        let fresh = HandlerNameTable::defaults();
        assert_eq!(fresh.name_for(Operation::Get), &PropertyKey::from("__get__"));
    }

    #[test]
    fn aliases_are_reported() {
        let table = HandlerNameTable::resolve(
            &HandlerNameOverrides::new()
                .rename(Operation::Get, "__access__")
                .rename(Operation::Set, "__access__"),
        );
        let aliases = table.aliased_names();
        assert_eq!(
            aliases.get(&PropertyKey::from("__access__")),
            Some(&vec![Operation::Get, Operation::Set])
        );
        assert_eq!(
            table.operations_named(&PropertyKey::from("__access__")),
            vec![Operation::Get, Operation::Set]
        );
    }

    #[test]
    fn overrides_from_json() {
        let overrides =
            HandlerNameOverrides::from_json(r#"{"get": "__fetch__", "ownKeys": "__keys__"}"#)
                .unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(
            overrides.get(Operation::OwnKeys),
            Some(&PropertyKey::from("__keys__"))
        );
    }

    #[test]
    fn overrides_from_json_rejects_unknown_and_empty() {
        assert_eq!(
            HandlerNameOverrides::from_json(r#"{"invoke": "__invoke__"}"#).unwrap_err(),
            ConfigError::UnknownTrap("invoke".to_string())
        );
        assert_eq!(
            HandlerNameOverrides::from_json(r#"{"get": ""}"#).unwrap_err(),
            ConfigError::EmptyHandlerName {
                trap: "get".to_string()
            }
        );
    }

    #[test]
    fn partial_serialized_table_is_completed() {
        let table: HandlerNameTable =
            serde_json::from_str(r#"{"names": [["get", {"String": "__read__"}]]}"#).unwrap();
        assert_eq!(table.iter().count(), 13);
        assert_eq!(table.name_for(Operation::Get), &PropertyKey::from("__read__"));
        assert_eq!(table.name_for(Operation::Has), &PropertyKey::from("__has__"));
    }

    #[test]
    fn table_serde_round_trip() {
        let table = HandlerNameTable::resolve(
            &HandlerNameOverrides::new().rename(Operation::Apply, SymbolId(99)),
        );
        let json = serde_json::to_string(&table).unwrap();
        let back: HandlerNameTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
