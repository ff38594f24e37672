use std::collections::BTreeMap;

use foundation::ids::EntityKey;
use serde::Serialize;

/// A pickable globe feature with stable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub key: EntityKey,
    pub display_name: String,
}

impl Entity {
    pub fn new(key: impl Into<EntityKey>, display_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    EmptyKey { display_name: String },
    DuplicateKey(EntityKey),
    DuplicateName(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::EmptyKey { display_name } => {
                write!(f, "entity {display_name:?} has an empty key")
            }
            RegistryError::DuplicateKey(key) => write!(f, "duplicate entity key {key}"),
            RegistryError::DuplicateName(name) => write!(f, "duplicate entity name {name:?}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// The fixed set of entities known for a session, injected at construction.
///
/// Renderer labels resolve either by key (case-insensitive code) or by display
/// name (case-insensitive). Labels matching neither are unknown, which callers
/// treat the same as "nothing under the cursor".
///
/// Ordering contract:
/// - Iteration yields entities in insertion order.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: Vec<Entity>,
    by_key: BTreeMap<EntityKey, usize>,
    by_name: BTreeMap<String, usize>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for entity in entities {
            registry.insert(entity)?;
        }
        Ok(registry)
    }

    /// Builds the registry from a display-name → code table.
    pub fn from_names<N, C>(names: impl IntoIterator<Item = (N, C)>) -> Result<Self, RegistryError>
    where
        N: Into<String>,
        C: AsRef<str>,
    {
        Self::from_entities(
            names
                .into_iter()
                .map(|(name, code)| Entity::new(EntityKey::new(code), name)),
        )
    }

    fn insert(&mut self, entity: Entity) -> Result<(), RegistryError> {
        if entity.key.as_str().is_empty() {
            return Err(RegistryError::EmptyKey {
                display_name: entity.display_name,
            });
        }
        if self.by_key.contains_key(&entity.key) {
            return Err(RegistryError::DuplicateKey(entity.key));
        }
        let name = normalize_name(&entity.display_name);
        if !name.is_empty() && self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName(entity.display_name));
        }

        let idx = self.entities.len();
        self.by_key.insert(entity.key.clone(), idx);
        if !name.is_empty() {
            self.by_name.insert(name, idx);
        }
        self.entities.push(entity);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Entity> {
        self.by_key.get(key).map(|&idx| &self.entities[idx])
    }

    /// Resolves a raw renderer label to a known entity.
    pub fn resolve(&self, label: &str) -> Option<&Entity> {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.by_key
            .get(&EntityKey::new(trimmed))
            .or_else(|| self.by_name.get(&normalize_name(trimmed)))
            .map(|&idx| &self.entities[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.iter()
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
