//! # Scene Store
//!
//! The receiver hands decoded content messages to a [`SceneStore`], which
//! applies a whole batch or none of it. A refusal becomes a REJECT reply;
//! it is never a protocol error.
//!
//! [`MemoryScene`] is the in-memory reference store. It keeps component,
//! resource and asset payloads as bytes and checks built-in payloads
//! against the typed catalog before accepting them.

use std::collections::{BTreeMap, HashMap, HashSet};

use scenewire_codec::CodecError;
use scenewire_shared::{AssetKey, ComponentTypeId, EntityId, LargeAssetId, ResourceTypeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Asset, Component, Resource};
use crate::content::ContentMessage;
use crate::transaction::{NamedTransaction, TransactionReply};

/// Why a store refused a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreRejection {
    /// CREATE_ENTITIES named an entity that already exists.
    #[error("entity {entity} already exists")]
    DuplicateEntity {
        /// The entity.
        entity: EntityId,
    },

    /// A built-in component payload failed to decode.
    #[error("invalid component {component_type} on entity {entity}: {source}")]
    InvalidComponent {
        /// Component type.
        component_type: ComponentTypeId,
        /// Target entity.
        entity: EntityId,
        /// Decode failure.
        source: CodecError,
    },

    /// A built-in resource payload failed to decode.
    #[error("invalid resource {resource_type}: {source}")]
    InvalidResource {
        /// Resource type.
        resource_type: ResourceTypeId,
        /// Decode failure.
        source: CodecError,
    },

    /// A built-in asset payload failed to decode.
    #[error("invalid asset {key}: {source}")]
    InvalidAsset {
        /// Asset type and id.
        key: AssetKey,
        /// Decode failure.
        source: CodecError,
    },
}

/// What to do when CREATE_ENTITIES names an existing entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Refuse the whole batch.
    #[default]
    Reject,
    /// Leave the existing entity untouched and carry on.
    Ignore,
}

/// Applies content messages to a scene.
pub trait SceneStore {
    /// Applies every message in order, or none of them.
    ///
    /// # Errors
    ///
    /// Returns the reason the batch was refused. The store is unchanged.
    fn apply(&mut self, messages: &[ContentMessage]) -> Result<(), StoreRejection>;

    /// Applies a named transaction and builds its reply.
    fn apply_named(&mut self, transaction: &NamedTransaction) -> TransactionReply {
        match self.apply(&transaction.messages) {
            Ok(()) => TransactionReply::accept(transaction.id),
            Err(reason) => {
                tracing::warn!(id = transaction.id, %reason, "transaction rejected by store");
                TransactionReply::reject(transaction.id)
            }
        }
    }
}

/// Lookup result for an asset key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetEntry<'a> {
    /// Registered and holding content.
    Loaded(&'a [u8]),
    /// Deleted. Handles to it stay valid but resolve to nothing.
    Stale,
}

/// In-memory [`SceneStore`].
#[derive(Clone, Debug, Default)]
pub struct MemoryScene {
    policy: DuplicatePolicy,
    entities: BTreeMap<EntityId, HashMap<ComponentTypeId, Vec<u8>>>,
    resources: HashMap<ResourceTypeId, Vec<u8>>,
    assets: HashMap<AssetKey, Option<Vec<u8>>>,
}

impl MemoryScene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// The duplicate-entity policy.
    #[must_use]
    pub const fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Returns true if the entity exists.
    #[must_use]
    pub fn contains_entity(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Entities in ascending order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Number of entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Raw payload of a component.
    #[must_use]
    pub fn component_bytes(&self, entity: EntityId, component_type: ComponentTypeId) -> Option<&[u8]> {
        self.entities
            .get(&entity)?
            .get(&component_type)
            .map(Vec::as_slice)
    }

    /// Typed component, if the type is built in and present.
    #[must_use]
    pub fn component(&self, entity: EntityId, component_type: ComponentTypeId) -> Option<Component> {
        let bytes = self.component_bytes(entity, component_type)?;
        Component::decode(component_type, bytes).ok().flatten()
    }

    /// Raw payload of a resource.
    #[must_use]
    pub fn resource_bytes(&self, resource_type: ResourceTypeId) -> Option<&[u8]> {
        self.resources.get(&resource_type).map(Vec::as_slice)
    }

    /// Looks up an asset.
    #[must_use]
    pub fn asset(&self, key: AssetKey) -> Option<AssetEntry<'_>> {
        self.assets.get(&key).map(|slot| match slot {
            Some(bytes) => AssetEntry::Loaded(bytes),
            None => AssetEntry::Stale,
        })
    }

    /// Large assets referenced by loaded BUFFER assets, ascending.
    #[must_use]
    pub fn large_asset_references(&self) -> Vec<LargeAssetId> {
        let mut ids: Vec<LargeAssetId> = self
            .assets
            .iter()
            .filter_map(|(key, slot)| {
                let bytes = slot.as_deref()?;
                Asset::decode(key.asset_type, bytes).ok()??.large_asset()
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn validate(&self, messages: &[ContentMessage]) -> Result<(), StoreRejection> {
        let mut created = HashSet::new();
        let mut deleted = HashSet::new();
        let exists = |e: &EntityId, created: &HashSet<EntityId>, deleted: &HashSet<EntityId>| {
            created.contains(e) || (self.entities.contains_key(e) && !deleted.contains(e))
        };

        for message in messages {
            match message {
                ContentMessage::CreateEntities(ids) => {
                    for &entity in ids {
                        if exists(&entity, &created, &deleted) {
                            if self.policy == DuplicatePolicy::Reject {
                                return Err(StoreRejection::DuplicateEntity { entity });
                            }
                            continue;
                        }
                        created.insert(entity);
                        deleted.remove(&entity);
                    }
                }
                ContentMessage::DeleteEntities(ids) => {
                    for entity in ids {
                        created.remove(entity);
                        deleted.insert(*entity);
                    }
                }
                ContentMessage::ModifyComponent {
                    component_type,
                    entries,
                } => {
                    for entry in entries {
                        if let Err(source) = Component::decode(*component_type, &entry.payload) {
                            return Err(StoreRejection::InvalidComponent {
                                component_type: *component_type,
                                entity: entry.entity,
                                source,
                            });
                        }
                        if !exists(&entry.entity, &created, &deleted) {
                            created.insert(entry.entity);
                            deleted.remove(&entry.entity);
                        }
                    }
                }
                ContentMessage::ModifyResource {
                    resource_type,
                    payload,
                } => {
                    if let Err(source) = Resource::decode(*resource_type, payload) {
                        return Err(StoreRejection::InvalidResource {
                            resource_type: *resource_type,
                            source,
                        });
                    }
                }
                ContentMessage::ModifyAsset { key, payload } => {
                    if let Err(source) = Asset::decode(key.asset_type, payload) {
                        return Err(StoreRejection::InvalidAsset { key: *key, source });
                    }
                }
                ContentMessage::DeleteComponent { .. }
                | ContentMessage::DeleteResource { .. }
                | ContentMessage::DeleteAsset { .. }
                | ContentMessage::UnrecognizedComponent { .. } => {}
            }
        }
        Ok(())
    }

    fn apply_one(&mut self, message: &ContentMessage) {
        match message {
            ContentMessage::CreateEntities(ids) => {
                for &entity in ids {
                    self.entities.entry(entity).or_default();
                }
            }
            ContentMessage::DeleteEntities(ids) => {
                for entity in ids {
                    self.entities.remove(entity);
                }
            }
            ContentMessage::ModifyComponent {
                component_type,
                entries,
            } => {
                for entry in entries {
                    self.entities
                        .entry(entry.entity)
                        .or_default()
                        .insert(*component_type, entry.payload.clone());
                }
            }
            ContentMessage::DeleteComponent {
                component_type,
                entities,
            } => {
                for entity in entities {
                    if let Some(components) = self.entities.get_mut(entity) {
                        components.remove(component_type);
                    }
                }
            }
            ContentMessage::ModifyResource {
                resource_type,
                payload,
            } => {
                self.resources.insert(*resource_type, payload.clone());
            }
            ContentMessage::DeleteResource { resource_type } => {
                self.resources.remove(resource_type);
            }
            ContentMessage::ModifyAsset { key, payload } => {
                self.assets.insert(*key, Some(payload.clone()));
            }
            ContentMessage::DeleteAsset { key } => {
                if let Some(slot) = self.assets.get_mut(key) {
                    *slot = None;
                }
            }
            ContentMessage::UnrecognizedComponent {
                component_type,
                message_size,
            } => {
                tracing::debug!(component_type, message_size, "store ignoring unrecognized component");
            }
        }
    }
}

impl SceneStore for MemoryScene {
    fn apply(&mut self, messages: &[ContentMessage]) -> Result<(), StoreRejection> {
        self.validate(messages)?;
        for message in messages {
            self.apply_one(message);
        }
        Ok(())
    }
}
