//! Musical Context - tempo/signature container shared by region sequences
//!
//! No reader depends on musical content; the mirror exists so editor code can
//! subscribe to its hooks like any other model object.

use std::sync::Weak;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{Color, ContentUpdateScopes, ListenerId, ListenerList, ObjectId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicalContextProperties {
    pub name: String,
    pub order_index: i32,
    pub color: Option<Color>,
}

/// Hooks fired for a musical context
#[allow(unused_variables)]
pub trait MusicalContextListener: Send + Sync {
    fn will_update_musical_context_properties(
        &self,
        context: &MusicalContext,
        new_properties: &MusicalContextProperties,
    ) {
    }
    fn did_update_musical_context_properties(&self, context: &MusicalContext) {}
    fn do_update_musical_context_content(&self, context: &MusicalContext, scopes: ContentUpdateScopes) {}
    fn will_destroy_musical_context(&self, context: &MusicalContext) {}
}

pub struct MusicalContext {
    id: ObjectId,
    properties: RwLock<MusicalContextProperties>,
    listeners: ListenerList<dyn MusicalContextListener>,
}

impl MusicalContext {
    pub(crate) fn new(properties: MusicalContextProperties) -> Self {
        Self {
            id: ObjectId::new(),
            properties: RwLock::new(properties),
            listeners: ListenerList::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn properties(&self) -> MusicalContextProperties {
        self.properties.read().clone()
    }

    pub fn add_listener(&self, listener: Weak<dyn MusicalContextListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    pub fn listeners(&self) -> &ListenerList<dyn MusicalContextListener> {
        &self.listeners
    }

    pub(crate) fn set_properties(&self, properties: MusicalContextProperties) {
        *self.properties.write() = properties;
    }
}

impl std::fmt::Debug for MusicalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicalContext")
            .field("id", &self.id)
            .field("name", &self.properties.read().name)
            .finish()
    }
}
