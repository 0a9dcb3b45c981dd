//! Lifecycle hook dispatch
//!
//! The diff engine and the mapper's persistence operations fire events at
//! fixed points. Subscribers live in a [`HookRegistry`] owned by the mapper:
//!
//! 1. per-model subscribers run first, in registration order
//! 2. global subscribers run next and also receive the model name
//! 3. for the eight reserved events (`before`/`after` × `create`, `update`,
//!    `validate`, `delete`) the model's own [`Model::on_event`] runs last
//!
//! Payloads are passed by mutable reference, so edits made by one hook are
//! visible to the next hook and to the computation that fired the event.
//! A hook returning an error aborts that computation.

use crate::model::Model;
use docmap_core::{Document, Result, UpdateSet};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Before the diff pass, any mode
    BeforeValidate,
    /// After the diff pass, any mode
    AfterValidate,
    /// Before the diff pass of a first insertion
    BeforeValidateCreation,
    /// After the diff pass of a first insertion
    AfterValidateCreation,
    /// Before the diff pass of an update
    BeforeValidateUpdate,
    /// After the diff pass of an update
    AfterValidateUpdate,
    /// Before the store insert
    BeforeCreate,
    /// After the store insert
    AfterCreate,
    /// Before the store update
    BeforeUpdate,
    /// After the store update
    AfterUpdate,
    /// Before the store remove
    BeforeDelete,
    /// After the store remove
    AfterDelete,
}

impl Event {
    /// Every event, in declaration order
    pub const ALL: [Event; 12] = [
        Event::BeforeValidate,
        Event::AfterValidate,
        Event::BeforeValidateCreation,
        Event::AfterValidateCreation,
        Event::BeforeValidateUpdate,
        Event::AfterValidateUpdate,
        Event::BeforeCreate,
        Event::AfterCreate,
        Event::BeforeUpdate,
        Event::AfterUpdate,
        Event::BeforeDelete,
        Event::AfterDelete,
    ];

    /// Fixed event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BeforeValidate => "before_validate",
            Event::AfterValidate => "after_validate",
            Event::BeforeValidateCreation => "before_validate_creation",
            Event::AfterValidateCreation => "after_validate_creation",
            Event::BeforeValidateUpdate => "before_validate_update",
            Event::AfterValidateUpdate => "after_validate_update",
            Event::BeforeCreate => "before_create",
            Event::AfterCreate => "after_create",
            Event::BeforeUpdate => "before_update",
            Event::AfterUpdate => "after_update",
            Event::BeforeDelete => "before_delete",
            Event::AfterDelete => "after_delete",
        }
    }

    /// True for events that also reach the model's own hook
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            Event::BeforeCreate
                | Event::AfterCreate
                | Event::BeforeUpdate
                | Event::AfterUpdate
                | Event::BeforeValidate
                | Event::AfterValidate
                | Event::BeforeDelete
                | Event::AfterDelete
        )
    }

    /// Mode-specific event fired before the diff pass
    pub fn before_validate_for(is_update: bool) -> Event {
        if is_update {
            Event::BeforeValidateUpdate
        } else {
            Event::BeforeValidateCreation
        }
    }

    /// Mode-specific event fired after the diff pass
    pub fn after_validate_for(is_update: bool) -> Event {
        if is_update {
            Event::AfterValidateUpdate
        } else {
            Event::AfterValidateCreation
        }
    }

    /// Event fired before the store write
    pub fn before_save_for(is_update: bool) -> Event {
        if is_update {
            Event::BeforeUpdate
        } else {
            Event::BeforeCreate
        }
    }

    /// Event fired after the store write
    pub fn after_save_for(is_update: bool) -> Event {
        if is_update {
            Event::AfterUpdate
        } else {
            Event::AfterCreate
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Event {
    type Err = docmap_core::Error;

    fn from_str(s: &str) -> Result<Self> {
        Event::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| docmap_core::Error::misuse(format!("unknown event '{}'", s)))
    }
}

/// Data handed to hooks
#[derive(Debug)]
pub enum HookPayload<'a> {
    /// Live fields being diffed
    Fields(&'a mut Document),
    /// Full document of a first insertion
    Insert(&'a mut Document),
    /// Update set of an update
    Update(&'a mut UpdateSet),
    /// Selector of a delete
    Selector(&'a Document),
}

impl HookPayload<'_> {
    /// Live fields or insert document, if that is what the payload carries
    pub fn document_mut(&mut self) -> Option<&mut Document> {
        match self {
            HookPayload::Fields(d) | HookPayload::Insert(d) => Some(&mut **d),
            _ => None,
        }
    }

    /// Update set, if that is what the payload carries
    pub fn update_mut(&mut self) -> Option<&mut UpdateSet> {
        match self {
            HookPayload::Update(u) => Some(&mut **u),
            _ => None,
        }
    }
}

type ModelHook = Arc<dyn Fn(&mut HookPayload<'_>) -> Result<()> + Send + Sync>;
type GlobalHook = Arc<dyn Fn(&str, &mut HookPayload<'_>) -> Result<()> + Send + Sync>;

/// Subscriber storage for lifecycle events
///
/// Constructed once, owned by the mapper and passed by reference to every
/// operation that fires events. [`HookRegistry::clear`] tears all
/// subscriptions down.
#[derive(Default)]
pub struct HookRegistry {
    by_model: RwLock<HashMap<(String, Event), Vec<ModelHook>>>,
    global: RwLock<HashMap<Event, Vec<GlobalHook>>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("model_subscriptions", &self.by_model.read().len())
            .field("global_subscriptions", &self.global.read().len())
            .finish()
    }
}

impl HookRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `event` for one model
    pub fn on<F>(&self, model: impl Into<String>, event: Event, hook: F)
    where
        F: Fn(&mut HookPayload<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.by_model
            .write()
            .entry((model.into(), event))
            .or_default()
            .push(Arc::new(hook));
    }

    /// Subscribe to `event` for every model
    pub fn on_global<F>(&self, event: Event, hook: F)
    where
        F: Fn(&str, &mut HookPayload<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.global
            .write()
            .entry(event)
            .or_default()
            .push(Arc::new(hook));
    }

    /// Number of subscribers that `fire(model, event, ..)` would run
    pub fn subscriber_count(&self, model: &str, event: Event) -> usize {
        let typed = self
            .by_model
            .read()
            .get(&(model.to_string(), event))
            .map_or(0, Vec::len);
        let global = self.global.read().get(&event).map_or(0, Vec::len);
        typed + global
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.by_model.write().clear();
        self.global.write().clear();
    }

    /// Fire `event` for `model`
    ///
    /// Subscriber lists are copied out before running, so hooks may register
    /// further hooks without deadlocking.
    pub fn fire(
        &self,
        model: &str,
        event: Event,
        payload: &mut HookPayload<'_>,
        instance: Option<&dyn Model>,
    ) -> Result<()> {
        let typed: Vec<ModelHook> = self
            .by_model
            .read()
            .get(&(model.to_string(), event))
            .cloned()
            .unwrap_or_default();
        let global: Vec<GlobalHook> = self.global.read().get(&event).cloned().unwrap_or_default();

        for hook in &typed {
            hook(payload)?;
        }
        for hook in &global {
            hook(model, payload)?;
        }
        if event.is_reserved() {
            if let Some(instance) = instance {
                instance.on_event(event, payload)?;
            }
        }
        Ok(())
    }
}

/// Hook registry bound to one model, as seen by the diff engine
#[derive(Clone, Copy)]
pub struct HookContext<'a> {
    registry: &'a HookRegistry,
    model: &'a str,
    instance: Option<&'a dyn Model>,
}

impl<'a> HookContext<'a> {
    /// Bind `registry` to `model`
    pub fn new(registry: &'a HookRegistry, model: &'a str, instance: Option<&'a dyn Model>) -> Self {
        HookContext {
            registry,
            model,
            instance,
        }
    }

    /// Fire `event` with `payload`
    pub fn fire(&self, event: Event, payload: &mut HookPayload<'_>) -> Result<()> {
        self.registry.fire(self.model, event, payload, self.instance)
    }
}
