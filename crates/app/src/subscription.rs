//! Wires aggregates to member state changes.
//!
//! Each watched entity holds exactly one host registration, shared by every
//! aggregate that contains it and released when the last of them
//! unsubscribes. The [`MembershipIndex`] tells the engine which aggregates
//! must recompute for a given entity; it is only ever written here.

use std::collections::{BTreeSet, HashMap};

use areamedia_domain::id::{AggregateId, EntityId, SubscriptionId};

use crate::ports::{StateSink, StateSource};

/// Entity id → aggregates that must recompute when it changes.
#[derive(Debug, Default)]
pub struct MembershipIndex {
    targets: HashMap<EntityId, BTreeSet<AggregateId>>,
}

impl MembershipIndex {
    /// Aggregates interested in `entity_id`, in id order.
    pub fn targets(&self, entity_id: &EntityId) -> impl Iterator<Item = &AggregateId> {
        self.targets.get(entity_id).into_iter().flatten()
    }

    #[must_use]
    pub fn is_watched(&self, entity_id: &EntityId) -> bool {
        self.targets.contains_key(entity_id)
    }

    /// Number of entities with at least one interested aggregate.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn insert(&mut self, entity_id: &EntityId, aggregate_id: &AggregateId) {
        self.targets
            .entry(entity_id.clone())
            .or_default()
            .insert(aggregate_id.clone());
    }

    fn remove(&mut self, entity_id: &EntityId, aggregate_id: &AggregateId) {
        if let Some(set) = self.targets.get_mut(entity_id) {
            set.remove(aggregate_id);
            if set.is_empty() {
                self.targets.remove(entity_id);
            }
        }
    }
}

/// Proof of one aggregate's registrations, returned by
/// [`SubscriptionManager::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    aggregate_id: AggregateId,
}

impl SubscriptionHandle {
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[must_use]
    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }
}

struct Watch<R> {
    _registration: R,
    refs: usize,
}

/// Owns every host registration and the membership index.
pub struct SubscriptionManager<S: StateSource> {
    source: S,
    sink: StateSink,
    watches: HashMap<EntityId, Watch<S::Registration>>,
    index: MembershipIndex,
    active: HashMap<SubscriptionId, (AggregateId, Vec<EntityId>)>,
}

impl<S: StateSource> SubscriptionManager<S> {
    /// Create a manager that forwards every watched change into `sink`.
    pub fn new(source: S, sink: StateSink) -> Self {
        Self {
            source,
            sink,
            watches: HashMap::new(),
            index: MembershipIndex::default(),
            active: HashMap::new(),
        }
    }

    /// The underlying state source.
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub fn index(&self) -> &MembershipIndex {
        &self.index
    }

    /// Aggregates to recompute when `entity_id` changes.
    pub fn targets(&self, entity_id: &EntityId) -> impl Iterator<Item = &AggregateId> {
        self.index.targets(entity_id)
    }

    /// Number of live host registrations.
    #[must_use]
    pub fn registrations(&self) -> usize {
        self.watches.len()
    }

    /// Register `aggregate_id` for state changes of every member.
    ///
    /// A member the host refuses to watch is logged and left out of the
    /// index; it keeps the classification it had at the last recompute
    /// until the next rebuild.
    pub fn subscribe(&mut self, aggregate_id: &AggregateId, members: &[EntityId]) -> SubscriptionHandle {
        let mut watched = Vec::with_capacity(members.len());

        for member in members {
            if let Some(watch) = self.watches.get_mut(member) {
                watch.refs += 1;
            } else {
                match self.source.subscribe(member, self.sink.clone()) {
                    Ok(registration) => {
                        self.watches.insert(
                            member.clone(),
                            Watch {
                                _registration: registration,
                                refs: 1,
                            },
                        );
                    }
                    Err(err) => {
                        tracing::warn!(%err, entity_id = %member, aggregate_id = %aggregate_id, "cannot watch member");
                        continue;
                    }
                }
            }
            self.index.insert(member, aggregate_id);
            watched.push(member.clone());
        }

        let handle = SubscriptionHandle {
            id: SubscriptionId::new(),
            aggregate_id: aggregate_id.clone(),
        };
        tracing::debug!(
            aggregate_id = %aggregate_id,
            watched = watched.len(),
            members = members.len(),
            "aggregate subscribed"
        );
        self.active
            .insert(handle.id, (aggregate_id.clone(), watched));
        handle
    }

    /// Release every registration taken for `handle`.
    ///
    /// Idempotent: returns `false` if the handle was already released.
    pub fn unsubscribe(&mut self, handle: &SubscriptionHandle) -> bool {
        let Some((aggregate_id, watched)) = self.active.remove(&handle.id) else {
            return false;
        };

        for member in &watched {
            self.index.remove(member, &aggregate_id);
            if let Some(watch) = self.watches.get_mut(member) {
                watch.refs -= 1;
                if watch.refs == 0 {
                    // dropping the registration ends host deliveries
                    self.watches.remove(member);
                }
            }
        }
        tracing::debug!(aggregate_id = %aggregate_id, "aggregate unsubscribed");
        true
    }

    /// Release every registration held by this manager.
    pub fn unsubscribe_all(&mut self) {
        self.active.clear();
        self.index = MembershipIndex::default();
        self.watches.clear();
    }
}
