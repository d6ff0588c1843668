//! Aggregate engine: owns the current set of aggregate switches and keeps
//! them in sync with member state changes.
//!
//! Everything runs on one task: state changes, rebuilds and the completion
//! of power commands are processed one at a time, so switch fields are never
//! mutated concurrently. Member commands themselves run concurrently with
//! state processing (see [`run`]), so a slow player never delays recompute.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use tokio::sync::{mpsc, oneshot};

use areamedia_domain::aggregate::{AggregateSwitch, SwitchSnapshot};
use areamedia_domain::command::{CommandOutcome, PowerAction};
use areamedia_domain::entity::ActiveStates;
use areamedia_domain::error::{AreaMediaError, NotFoundError, ResolutionError};
use areamedia_domain::event::{StateChange, SwitchEvent};
use areamedia_domain::exclusion::ExclusionSet;
use areamedia_domain::id::{AggregateId, EntityId};
use areamedia_domain::resolver::PlayerChoice;

use crate::ports::{Directory, PowerTransport, StateSource, SwitchPublisher};
use crate::services::aggregate_builder::AggregateBuilder;
use crate::services::area_resolver::AreaResolver;
use crate::services::command_dispatcher::CommandDispatcher;
use crate::state_cache::LiveStateCache;
use crate::subscription::{SubscriptionHandle, SubscriptionManager};

/// Summary of one rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub created: Vec<AggregateId>,
    pub retired: Vec<AggregateId>,
    pub issues: Vec<ResolutionError>,
    pub unassigned: usize,
}

/// Identifies which build a power command was issued against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTicket {
    pub aggregate_id: AggregateId,
    pub action: PowerAction,
    generation: u64,
}

/// A power command ready to be sent; owns everything it needs so it can
/// run while the engine keeps processing state changes.
pub struct PendingCommand<T> {
    ticket: CommandTicket,
    members: Vec<EntityId>,
    dispatcher: CommandDispatcher<T>,
}

impl<T: PowerTransport> PendingCommand<T> {
    #[must_use]
    pub fn ticket(&self) -> &CommandTicket {
        &self.ticket
    }

    /// Send the command to every member.
    pub async fn execute(self) -> (CommandTicket, CommandOutcome) {
        let outcome = self
            .dispatcher
            .dispatch(&self.members, self.ticket.action)
            .await;
        (self.ticket, outcome)
    }
}

struct Managed {
    switch: AggregateSwitch,
    handle: SubscriptionHandle,
}

/// Owns the aggregate switches of the current build.
pub struct AggregateEngine<D, S: StateSource, T, P> {
    resolver: AreaResolver<D>,
    builder: AggregateBuilder,
    subscriptions: SubscriptionManager<S>,
    dispatcher: CommandDispatcher<T>,
    publisher: P,
    active_states: ActiveStates,
    cache: LiveStateCache,
    switches: BTreeMap<AggregateId, Managed>,
    published: HashSet<AggregateId>,
    exclusions: ExclusionSet,
    generation: u64,
    events: Option<mpsc::UnboundedReceiver<StateChange>>,
}

impl<D, S, T, P> AggregateEngine<D, S, T, P>
where
    D: Directory,
    S: StateSource,
    T: PowerTransport,
    P: SwitchPublisher,
{
    /// Create an engine with no aggregates. Call [`rebuild`](Self::rebuild)
    /// to populate it.
    pub fn new(
        directory: D,
        source: S,
        transport: Arc<T>,
        publisher: P,
        active_states: ActiveStates,
    ) -> Self {
        let (sink, events) = mpsc::unbounded_channel();
        Self {
            resolver: AreaResolver::new(directory),
            builder: AggregateBuilder::new(),
            subscriptions: SubscriptionManager::new(source, sink),
            dispatcher: CommandDispatcher::new(transport),
            publisher,
            active_states,
            cache: LiveStateCache::new(),
            switches: BTreeMap::new(),
            published: HashSet::new(),
            exclusions: ExclusionSet::new(),
            generation: 0,
            events: Some(events),
        }
    }

    /// Tear down every aggregate and build a fresh set.
    ///
    /// No aggregate survives: all subscriptions are released first, then
    /// the new set is resolved, subscribed, seeded with current states and
    /// published. Previously published ids without a successor are retracted.
    ///
    /// # Errors
    ///
    /// Returns the directory error if areas or entities cannot be listed;
    /// the previous aggregate set is left untouched in that case.
    #[tracing::instrument(skip_all, fields(excluded = exclusions.len()))]
    pub async fn rebuild(&mut self, exclusions: &ExclusionSet) -> Result<BuildReport, AreaMediaError> {
        let resolution = self.resolver.resolve(exclusions).await?;

        self.subscriptions.unsubscribe_all();
        self.switches.clear();
        self.cache.clear();
        self.generation += 1;
        self.exclusions = exclusions.clone();

        let plan = self.builder.build(&resolution, exclusions, &self.published);

        for unique_id in &plan.to_retire {
            self.published.remove(unique_id);
            self.emit(SwitchEvent::Retracted {
                unique_id: unique_id.clone(),
            })
            .await;
        }

        let mut created = Vec::with_capacity(plan.to_create.len());
        for mut switch in plan.to_create {
            let handle = self.subscriptions.subscribe(switch.id(), switch.members());
            self.seed(switch.members()).await;
            switch.recompute(&self.cache, &self.active_states);

            let unique_id = switch.id().clone();
            self.emit(SwitchEvent::Updated {
                snapshot: switch.snapshot(),
            })
            .await;
            self.published.insert(unique_id.clone());
            created.push(unique_id.clone());
            self.switches.insert(unique_id, Managed { switch, handle });
        }

        tracing::info!(
            created = created.len(),
            retired = plan.to_retire.len(),
            issues = resolution.issues.len(),
            "aggregates rebuilt"
        );

        Ok(BuildReport {
            created,
            retired: plan.to_retire,
            issues: resolution.issues,
            unassigned: resolution.unassigned.len(),
        })
    }

    /// Apply one member state change and recompute every aggregate that
    /// contains the member.
    ///
    /// Changes for entities no current aggregate watches, and changes older
    /// than what is already cached, are dropped. Returns the number of
    /// aggregates whose published state changed.
    pub async fn handle_state_change(&mut self, change: StateChange) -> usize {
        let targets: Vec<AggregateId> = self.subscriptions.targets(&change.entity_id).cloned().collect();
        if targets.is_empty() {
            tracing::trace!(entity_id = %change.entity_id, "dropping change for unwatched entity");
            return 0;
        }
        if !self.cache.apply(&change) {
            tracing::debug!(entity_id = %change.entity_id, "dropping stale state change");
            return 0;
        }

        let mut updated = Vec::new();
        for unique_id in &targets {
            let Some(managed) = self.switches.get_mut(unique_id) else {
                continue;
            };
            if managed.switch.recompute(&self.cache, &self.active_states) {
                updated.push(managed.switch.snapshot());
            }
        }

        let count = updated.len();
        for snapshot in updated {
            tracing::debug!(
                unique_id = %snapshot.unique_id,
                count = snapshot.attributes.count,
                total = snapshot.attributes.of,
                "aggregate recomputed"
            );
            self.emit(SwitchEvent::Updated { snapshot }).await;
        }
        count
    }

    /// Prepare a power command for every member of `aggregate_id` and
    /// publish the commanded value right away.
    ///
    /// The aggregate shows the commanded value until the next member state
    /// change triggers a recompute, whatever the per-member outcome. Member
    /// changes that arrive while the command is in flight therefore always
    /// win over the commanded value.
    ///
    /// # Errors
    ///
    /// Returns [`AreaMediaError::NotFound`] if no such aggregate exists in
    /// the current build.
    pub async fn prepare_command(
        &mut self,
        aggregate_id: &AggregateId,
        on: bool,
    ) -> Result<PendingCommand<T>, AreaMediaError> {
        let managed = self.switches.get_mut(aggregate_id).ok_or_else(|| NotFoundError {
            entity: "Aggregate",
            id: aggregate_id.to_string(),
        })?;
        managed.switch.assume_power(on);
        let pending = PendingCommand {
            ticket: CommandTicket {
                aggregate_id: aggregate_id.clone(),
                action: PowerAction::from_power(on),
                generation: self.generation,
            },
            members: managed.switch.members().to_vec(),
            dispatcher: self.dispatcher.clone(),
        };
        let snapshot = managed.switch.snapshot();
        self.emit(SwitchEvent::Updated { snapshot }).await;
        Ok(pending)
    }

    /// Report the outcome of a finished command.
    ///
    /// The commanded value was recorded when the command was issued, so
    /// this never touches switch state.
    pub fn complete_command(&self, ticket: &CommandTicket, outcome: &CommandOutcome) {
        if ticket.generation != self.generation {
            tracing::debug!(aggregate_id = %ticket.aggregate_id, "aggregate rebuilt while command was in flight");
        }
        if outcome.is_success() {
            tracing::info!(aggregate_id = %ticket.aggregate_id, action = %ticket.action, members = outcome.attempted(), "command completed");
        } else {
            tracing::warn!(
                aggregate_id = %ticket.aggregate_id,
                action = %ticket.action,
                failed = outcome.failed.len(),
                succeeded = outcome.succeeded.len(),
                "command partially failed"
            );
        }
    }

    /// Send a power command and wait for it; state changes arriving in the
    /// meantime are queued. [`run`] avoids that wait.
    ///
    /// # Errors
    ///
    /// Returns [`AreaMediaError::NotFound`] for an unknown aggregate.
    pub async fn set_power(&mut self, aggregate_id: &AggregateId, on: bool) -> Result<CommandOutcome, AreaMediaError> {
        let pending = self.prepare_command(aggregate_id, on).await?;
        let (ticket, outcome) = pending.execute().await;
        self.complete_command(&ticket, &outcome);
        Ok(outcome)
    }

    /// Every candidate player grouped by area label, for a configuration UI
    /// to pick exclusions from. Excluded players are listed too.
    ///
    /// # Errors
    ///
    /// Returns the directory error if areas or entities cannot be listed.
    pub async fn players_by_area(&self) -> Result<Vec<(String, Vec<PlayerChoice>)>, AreaMediaError> {
        let resolution = self.resolver.resolve(&self.exclusions).await?;
        Ok(resolution.players_by_area())
    }

    /// Exclusion list the current aggregates were built with.
    #[must_use]
    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    /// Published view of every current aggregate, in id order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<SwitchSnapshot> {
        self.switches
            .values()
            .map(|managed| managed.switch.snapshot())
            .collect()
    }

    #[must_use]
    pub fn switch(&self, aggregate_id: &AggregateId) -> Option<&AggregateSwitch> {
        self.switches.get(aggregate_id).map(|managed| &managed.switch)
    }

    /// Subscription handle held for `aggregate_id`, if it exists.
    #[must_use]
    pub fn subscription(&self, aggregate_id: &AggregateId) -> Option<&SubscriptionHandle> {
        self.switches.get(aggregate_id).map(|managed| &managed.handle)
    }

    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionManager<S> {
        &self.subscriptions
    }

    /// Retire a single aggregate: release its subscriptions and retract it.
    ///
    /// Returns `false` if it did not exist.
    pub async fn retire(&mut self, aggregate_id: &AggregateId) -> bool {
        let Some(managed) = self.switches.remove(aggregate_id) else {
            return false;
        };
        self.subscriptions.unsubscribe(&managed.handle);
        self.published.remove(aggregate_id);
        self.emit(SwitchEvent::Retracted {
            unique_id: aggregate_id.clone(),
        })
        .await;
        true
    }

    /// Take the receiving end of the state feed. Returns `None` once taken.
    pub fn take_state_events(&mut self) -> Option<mpsc::UnboundedReceiver<StateChange>> {
        self.events.take()
    }

    async fn seed(&mut self, members: &[EntityId]) {
        for member in members {
            if self.cache.contains(member) {
                continue;
            }
            match self.subscriptions.source().current_state(member).await {
                Ok(Some(change)) => {
                    self.cache.apply(&change);
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(%err, entity_id = %member, "cannot read current state"),
            }
        }
    }

    async fn emit(&self, event: SwitchEvent) {
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(%err, "failed to publish switch event");
        }
    }
}

/// Requests accepted by a running engine.
pub enum EngineCommand {
    SetPower {
        aggregate_id: AggregateId,
        on: bool,
        reply: oneshot::Sender<Result<CommandOutcome, AreaMediaError>>,
    },
    Reload {
        exclusions: ExclusionSet,
        reply: oneshot::Sender<Result<BuildReport, AreaMediaError>>,
    },
    Snapshots {
        reply: oneshot::Sender<Vec<SwitchSnapshot>>,
    },
    Shutdown,
}

/// The engine task is gone.
#[derive(Debug, thiserror::Error)]
#[error("aggregate engine is not running")]
pub struct EngineStopped;

impl From<EngineStopped> for AreaMediaError {
    fn from(err: EngineStopped) -> Self {
        Self::Host(Box::new(err))
    }
}

/// Cloneable front door to an engine driven by [`run`].
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Create a handle and the receiver [`run`] consumes.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EngineCommand>) {
        let (commands, rx) = mpsc::channel(capacity);
        (Self { commands }, rx)
    }

    /// Turn every member of `aggregate_id` on or off.
    ///
    /// # Errors
    ///
    /// Returns [`AreaMediaError::NotFound`] for an unknown aggregate, or an
    /// [`EngineStopped`] host error.
    pub async fn set_power(&self, aggregate_id: AggregateId, on: bool) -> Result<CommandOutcome, AreaMediaError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::SetPower {
            aggregate_id,
            on,
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineStopped)?
    }

    /// Rebuild every aggregate with a new exclusion list.
    ///
    /// # Errors
    ///
    /// Returns the rebuild error, or an [`EngineStopped`] host error.
    pub async fn reload(&self, exclusions: ExclusionSet) -> Result<BuildReport, AreaMediaError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Reload { exclusions, reply }).await?;
        rx.await.map_err(|_| EngineStopped)?
    }

    /// Current published view of every aggregate.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineStopped`] host error.
    pub async fn snapshots(&self) -> Result<Vec<SwitchSnapshot>, AreaMediaError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Snapshots { reply }).await?;
        Ok(rx.await.map_err(|_| EngineStopped)?)
    }

    /// Ask the engine loop to stop. No-op if it already stopped.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(EngineCommand::Shutdown).await;
    }

    async fn send(&self, command: EngineCommand) -> Result<(), EngineStopped> {
        self.commands.send(command).await.map_err(|_| EngineStopped)
    }
}

type Completion = (
    CommandTicket,
    CommandOutcome,
    oneshot::Sender<Result<CommandOutcome, AreaMediaError>>,
);

/// Drive `engine` until shutdown or until every [`EngineHandle`] is dropped.
///
/// State changes, commands and finished member requests are multiplexed on
/// this one task. Member requests run as in-flight futures, so recompute
/// keeps going while a command waits on a slow player.
pub async fn run<D, S, T, P>(
    mut engine: AggregateEngine<D, S, T, P>,
    mut commands: mpsc::Receiver<EngineCommand>,
) where
    D: Directory + Send + Sync + 'static,
    S: StateSource + Send + Sync + 'static,
    T: PowerTransport + Send + Sync + 'static,
    P: SwitchPublisher + Send + Sync + 'static,
{
    let Some(mut events) = engine.take_state_events() else {
        tracing::error!("state feed already taken, engine not started");
        return;
    };
    let mut in_flight: FuturesUnordered<BoxFuture<'static, Completion>> = FuturesUnordered::new();

    tracing::info!("aggregate engine started");
    loop {
        tokio::select! {
            Some(change) = events.recv() => {
                engine.handle_state_change(change).await;
            }
            Some((ticket, outcome, reply)) = in_flight.next(), if !in_flight.is_empty() => {
                engine.complete_command(&ticket, &outcome);
                let _ = reply.send(Ok(outcome));
            }
            command = commands.recv() => match command {
                Some(EngineCommand::SetPower { aggregate_id, on, reply }) => {
                    match engine.prepare_command(&aggregate_id, on).await {
                        Ok(pending) => in_flight.push(Box::pin(async move {
                            let (ticket, outcome) = pending.execute().await;
                            (ticket, outcome, reply)
                        })),
                        Err(err) => {
                            let _ = reply.send(Err(err));
                        }
                    }
                }
                Some(EngineCommand::Reload { exclusions, reply }) => {
                    let _ = reply.send(engine.rebuild(&exclusions).await);
                }
                Some(EngineCommand::Snapshots { reply }) => {
                    let _ = reply.send(engine.snapshots());
                }
                Some(EngineCommand::Shutdown) | None => break,
            },
        }
    }

    // finish commands already sent so callers get their outcome
    while let Some((ticket, outcome, reply)) = in_flight.next().await {
        engine.complete_command(&ticket, &outcome);
        let _ = reply.send(Ok(outcome));
    }
    tracing::info!("aggregate engine stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use areamedia_domain::area::Area;
    use areamedia_domain::device::Device;
    use areamedia_domain::entity::{MemberEntity, PlayerState};
    use areamedia_domain::id::DeviceId;
    use areamedia_domain::time::now;
    use crate::ports::StateSink;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct TestDirectory {
        areas: Vec<Area>,
        entities: Vec<MemberEntity>,
    }

    impl Directory for TestDirectory {
        fn list_areas(&self) -> impl Future<Output = Result<Vec<Area>, AreaMediaError>> + Send {
            let areas = self.areas.clone();
            async { Ok(areas) }
        }

        fn list_entities(
            &self,
        ) -> impl Future<Output = Result<Vec<MemberEntity>, AreaMediaError>> + Send {
            let entities = self.entities.clone();
            async { Ok(entities) }
        }

        fn get_device(
            &self,
            _id: &DeviceId,
        ) -> impl Future<Output = Result<Option<Device>, AreaMediaError>> + Send {
            async { Ok(None) }
        }
    }

    #[derive(Default)]
    struct TestSource {
        current: Mutex<HashMap<EntityId, PlayerState>>,
        sinks: Mutex<Vec<(EntityId, StateSink)>>,
    }

    impl TestSource {
        fn with_states(states: &[(&str, PlayerState)]) -> Arc<Self> {
            let source = Self::default();
            source.current.lock().unwrap().extend(
                states
                    .iter()
                    .map(|(id, state)| (EntityId::new(*id), state.clone())),
            );
            Arc::new(source)
        }

        fn push(&self, change: &StateChange) {
            for (entity_id, sink) in self.sinks.lock().unwrap().iter() {
                if *entity_id == change.entity_id {
                    let _ = sink.send(change.clone());
                }
            }
        }
    }

    impl StateSource for TestSource {
        type Registration = ();

        fn current_state(
            &self,
            entity_id: &EntityId,
        ) -> impl Future<Output = Result<Option<StateChange>, AreaMediaError>> + Send {
            let change = self
                .current
                .lock()
                .unwrap()
                .get(entity_id)
                .map(|state| StateChange::at(entity_id.clone(), state.clone(), now() - Duration::minutes(5)));
            async { Ok(change) }
        }

        fn subscribe(&self, entity_id: &EntityId, sink: StateSink) -> Result<(), AreaMediaError> {
            self.sinks.lock().unwrap().push((entity_id.clone(), sink));
            Ok(())
        }
    }

    #[derive(Default)]
    struct TestTransport {
        failing: HashSet<EntityId>,
        calls: Mutex<Vec<(EntityId, PowerAction)>>,
        gate: Option<Semaphore>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("player offline")]
    struct Offline;

    impl PowerTransport for TestTransport {
        fn call_service(
            &self,
            _domain: &'static str,
            action: PowerAction,
            entity_id: &EntityId,
        ) -> impl Future<Output = Result<(), AreaMediaError>> + Send {
            self.calls.lock().unwrap().push((entity_id.clone(), action));
            let fails = self.failing.contains(entity_id);
            async move {
                if let Some(gate) = &self.gate {
                    let _permit = gate.acquire().await.unwrap();
                }
                if fails {
                    Err(AreaMediaError::Host(Box::new(Offline)))
                } else {
                    Ok(())
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<SwitchEvent>>,
    }

    impl RecordingPublisher {
        fn retracted(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|event| match event {
                    SwitchEvent::Retracted { unique_id } => Some(unique_id.to_string()),
                    SwitchEvent::Updated { .. } => None,
                })
                .collect()
        }

        fn updates(&self) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|event| matches!(event, SwitchEvent::Updated { .. }))
                .count()
        }
    }

    impl SwitchPublisher for RecordingPublisher {
        fn publish(&self, event: SwitchEvent) -> impl Future<Output = Result<(), AreaMediaError>> + Send {
            self.events.lock().unwrap().push(event);
            async { Ok(()) }
        }
    }

    type Engine = AggregateEngine<TestDirectory, Arc<TestSource>, TestTransport, Arc<RecordingPublisher>>;

    const LIVING: &str = "area_media_players_living_room";
    const GARAGE: &str = "area_media_players_garage";
    const ALL: &str = "area_media_players_all";

    fn directory() -> TestDirectory {
        let player = |id: &str, area: &str| {
            MemberEntity::builder()
                .entity_id(id)
                .name(id)
                .area_id(area)
                .build()
                .unwrap()
        };
        TestDirectory {
            areas: vec![
                Area::builder().id("lr").name("Living Room").build().unwrap(),
                Area::builder().id("g").name("Garage").build().unwrap(),
            ],
            entities: vec![
                player("media_player.tv", "lr"),
                player("media_player.speaker", "lr"),
                player("media_player.soundbar", "lr"),
                player("media_player.radio", "g"),
            ],
        }
    }

    fn engine(
        source: &Arc<TestSource>,
        transport: TestTransport,
        publisher: &Arc<RecordingPublisher>,
    ) -> Engine {
        AggregateEngine::new(
            directory(),
            Arc::clone(source),
            Arc::new(transport),
            Arc::clone(publisher),
            ActiveStates::default(),
        )
    }

    fn id(raw: &str) -> AggregateId {
        AggregateId::new(raw)
    }

    fn counts(engine: &Engine, unique_id: &str) -> (usize, usize, bool) {
        let switch = engine.switch(&id(unique_id)).unwrap();
        (switch.active_count(), switch.total_count(), switch.displayed_on())
    }

    #[tokio::test]
    async fn should_seed_aggregates_from_current_states_on_rebuild() {
        let source = TestSource::with_states(&[
            ("media_player.tv", PlayerState::Playing),
            ("media_player.speaker", PlayerState::Off),
        ]);
        let publisher = Arc::new(RecordingPublisher::default());
        let mut engine = engine(&source, TestTransport::default(), &publisher);

        let report = engine.rebuild(&ExclusionSet::new()).await.unwrap();

        assert_eq!(report.created.len(), 3);
        assert!(report.retired.is_empty());
        assert_eq!(counts(&engine, LIVING), (1, 3, true));
        assert_eq!(counts(&engine, GARAGE), (0, 1, false));
        assert_eq!(counts(&engine, ALL), (1, 4, true));
        assert_eq!(publisher.updates(), 3);
    }

    #[tokio::test]
    async fn should_recompute_area_and_global_when_member_changes() {
        let source = TestSource::with_states(&[]);
        let publisher = Arc::new(RecordingPublisher::default());
        let mut engine = engine(&source, TestTransport::default(), &publisher);
        engine.rebuild(&ExclusionSet::new()).await.unwrap();

        let updated = engine
            .handle_state_change(StateChange::new(EntityId::new("media_player.radio"), PlayerState::Playing))
            .await;

        assert_eq!(updated, 2);
        assert_eq!(counts(&engine, GARAGE), (1, 1, true));
        assert_eq!(counts(&engine, ALL), (1, 4, true));
        assert_eq!(counts(&engine, LIVING), (0, 3, false));
    }

    #[tokio::test]
    async fn should_ignore_duplicate_and_older_notifications() {
        let source = TestSource::with_states(&[]);
        let publisher = Arc::new(RecordingPublisher::default());
        let mut engine = engine(&source, TestTransport::default(), &publisher);
        engine.rebuild(&ExclusionSet::new()).await.unwrap();
        let tv = EntityId::new("media_player.tv");
        let at = now();

        assert_eq!(
            engine
                .handle_state_change(StateChange::at(tv.clone(), PlayerState::Playing, at))
                .await,
            2
        );
        assert_eq!(
            engine
                .handle_state_change(StateChange::at(tv.clone(), PlayerState::Playing, at))
                .await,
            0
        );
        assert_eq!(
            engine
                .handle_state_change(StateChange::at(tv, PlayerState::Off, at - Duration::seconds(1)))
                .await,
            0
        );
        assert_eq!(counts(&engine, LIVING), (1, 3, true));
    }

    #[tokio::test]
    async fn should_attempt_every_member_and_assume_power_when_one_fails() {
        let source = TestSource::with_states(&[]);
        let publisher = Arc::new(RecordingPublisher::default());
        let transport = TestTransport {
            failing: [EntityId::new("media_player.speaker")].into_iter().collect(),
            ..Default::default()
        };
        let mut engine = engine(&source, transport, &publisher);
        engine.rebuild(&ExclusionSet::new()).await.unwrap();

        let outcome = engine.set_power(&id(LIVING), true).await.unwrap();

        assert_eq!(outcome.succeeded.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        let switch = engine.switch(&id(LIVING)).unwrap();
        assert!(switch.displayed_on());
        assert!(!switch.is_on());

        engine
            .handle_state_change(StateChange::new(EntityId::new("media_player.tv"), PlayerState::Playing))
            .await;
        let switch = engine.switch(&id(LIVING)).unwrap();
        assert_eq!(switch.assumed_on(), None);
        assert_eq!(switch.active_count(), 1);
    }

    #[tokio::test]
    async fn should_list_excluded_players_as_candidates() {
        let source = TestSource::with_states(&[]);
        let publisher = Arc::new(RecordingPublisher::default());
        let mut engine = engine(&source, TestTransport::default(), &publisher);
        let exclusions: ExclusionSet = ["media_player.radio"].into_iter().collect();
        engine.rebuild(&exclusions).await.unwrap();

        let listing = engine.players_by_area().await.unwrap();

        let labels: Vec<&str> = listing.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, vec!["Garage", "Living Room"]);
        assert_eq!(listing[0].1[0].id, EntityId::new("media_player.radio"));
        assert_eq!(engine.exclusions(), &exclusions);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_aggregate() {
        let source = TestSource::with_states(&[]);
        let publisher = Arc::new(RecordingPublisher::default());
        let mut engine = engine(&source, TestTransport::default(), &publisher);
        engine.rebuild(&ExclusionSet::new()).await.unwrap();

        let result = engine.set_power(&id("area_media_players_attic"), true).await;

        assert!(matches!(result, Err(AreaMediaError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_retire_area_whose_members_are_all_excluded() {
        let source = TestSource::with_states(&[]);
        let publisher = Arc::new(RecordingPublisher::default());
        let mut engine = engine(&source, TestTransport::default(), &publisher);
        engine.rebuild(&ExclusionSet::new()).await.unwrap();
        assert_eq!(engine.subscriptions().registrations(), 4);

        let exclusions: ExclusionSet = ["media_player.radio"].into_iter().collect();
        let report = engine.rebuild(&exclusions).await.unwrap();

        assert_eq!(report.retired, vec![id(GARAGE)]);
        assert_eq!(publisher.retracted(), vec![GARAGE.to_string()]);
        assert!(engine.switch(&id(GARAGE)).is_none());
        assert_eq!(engine.subscriptions().registrations(), 3);
        assert!(
            !engine
                .switch(&id(ALL))
                .unwrap()
                .contains(&EntityId::new("media_player.radio"))
        );
    }

    #[tokio::test]
    async fn should_release_subscriptions_when_retiring_one_aggregate() {
        let source = TestSource::with_states(&[]);
        let publisher = Arc::new(RecordingPublisher::default());
        let mut engine = engine(&source, TestTransport::default(), &publisher);
        engine.rebuild(&ExclusionSet::new()).await.unwrap();
        let radio = EntityId::new("media_player.radio");

        assert!(engine.retire(&id(GARAGE)).await);
        assert!(!engine.retire(&id(GARAGE)).await);

        assert_eq!(publisher.retracted(), vec![GARAGE.to_string()]);
        assert!(engine.subscription(&id(GARAGE)).is_none());
        let targets: Vec<_> = engine.subscriptions().targets(&radio).collect();
        assert_eq!(targets, vec![&id(ALL)]);
        assert_eq!(
            engine
                .handle_state_change(StateChange::new(radio, PlayerState::Playing))
                .await,
            1
        );
    }

    #[tokio::test]
    async fn should_not_carry_commanded_value_across_rebuild() {
        let source = TestSource::with_states(&[]);
        let publisher = Arc::new(RecordingPublisher::default());
        let mut engine = engine(&source, TestTransport::default(), &publisher);
        engine.rebuild(&ExclusionSet::new()).await.unwrap();

        let pending = engine.prepare_command(&id(LIVING), true).await.unwrap();
        assert_eq!(engine.switch(&id(LIVING)).unwrap().assumed_on(), Some(true));
        engine.rebuild(&ExclusionSet::new()).await.unwrap();
        let (ticket, outcome) = pending.execute().await;
        engine.complete_command(&ticket, &outcome);

        assert_eq!(engine.switch(&id(LIVING)).unwrap().assumed_on(), None);
    }

    #[tokio::test]
    async fn should_keep_recomputing_while_a_command_is_in_flight() {
        let source = TestSource::with_states(&[]);
        let publisher = Arc::new(RecordingPublisher::default());
        let transport = TestTransport {
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        };
        let transport = Arc::new(transport);
        let mut engine = AggregateEngine::new(
            directory(),
            Arc::clone(&source),
            Arc::clone(&transport),
            Arc::clone(&publisher),
            ActiveStates::default(),
        );
        engine.rebuild(&ExclusionSet::new()).await.unwrap();
        let (handle, commands) = EngineHandle::channel(8);
        let task = tokio::spawn(run(engine, commands));

        let command = tokio::spawn({
            let handle = handle.clone();
            async move { handle.set_power(id(GARAGE), false).await }
        });
        while transport.calls.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        source.push(&StateChange::new(EntityId::new("media_player.tv"), PlayerState::Playing));
        let living = loop {
            let snapshots = handle.snapshots().await.unwrap();
            let living = snapshots
                .into_iter()
                .find(|snapshot| snapshot.unique_id == id(LIVING))
                .unwrap();
            if living.is_on {
                break living;
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(living.attributes.count, 1);
        assert!(!command.is_finished());

        transport.gate.as_ref().unwrap().add_permits(1);
        let outcome = command.await.unwrap().unwrap();
        assert!(outcome.is_success());

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn should_let_member_change_during_command_decide_published_state() {
        let source = TestSource::with_states(&[
            ("media_player.tv", PlayerState::Playing),
            ("media_player.speaker", PlayerState::Playing),
        ]);
        let publisher = Arc::new(RecordingPublisher::default());
        let transport = Arc::new(TestTransport {
            failing: [EntityId::new("media_player.speaker")].into_iter().collect(),
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        });
        let mut engine = AggregateEngine::new(
            directory(),
            Arc::clone(&source),
            Arc::clone(&transport),
            Arc::clone(&publisher),
            ActiveStates::default(),
        );
        engine.rebuild(&ExclusionSet::new()).await.unwrap();
        let (handle, commands) = EngineHandle::channel(8);
        let task = tokio::spawn(run(engine, commands));
        let living = |snapshots: Vec<SwitchSnapshot>| {
            snapshots
                .into_iter()
                .find(|snapshot| snapshot.unique_id == id(LIVING))
                .unwrap()
        };

        let command = tokio::spawn({
            let handle = handle.clone();
            async move { handle.set_power(id(LIVING), false).await }
        });
        while transport.calls.lock().unwrap().len() < 3 {
            tokio::task::yield_now().await;
        }
        let commanded = living(handle.snapshots().await.unwrap());
        assert!(!commanded.is_on);
        assert_eq!(commanded.attributes.count, 2);

        // tv obeys before the speaker request gives up
        source.push(&StateChange::new(EntityId::new("media_player.tv"), PlayerState::Off));
        loop {
            let snapshot = living(handle.snapshots().await.unwrap());
            if snapshot.attributes.count == 1 {
                assert!(snapshot.is_on);
                break;
            }
            tokio::task::yield_now().await;
        }

        transport.gate.as_ref().unwrap().add_permits(1);
        let outcome = command.await.unwrap().unwrap();
        assert_eq!(outcome.failed.len(), 1);
        assert!(outcome.failed.contains_key(&EntityId::new("media_player.speaker")));

        let published = living(handle.snapshots().await.unwrap());
        assert_eq!(published.is_on, published.attributes.count > 0);
        assert!(published.is_on);
        assert_eq!(ids(&published.attributes.players_active), vec!["media_player.speaker"]);

        handle.shutdown().await;
        task.await.unwrap();
    }

    fn ids(entity_ids: &[EntityId]) -> Vec<&str> {
        entity_ids.iter().map(EntityId::as_str).collect()
    }

    #[tokio::test]
    async fn should_report_engine_stopped_after_shutdown() {
        let source = TestSource::with_states(&[]);
        let publisher = Arc::new(RecordingPublisher::default());
        let engine = engine(&source, TestTransport::default(), &publisher);
        let (handle, commands) = EngineHandle::channel(1);
        let task = tokio::spawn(run(engine, commands));

        handle.shutdown().await;
        task.await.unwrap();

        assert!(matches!(handle.snapshots().await, Err(AreaMediaError::Host(_))));
    }
}
