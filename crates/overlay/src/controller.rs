use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::geom::{Extent, ScreenPoint};
use foundation::ids::EntityKey;
use foundation::time::{Clock, Millis};
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use metadata::cache::{FetchOutcome, Lookup, MetadataCache};
use picking::controller::{PickController, PickIntent, PointerSample};
use picking::registry::EntityRegistry;
use picking::renderer::Renderer;
use runtime::intent_log::IntentLog;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::OverlayConfig;
use crate::machine::{DetailsUpdate, Generation, OverlayStateMachine};
use crate::state::{Details, OverlayState};

/// What the controller fed into the state machine, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    HoverChanged { key: Option<EntityKey> },
    PinRequested { key: EntityKey, at: ScreenPoint },
    ClosePanel,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// A completed metadata request, tagged with the generation it was made in.
#[derive(Debug, Clone)]
pub struct MetadataArrival {
    pub generation: Generation,
    pub key: EntityKey,
    pub outcome: FetchOutcome,
}

/// The current state together with the generation that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub generation: u64,
    #[serde(flatten)]
    pub state: OverlayState,
}

type Listener = Box<dyn FnMut(&OverlayState) + Send>;

/// Wires renderer picking, the metadata cache and the overlay state machine
/// into one UI-thread object.
///
/// - Input methods never fail; pick errors and fetch errors become data.
/// - Subscribers see every new snapshot, starting with the current one.
/// - Metadata requests run in the background; their results are applied by
///   [`OverlayController::drain_arrivals`], [`OverlayController::tick`] or the
///   async [`OverlayController::next_arrival`] and [`OverlayController::settle`].
///   A result whose generation is no longer current is dropped.
pub struct OverlayController<R: Renderer> {
    renderer: R,
    picker: PickController,
    machine: OverlayStateMachine,
    cache: MetadataCache,
    clock: Arc<dyn Clock>,
    listeners: BTreeMap<SubscriptionId, Listener>,
    next_subscription: u64,
    intents: IntentLog<Intent>,
    arrivals: FuturesUnordered<BoxFuture<'static, MetadataArrival>>,
    stale_discards: u64,
    last_pointer: Option<Millis>,
}

impl<R: Renderer> OverlayController<R> {
    pub fn new(
        renderer: R,
        registry: Arc<EntityRegistry>,
        cache: MetadataCache,
        config: &OverlayConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            renderer,
            picker: PickController::new(registry, config.throttle_interval_ms),
            machine: OverlayStateMachine::new(config),
            cache,
            clock,
            listeners: BTreeMap::new(),
            next_subscription: 0,
            intents: IntentLog::with_capacity(config.intent_log_capacity),
            arrivals: FuturesUnordered::new(),
            stale_discards: 0,
            last_pointer: None,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Readiness signal from the renderer. Input before this is ignored.
    pub fn renderer_ready(&mut self) {
        self.picker.set_ready();
    }

    pub fn is_ready(&self) -> bool {
        self.picker.is_ready()
    }

    /// Feeds one pointer sample.
    ///
    /// `timestamp` is the host's event time and only orders samples: one older
    /// than the previous sample is dropped. Throttle windows are measured on
    /// the injected clock, the same timeline [`OverlayController::tick`] uses.
    pub fn handle_pointer_move(&mut self, at: ScreenPoint, timestamp: Millis) {
        if self.last_pointer.is_some_and(|last| timestamp < last) {
            trace!(timestamp = timestamp.0, "out-of-order pointer sample dropped");
            return;
        }
        self.last_pointer = Some(timestamp);
        let sample = PointerSample {
            at,
            timestamp: self.clock.now(),
        };
        let pinned = self.machine.state().is_pinned();
        if let Some(intent) = self.picker.handle_pointer_move(&self.renderer, sample, pinned) {
            self.apply_pick(intent);
        }
    }

    /// Periodic driver: releases a collapsed pointer sample once its throttle
    /// window has passed, then applies any metadata that already arrived.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        let pinned = self.machine.state().is_pinned();
        if let Some(intent) = self.picker.tick(&self.renderer, now, pinned) {
            self.apply_pick(intent);
        }
        self.drain_arrivals();
    }

    pub fn handle_click(&mut self, at: ScreenPoint) {
        if let Some(intent) = self.picker.handle_click(&self.renderer, at) {
            self.apply_pick(intent);
        }
    }

    pub fn close_panel(&mut self) {
        self.record(Intent::ClosePanel);
        if self.machine.close().is_some() {
            self.picker.clear_hover();
            self.notify();
        }
    }

    pub fn invalidate_cache(&mut self, key: &EntityKey) -> bool {
        self.cache.invalidate(key)
    }

    /// Registers `listener` and immediately hands it the current snapshot.
    pub fn subscribe(
        &mut self,
        mut listener: impl FnMut(&OverlayState) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        listener(self.machine.state());
        self.listeners.insert(id, Box::new(listener));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn state(&self) -> &OverlayState {
        self.machine.state()
    }

    pub fn generation(&self) -> Generation {
        self.machine.generation()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            generation: self.machine.generation().0,
            state: self.machine.state().clone(),
        }
    }

    pub fn viewport(&self) -> Extent {
        self.machine.viewport()
    }

    pub fn set_viewport(&mut self, viewport: Extent) {
        if self.machine.set_viewport(viewport) {
            self.notify();
        }
    }

    /// Re-projects the hovered entity after the globe moved. An entity that
    /// no longer projects (rotated out of view) keeps its last anchor.
    pub fn reproject(&mut self) -> bool {
        let OverlayState::Hovering { entity, .. } = self.machine.state() else {
            return false;
        };
        let Some(point) = self.renderer.project_to_screen(&entity.key) else {
            trace!(key = %entity.key, "hovered entity not projectable; keeping anchor");
            return false;
        };
        let moved = self.machine.reanchor(point);
        if moved {
            self.notify();
        }
        moved
    }

    /// Applies every metadata result that is ready without waiting. Returns
    /// how many results were processed.
    pub fn drain_arrivals(&mut self) -> usize {
        let mut processed = 0;
        while let Some(Some(arrival)) = self.arrivals.next().now_or_never() {
            self.apply_arrival(arrival);
            processed += 1;
        }
        processed
    }

    /// Waits for the next metadata result and applies it.
    ///
    /// Returns `None` when no request is outstanding, otherwise whether the
    /// result changed the snapshot.
    pub async fn next_arrival(&mut self) -> Option<bool> {
        let arrival = self.arrivals.next().await?;
        Some(self.apply_arrival(arrival))
    }

    /// Waits until every outstanding metadata request has been applied or
    /// discarded.
    pub async fn settle(&mut self) {
        while self.next_arrival().await.is_some() {}
    }

    pub fn pending_fetches(&self) -> usize {
        self.arrivals.len()
    }

    pub fn intents(&self) -> &IntentLog<Intent> {
        &self.intents
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Metadata results dropped because the overlay moved on.
    pub fn stale_discards(&self) -> u64 {
        self.stale_discards
    }

    pub fn pick_count(&self) -> u64 {
        self.picker.pick_count()
    }

    fn apply_pick(&mut self, intent: PickIntent) {
        match intent {
            PickIntent::HoverChanged { entity, at } => {
                self.record(Intent::HoverChanged {
                    key: entity.as_ref().map(|e| e.key.clone()),
                });
                let target = entity.map(|entity| {
                    let anchor = self.renderer.project_to_screen(&entity.key).unwrap_or(at);
                    (entity, anchor)
                });
                let key = target.as_ref().map(|(e, _)| e.key.clone());
                if let Some(generation) = self.machine.hover_changed(target) {
                    if let Some(key) = key {
                        self.request_details(generation, key);
                    }
                    self.notify();
                }
            }
            PickIntent::PinRequested { entity, at } => {
                self.record(Intent::PinRequested {
                    key: entity.key.clone(),
                    at,
                });
                let key = entity.key.clone();
                let generation = self.machine.pin(entity, at);
                self.request_details(generation, key);
                self.notify();
            }
        }
    }

    fn request_details(&mut self, generation: Generation, key: EntityKey) {
        match self.cache.get(&key) {
            Lookup::Resolved(descriptor) => {
                self.machine
                    .apply_details(generation, &key, Details::Ready(descriptor));
            }
            Lookup::Pending(pending) => {
                trace!(%key, generation = generation.0, "awaiting metadata");
                self.arrivals.push(
                    async move {
                        let outcome = pending.outcome().await;
                        MetadataArrival {
                            generation,
                            key,
                            outcome,
                        }
                    }
                    .boxed(),
                );
            }
        }
    }

    fn apply_arrival(&mut self, arrival: MetadataArrival) -> bool {
        let MetadataArrival {
            generation,
            key,
            outcome,
        } = arrival;
        let details = match outcome {
            Ok(descriptor) => Details::Ready(descriptor),
            Err(err) => Details::Unavailable(err.to_string()),
        };
        match self.machine.apply_details(generation, &key, details) {
            DetailsUpdate::Applied => {
                debug!(%key, generation = generation.0, "metadata applied");
                self.notify();
                true
            }
            DetailsUpdate::Stale => {
                self.stale_discards += 1;
                false
            }
        }
    }

    fn record(&mut self, intent: Intent) {
        let now = self.clock.now();
        self.intents.record(now, intent);
    }

    fn notify(&mut self) {
        let state = self.machine.state();
        for listener in self.listeners.values_mut() {
            listener(state);
        }
    }
}

impl<R: Renderer> std::fmt::Debug for OverlayController<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayController")
            .field("state", self.machine.state())
            .field("generation", &self.machine.generation())
            .field("listeners", &self.listeners.len())
            .field("pending_fetches", &self.arrivals.len())
            .field("stale_discards", &self.stale_discards)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::{Intent, OverlayController};
    use crate::config::OverlayConfig;
    use crate::machine::Generation;
    use crate::state::{Details, Mode, OverlayState};
    use foundation::geom::{Extent, ScreenPoint};
    use foundation::ids::EntityKey;
    use foundation::time::{Clock, ManualClock, Millis, MonotonicClock};
    use futures_util::FutureExt;
    use metadata::cache::MetadataCache;
    use metadata::descriptor::Descriptor;
    use metadata::error::FetchError;
    use metadata::provider::{BoxFuture, DataProvider};
    use picking::markers::{Marker, MarkerLayer};
    use picking::registry::EntityRegistry;
    use pretty_assertions::assert_eq;
    use tokio::sync::oneshot;

    type Reply = Result<Descriptor, FetchError>;

    #[derive(Default)]
    struct GatedProvider {
        calls: AtomicUsize,
        gates: Mutex<BTreeMap<EntityKey, Vec<oneshot::Sender<Reply>>>>,
    }

    impl GatedProvider {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Completes the oldest outstanding fetch for `key`.
        fn release(&self, key: &str, reply: Reply) {
            let mut gates = self.gates.lock().expect("gates");
            let queue = gates.get_mut(&EntityKey::new(key)).expect("no fetch for key");
            assert!(!queue.is_empty(), "no outstanding fetch for {key}");
            queue.remove(0).send(reply).expect("receiver alive");
        }

        fn succeed(&self, key: &str, name: &str) {
            self.release(key, Ok(Descriptor::named(key, name)));
        }
    }

    impl DataProvider for GatedProvider {
        fn fetch(&self, key: EntityKey) -> BoxFuture<'static, Reply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = oneshot::channel();
            self.gates.lock().expect("gates").entry(key).or_default().push(tx);
            async move {
                rx.await
                    .unwrap_or_else(|_| Err(FetchError::Network("gate dropped".to_string())))
            }
            .boxed()
        }
    }

    const FR: ScreenPoint = ScreenPoint::new(100.0, 300.0);
    const DE: ScreenPoint = ScreenPoint::new(500.0, 300.0);
    const EMPTY: ScreenPoint = ScreenPoint::new(800.0, 700.0);

    struct Fixture {
        controller: OverlayController<MarkerLayer>,
        provider: Arc<GatedProvider>,
        clock: ManualClock,
    }

    /// A ready controller over France and Germany markers.
    fn globe(clock: Arc<dyn Clock>) -> (OverlayController<MarkerLayer>, Arc<GatedProvider>) {
        let marker = |key: &str, label: &str, at: ScreenPoint| Marker {
            key: EntityKey::new(key),
            label: label.to_string(),
            x: at.x,
            y: at.y,
            radius: 20.0,
        };
        let viewport = Extent::new(1000.0, 800.0);
        let layer = MarkerLayer::with_markers(
            viewport,
            [marker("FR", "France", FR), marker("DE", "Germany", DE)],
        );
        let registry =
            EntityRegistry::from_names([("France", "FR"), ("Germany", "DE")]).expect("registry");
        let provider = Arc::new(GatedProvider::default());
        let cache = MetadataCache::new(provider.clone());
        let config = OverlayConfig {
            viewport,
            ..OverlayConfig::default()
        };
        let mut controller =
            OverlayController::new(layer, Arc::new(registry), cache, &config, clock);
        controller.renderer_ready();
        (controller, provider)
    }

    impl Fixture {
        fn new() -> Self {
            let clock = ManualClock::new(Millis(1_000));
            let (controller, provider) = globe(Arc::new(clock.clone()));
            Self {
                controller,
                provider,
                clock,
            }
        }

        /// Moves the pointer after the throttle window has passed.
        fn hover(&mut self, at: ScreenPoint) {
            let now = self.clock.advance(50);
            self.controller.handle_pointer_move(at, now);
        }

        fn shown(&self) -> Option<&str> {
            self.controller.state().entity().map(|e| e.key.as_str())
        }
    }

    #[tokio::test]
    async fn repeated_hover_over_same_entity_is_idempotent() {
        let mut fx = Fixture::new();
        fx.hover(FR);
        let generation = fx.controller.generation();
        fx.hover(FR.offset(3.0, -2.0));
        fx.hover(FR.offset(-5.0, 1.0));

        assert_eq!(fx.controller.generation(), generation);
        assert_eq!(fx.provider.calls(), 1);
        assert_eq!(fx.shown(), Some("FR"));
        // The anchor stays on the projected entity, not the pointer.
        assert_eq!(fx.controller.state().anchor().map(|a| a.point), Some(FR));

        fx.provider.succeed("FR", "France");
        fx.controller.settle().await;
        assert_eq!(
            fx.controller.state().details(),
            Some(&Details::Ready(Arc::new(Descriptor::named("FR", "France"))))
        );
    }

    #[tokio::test]
    async fn rehover_before_resolution_shares_the_fetch() {
        let mut fx = Fixture::new();
        fx.hover(FR);
        fx.hover(EMPTY);
        fx.hover(FR);
        assert_eq!(fx.provider.calls(), 1);
        assert_eq!(fx.controller.pending_fetches(), 2);
        assert_eq!(fx.controller.cache().stats().coalesced, 1);

        fx.provider.succeed("FR", "France");
        fx.controller.settle().await;
        assert_eq!(fx.controller.stale_discards(), 1);
        assert!(matches!(
            fx.controller.state().details(),
            Some(Details::Ready(d)) if d.name == "France"
        ));
    }

    #[tokio::test]
    async fn snapshots_are_always_a_single_mode() {
        let mut fx = Fixture::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        fx.controller.subscribe(move |state: &OverlayState| {
            sink.lock().expect("sink").push(state.mode());
        });

        fx.hover(FR);
        fx.controller.handle_click(DE);
        fx.controller.close_panel();

        let seen = seen.lock().expect("sink").clone();
        assert_eq!(seen, vec![Mode::Idle, Mode::Hovering, Mode::Pinned, Mode::Idle]);
    }

    #[tokio::test]
    async fn pin_suppresses_hover_until_close_or_new_pin() {
        let mut fx = Fixture::new();
        fx.controller.handle_click(FR);
        assert_eq!(fx.controller.state().mode(), Mode::Pinned);
        let picks = fx.controller.pick_count();

        fx.hover(DE);
        fx.hover(EMPTY);
        fx.controller.tick();
        assert_eq!(fx.shown(), Some("FR"));
        assert_eq!(fx.controller.pick_count(), picks);

        // Clicking empty space does not dismiss the panel.
        fx.controller.handle_click(EMPTY);
        assert_eq!(fx.controller.state().mode(), Mode::Pinned);

        fx.controller.handle_click(DE);
        assert_eq!(fx.shown(), Some("DE"));
        assert!(fx.controller.state().is_pinned());

        fx.controller.close_panel();
        assert_eq!(fx.controller.state(), &OverlayState::Idle);
        fx.hover(DE);
        assert_eq!(fx.controller.state().mode(), Mode::Hovering);
        assert_eq!(fx.shown(), Some("DE"));
    }

    #[tokio::test]
    async fn stale_hover_result_is_discarded() {
        let mut fx = Fixture::new();
        fx.hover(FR);
        fx.hover(DE);

        fx.provider.succeed("FR", "France");
        assert_eq!(fx.controller.next_arrival().await, Some(false));
        assert_eq!(fx.shown(), Some("DE"));
        assert_eq!(fx.controller.state().details(), Some(&Details::Loading));

        fx.provider.succeed("DE", "Germany");
        assert_eq!(fx.controller.next_arrival().await, Some(true));
        assert!(matches!(
            fx.controller.state().details(),
            Some(Details::Ready(d)) if d.name == "Germany"
        ));
        assert_eq!(fx.controller.next_arrival().await, None);
    }

    #[tokio::test]
    async fn later_pin_wins_over_earlier_resolution() {
        let mut fx = Fixture::new();
        fx.controller.handle_click(FR);
        let g1 = fx.controller.generation();
        fx.controller.handle_click(DE);
        let g2 = fx.controller.generation();
        assert!(g2 > g1);

        fx.provider.succeed("FR", "France");
        fx.controller.next_arrival().await;
        assert_eq!(fx.shown(), Some("DE"));
        assert_eq!(fx.controller.generation(), g2);
        assert_eq!(fx.controller.stale_discards(), 1);

        // A cached entity pins with its details already present.
        fx.controller.handle_click(FR);
        assert!(matches!(
            fx.controller.state().details(),
            Some(Details::Ready(d)) if d.name == "France"
        ));
    }

    #[tokio::test]
    async fn failed_fetch_shows_fallback_and_retries_next_time() {
        let mut fx = Fixture::new();
        fx.controller.handle_click(FR);
        fx.provider
            .release("FR", Err(FetchError::NotFound { key: EntityKey::new("FR") }));
        fx.controller.settle().await;
        assert!(matches!(
            fx.controller.state().details(),
            Some(Details::Unavailable(_))
        ));

        fx.controller.close_panel();
        fx.controller.handle_click(FR);
        assert_eq!(fx.provider.calls(), 2);
        assert_eq!(fx.controller.state().details(), Some(&Details::Loading));
    }

    #[tokio::test]
    async fn input_before_readiness_is_ignored() {
        let provider = Arc::new(GatedProvider::default());
        let registry = EntityRegistry::from_names([("France", "FR")]).expect("registry");
        let layer = MarkerLayer::with_markers(
            Extent::new(1000.0, 800.0),
            [Marker {
                key: EntityKey::new("FR"),
                label: "FR".to_string(),
                x: FR.x,
                y: FR.y,
                radius: 20.0,
            }],
        );
        let mut controller = OverlayController::new(
            layer,
            Arc::new(registry),
            MetadataCache::new(provider.clone()),
            &OverlayConfig::default(),
            Arc::new(ManualClock::default()),
        );
        controller.handle_pointer_move(FR, Millis(0));
        controller.handle_click(FR);
        assert_eq!(controller.state(), &OverlayState::Idle);
        assert_eq!(provider.calls(), 0);

        controller.renderer_ready();
        controller.handle_click(FR);
        assert!(controller.state().is_pinned());
    }

    #[tokio::test]
    async fn collapsed_sample_fires_on_tick() {
        let mut fx = Fixture::new();
        let t0 = fx.clock.advance(50);
        fx.controller.handle_pointer_move(EMPTY, t0);
        fx.controller.handle_pointer_move(FR, t0.add(4));
        fx.controller.handle_pointer_move(DE, t0.add(8));
        assert_eq!(fx.controller.state(), &OverlayState::Idle);

        fx.clock.set(t0.add(10));
        fx.controller.tick();
        assert_eq!(fx.controller.state(), &OverlayState::Idle);

        fx.clock.set(t0.add(16));
        fx.controller.tick();
        assert_eq!(fx.shown(), Some("DE"));
        assert_eq!(fx.provider.calls(), 1);
    }

    #[tokio::test]
    async fn reproject_follows_rotation_and_keeps_anchor_when_hidden() {
        let mut fx = Fixture::new();
        fx.hover(FR);
        fx.controller.renderer_mut().pan(40.0, 0.0);
        assert!(fx.controller.reproject());
        let anchor = fx.controller.state().anchor().map(|a| a.point);
        assert_eq!(anchor, Some(FR.offset(40.0, 0.0)));

        fx.controller.renderer_mut().pan(-2_000.0, 0.0);
        assert!(!fx.controller.reproject());
        assert_eq!(fx.controller.state().anchor().map(|a| a.point), anchor);
        assert_eq!(fx.controller.generation(), Generation(1));
    }

    #[tokio::test]
    async fn intents_and_subscriptions() {
        let mut fx = Fixture::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let id = fx.controller.subscribe(move |_: &OverlayState| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        fx.hover(FR);
        fx.controller.handle_click(FR);
        fx.controller.close_panel();
        fx.controller.close_panel();
        assert!(fx.controller.unsubscribe(id));
        fx.hover(DE);

        // Initial snapshot plus hover, pin and one effective close.
        assert_eq!(count.load(Ordering::SeqCst), 4);
        let intents: Vec<Intent> = fx.controller.intents().iter().map(|l| l.item.clone()).collect();
        assert_eq!(
            intents,
            vec![
                Intent::HoverChanged {
                    key: Some(EntityKey::new("FR"))
                },
                Intent::PinRequested {
                    key: EntityKey::new("FR"),
                    at: FR
                },
                Intent::ClosePanel,
                Intent::ClosePanel,
                Intent::HoverChanged {
                    key: Some(EntityKey::new("DE"))
                },
            ]
        );
    }

    #[tokio::test]
    async fn resize_replaces_the_pinned_panel() {
        let mut fx = Fixture::new();
        fx.controller.handle_click(DE);
        let before = fx.controller.state().anchor().copied().expect("anchor");
        fx.controller.set_viewport(Extent::new(700.0, 800.0));
        let after = fx.controller.state().anchor().copied().expect("anchor");
        assert!(!before.placement.flipped_horizontally);
        assert!(after.placement.flipped_horizontally);
        assert_eq!(fx.controller.viewport(), Extent::new(700.0, 800.0));
    }

    #[tokio::test]
    async fn trailing_sample_uses_the_injected_clock() {
        // Host event times run far ahead of the controller clock.
        let clock = ManualClock::new(Millis(0));
        let (mut controller, _provider) = globe(Arc::new(clock.clone()));
        controller.handle_pointer_move(EMPTY, Millis(100_000));
        controller.handle_pointer_move(FR, Millis(100_004));
        controller.tick();
        assert_eq!(controller.state(), &OverlayState::Idle);

        clock.advance(20);
        controller.tick();
        assert_eq!(controller.state().entity().map(|e| e.key.as_str()), Some("FR"));
    }

    #[tokio::test]
    async fn trailing_sample_fires_with_the_monotonic_clock() {
        let (mut controller, _provider) = globe(Arc::new(MonotonicClock::new()));
        controller.handle_pointer_move(EMPTY, Millis(100_000));
        controller.handle_pointer_move(FR, Millis(100_004));

        tokio::time::sleep(Duration::from_millis(40)).await;
        controller.tick();
        assert_eq!(controller.state().mode(), Mode::Hovering);
        assert_eq!(controller.snapshot().generation, 1);
    }

    #[tokio::test]
    async fn out_of_order_pointer_samples_are_dropped() {
        let mut fx = Fixture::new();
        fx.controller.handle_pointer_move(FR, Millis(5_000));
        assert_eq!(fx.shown(), Some("FR"));

        fx.clock.advance(50);
        fx.controller.handle_pointer_move(EMPTY, Millis(4_990));
        fx.controller.tick();
        assert_eq!(fx.shown(), Some("FR"));

        fx.controller.handle_pointer_move(EMPTY, Millis(5_050));
        assert_eq!(fx.controller.state(), &OverlayState::Idle);
    }

    #[tokio::test]
    async fn invalidated_entity_is_fetched_again() {
        let mut fx = Fixture::new();
        let fr = EntityKey::new("FR");
        fx.controller.handle_click(FR);
        fx.provider.succeed("FR", "France");
        fx.controller.settle().await;
        fx.controller.close_panel();

        fx.controller.handle_click(FR);
        assert_eq!(fx.provider.calls(), 1);
        assert!(matches!(fx.controller.state().details(), Some(Details::Ready(_))));

        assert!(fx.controller.invalidate_cache(&fr));
        assert!(!fx.controller.invalidate_cache(&fr));
        fx.controller.close_panel();
        fx.controller.handle_click(FR);
        assert_eq!(fx.provider.calls(), 2);
        assert_eq!(fx.controller.state().details(), Some(&Details::Loading));

        fx.provider.succeed("FR", "République française");
        fx.controller.settle().await;
        assert!(matches!(
            fx.controller.state().details(),
            Some(Details::Ready(d)) if d.name == "République française"
        ));
    }

    #[tokio::test]
    async fn hover_failure_falls_back_without_blocking_transitions() {
        let mut fx = Fixture::new();
        fx.hover(FR);
        fx.provider
            .release("FR", Err(FetchError::Network("connection reset".to_string())));
        assert_eq!(fx.controller.next_arrival().await, Some(true));
        assert_eq!(fx.controller.state().mode(), Mode::Hovering);
        assert!(matches!(
            fx.controller.state().details(),
            Some(Details::Unavailable(msg)) if msg.contains("connection reset")
        ));

        fx.hover(DE);
        assert_eq!(fx.shown(), Some("DE"));
        assert_eq!(fx.controller.state().details(), Some(&Details::Loading));
        fx.provider.succeed("DE", "Germany");
        fx.controller.settle().await;
        assert!(matches!(fx.controller.state().details(), Some(Details::Ready(_))));
    }

    #[tokio::test]
    async fn results_after_moving_off_every_entity_leave_idle() {
        let mut fx = Fixture::new();
        fx.hover(FR);
        fx.hover(DE);
        fx.hover(EMPTY);
        assert_eq!(fx.controller.state(), &OverlayState::Idle);

        fx.provider.succeed("FR", "France");
        fx.provider.succeed("DE", "Germany");
        fx.controller.settle().await;
        assert_eq!(fx.controller.state(), &OverlayState::Idle);
        assert_eq!(fx.controller.stale_discards(), 2);
        assert_eq!(fx.controller.generation(), Generation(3));
    }
}
