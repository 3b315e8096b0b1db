//! EngineDispatcher: owns the active engine of one [`EngineType`] and
//! mediates selection, switching, presets, and persistence.
//!
//! # Threading
//! The dispatcher is `Send` but never shared. Exactly one thread owns it
//! (normally the audio thread) and calls, in order, [`drain_actions`] and
//! [`process`] for each block. Both take `&mut self`, so a switch can only
//! ever happen between two processing calls, never during one.
//!
//! Other threads talk to it through the [`DispatcherHandle`] obtained from
//! [`take_handle`]: actions go in through a lock-free SPSC queue, selection
//! properties come out through atomics, and notifications through a
//! broadcast channel.
//!
//! The owning thread never logs or touches the telemetry hub. It pushes
//! [`Report`]s into a lock-free ring instead; whoever holds the handle
//! flushes them with [`DispatcherHandle::flush_reports`]. Until the handle
//! is taken, the direct API flushes on its own before returning; owners
//! that only drain (offline render) call
//! [`flush_reports`](EngineDispatcher::flush_reports).
//!
//! [`drain_actions`]: EngineDispatcher::drain_actions
//! [`process`]: EngineDispatcher::process
//! [`take_handle`]: EngineDispatcher::take_handle

use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use rtrb::Consumer;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::config::DispatcherConfig;
use crate::engine::{
    state_to_json, Engine, EngineFactory, EngineRegistry, EngineStateStore, EngineType,
    InputEvent, Preset, PresetBank, PresetSelectorData, ProcessContext,
};
use crate::error::{log_dispatch_error, DispatchError};

pub mod actions;
pub mod document;
pub mod properties;
pub mod reports;

pub use actions::{Action, DispatcherEvent, DispatcherHandle, EngineFeed};
pub use document::{DispatcherDocument, ParsedDocument};
pub use properties::{BoundedProperty, SelectionProperties, SelectionSnapshot};
pub use reports::{Report, ReportReceiver, REPORT_QUEUE_CAPACITY};

use reports::ReportSender;

/// Owns exactly one constructed engine selected from a fixed name table.
pub struct EngineDispatcher {
    registry: EngineRegistry,
    current: Box<dyn Engine>,
    current_idx: usize,
    states: EngineStateStore,
    presets: PresetBank,
    properties: Arc<SelectionProperties>,
    actions: Consumer<Action>,
    action_capacity: usize,
    events: broadcast::Sender<DispatcherEvent>,
    reports: ReportSender,
    handle: Option<DispatcherHandle>,
}

impl EngineDispatcher {
    /// Construct the dispatcher and the engine at index 0.
    ///
    /// If `config.default_engine` names a registered engine it is selected
    /// right away; an unknown name is logged and ignored.
    ///
    /// # Errors
    /// `EmptyRegistry` if no factory was registered.
    pub fn new(registry: EngineRegistry, config: &DispatcherConfig) -> Result<Self, DispatchError> {
        let first = registry.get(0).ok_or(DispatchError::EmptyRegistry)?;
        let current = first.construct();

        let properties = Arc::new(SelectionProperties::new(registry.len()));
        let (producer, consumer) = actions::action_queue(config.action_queue_capacity);
        let (events, _) = broadcast::channel(config.notification_buffer.max(1));
        let names: Arc<[String]> = registry
            .names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into();
        let (reports, report_receiver) = reports::report_queue(REPORT_QUEUE_CAPACITY);
        let handle = DispatcherHandle::new(
            producer,
            Arc::clone(&properties),
            events.clone(),
            names,
            report_receiver,
        );

        let mut dispatcher = Self {
            registry,
            current,
            current_idx: 0,
            states: EngineStateStore::new(),
            presets: PresetBank::new(),
            properties,
            actions: consumer,
            action_capacity: config.action_queue_capacity.max(1),
            events,
            reports,
            handle: Some(handle),
        };
        dispatcher.on_engine_activated();

        if let Some(name) = &config.default_engine {
            if let Err(err) = dispatcher.select_name(name) {
                warn!("[Dispatcher] Default engine ignored: {}", err);
            }
        }

        info!(
            "[Dispatcher] Initialized {} dispatcher with engines {:?}",
            dispatcher.engine_type(),
            dispatcher.registry.names()
        );
        dispatcher.flush_reports();
        Ok(dispatcher)
    }

    /// Take the control-side handle. Returns `None` after the first call.
    ///
    /// The handle's [`EngineFeed`] is seeded with the active engine's
    /// selector data, so a UI built from it starts with the right presets.
    pub fn take_handle(&mut self) -> Option<DispatcherHandle> {
        self.flush_reports();
        let data = self.selector_data();
        let mut handle = self.handle.take()?;
        handle.seed_feed(data);
        Some(handle)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn engine_type(&self) -> EngineType {
        self.registry.engine_type()
    }

    /// The active engine. Never absent once the dispatcher exists.
    pub fn current(&self) -> &dyn Engine {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> &mut dyn Engine {
        self.current.as_mut()
    }

    pub fn current_index(&self) -> usize {
        self.current_idx
    }

    /// Name-table entry of the active engine (the state-store key).
    pub fn current_name(&self) -> &str {
        self.registry
            .get(self.current_idx)
            .map(EngineFactory::name)
            .unwrap_or_else(|| self.current.name())
    }

    pub fn engine_count(&self) -> usize {
        self.registry.len()
    }

    pub fn engine_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn engine_factories(&self) -> &[EngineFactory] {
        self.registry.factories()
    }

    pub fn properties(&self) -> &SelectionProperties {
        &self.properties
    }

    pub fn selected_preset_index(&self) -> usize {
        self.properties.selected_preset_idx.get()
    }

    pub fn state_store(&self) -> &EngineStateStore {
        &self.states
    }

    pub fn preset_bank(&self) -> &PresetBank {
        &self.presets
    }

    /// Presets of the active engine.
    pub fn presets(&self) -> &[Preset] {
        self.presets.presets(self.current_name())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatcherEvent> {
        self.events.subscribe()
    }

    /// Selector metadata for the active engine.
    pub fn selector_data(&self) -> PresetSelectorData {
        let name = self.current_name();
        PresetSelectorData {
            name: name.to_string(),
            icon: self.current.icon().to_string(),
            presets: self.presets.preset_names(name),
        }
    }

    // ========================================================================
    // SELECTION (direct API: out-of-range requests are rejected)
    // ========================================================================

    /// Select engine by index.
    ///
    /// Switch order: save the outgoing engine's state under its name,
    /// destroy it, construct the incoming engine, then restore its stored
    /// state if any. Selecting the already active index is a no-op.
    ///
    /// # Errors
    /// `InvalidSelection` if `index >= engine_count()`; the active engine is
    /// left untouched.
    pub fn select(&mut self, index: usize) -> Result<&mut dyn Engine, DispatchError> {
        if index >= self.registry.len() {
            return Err(DispatchError::InvalidSelection {
                index,
                count: self.registry.len(),
            });
        }
        if index != self.current_idx {
            self.activate(index, true);
            self.flush_reports();
        }
        Ok(self.current.as_mut())
    }

    /// Select engine by name.
    ///
    /// # Errors
    /// `EngineNotFound` if no engine in the table carries `name`.
    pub fn select_name(&mut self, name: &str) -> Result<&mut dyn Engine, DispatchError> {
        let index = self
            .registry
            .index_of(name)
            .ok_or_else(|| DispatchError::EngineNotFound {
                name: name.to_string(),
            })?;
        self.select(index)
    }

    /// Select the engine built by `factory`, resolved through the name table.
    pub fn select_factory(
        &mut self,
        factory: &EngineFactory,
    ) -> Result<&mut dyn Engine, DispatchError> {
        if factory.engine_type() != self.engine_type() {
            return Err(DispatchError::TypeMismatch {
                expected: self.engine_type(),
                found: factory.engine_type(),
            });
        }
        self.select_name(factory.name())
    }

    /// Load preset `index` of the active engine.
    ///
    /// # Errors
    /// `PresetNotFound` if the active engine has no preset at `index`.
    pub fn select_preset(&mut self, index: usize) -> Result<(), DispatchError> {
        if index >= self.presets.len(self.current_name()) {
            return Err(DispatchError::PresetNotFound { index });
        }
        self.apply_preset(index);
        self.flush_reports();
        Ok(())
    }

    /// Snapshot the active engine as a preset named `name` and select it.
    ///
    /// An existing preset with the same name is overwritten in place. A
    /// blank name is replaced by `"<engine> <n>"`, with `n` bumped past any
    /// name already taken.
    ///
    /// # Returns
    /// Index of the preset in the active engine's list
    pub fn make_new_preset(&mut self, name: &str) -> usize {
        let index = self.create_preset(name);
        self.flush_reports();
        index
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    /// Serialize the active engine's full state under its name, replacing
    /// any earlier blob.
    pub fn save_engine_state(&mut self) {
        self.store_engine_state();
        self.flush_reports();
    }

    /// Persisted document: selection indices, the state store, and preset
    /// lists.
    ///
    /// Does not save the active engine first; call
    /// [`save_engine_state`](Self::save_engine_state) for a fresh blob.
    pub fn to_json(&self) -> Value {
        state_to_json(&DispatcherDocument {
            selected_engine_idx: self.properties.selected_engine_idx.get(),
            selected_preset_idx: self.properties.selected_preset_idx.get(),
            engine_states: self.states.as_map(),
            presets: self.presets.as_map(),
        })
    }

    /// Restore a document produced by [`to_json`](Self::to_json).
    ///
    /// Indices are re-validated against the current bounds. The active
    /// engine is rebuilt from the restored blob without saving the outgoing
    /// state first. Malformed segments are logged and skipped.
    ///
    /// # Errors
    /// `MalformedPersistedState` only if the root is not an object, in which
    /// case nothing is changed.
    pub fn from_json(&mut self, doc: &Value) -> Result<(), DispatchError> {
        let parsed = ParsedDocument::parse(doc).inspect_err(|err| {
            log_dispatch_error(err, "from_json");
        })?;
        for diagnostic in parsed.diagnostics {
            self.absorb(diagnostic, "from_json");
        }

        self.states.replace(parsed.engine_states);
        for (engine, list) in parsed.presets {
            self.presets.insert_list(&engine, list);
        }

        let engine_idx = self
            .properties
            .selected_engine_idx
            .clamp_signed(parsed.selected_engine_idx);
        if engine_idx as i64 != parsed.selected_engine_idx {
            warn!(
                "[Dispatcher] Persisted engine index {} clamped to {}",
                parsed.selected_engine_idx, engine_idx
            );
        }
        self.activate(engine_idx, false);

        let preset_idx = self
            .properties
            .selected_preset_idx
            .clamp_signed(parsed.selected_preset_idx);
        self.properties.selected_preset_idx.set(preset_idx);
        self.properties.bump_version();
        self.flush_reports();
        Ok(())
    }

    // ========================================================================
    // OWNING-THREAD LOOP
    // ========================================================================

    /// Apply every queued action. Call between processing calls only.
    ///
    /// Never logs or locks; diagnostics go to the report ring.
    ///
    /// # Returns
    /// Number of actions applied
    pub fn drain_actions(&mut self) -> usize {
        let pending = self.actions.slots();
        if pending == 0 {
            return 0;
        }
        let engine_type = self.engine_type();
        self.reports.push(Report::QueueOccupancy {
            engine_type,
            percent: pending as f32 * 100.0 / self.action_capacity as f32,
        });

        let mut applied = 0;
        while let Ok(action) = self.actions.pop() {
            self.apply_action(action);
            applied += 1;
        }
        applied
    }

    /// Run the active engine over one interleaved block.
    ///
    /// Real-time safe as long as the engine's own `process` is.
    #[inline]
    pub fn process(&mut self, buffer: &mut [f32], ctx: &ProcessContext) {
        self.current.process(buffer, ctx);
    }

    /// Forward an input event to the active engine's input capability.
    ///
    /// # Returns
    /// `true` if the engine consumed the event
    pub fn handle_input(&mut self, event: InputEvent) -> bool {
        self.current
            .input_handler()
            .map(|handler| handler.handle(event))
            .unwrap_or(false)
    }

    /// Publish active-engine metadata to UI subscribers.
    pub fn publish_engine_data(&self, data: PresetSelectorData) {
        // no subscribers is fine
        let _ = self.events.send(DispatcherEvent::EngineData(data));
    }

    /// Emit pending reports, provided the handle has not been taken yet.
    /// Once it has, its holder flushes them instead.
    ///
    /// # Returns
    /// Number of reports emitted
    pub fn flush_reports(&mut self) -> usize {
        self.handle
            .as_mut()
            .map(DispatcherHandle::flush_reports)
            .unwrap_or(0)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn apply_action(&mut self, action: Action) {
        let before = self.properties.snapshot();

        match action {
            Action::SelectEngine(requested) => {
                let index = self.properties.selected_engine_idx.clamp(requested);
                if index != requested {
                    self.absorb(
                        DispatchError::InvalidSelection {
                            index: requested,
                            count: self.registry.len(),
                        },
                        "SelectEngine action (clamped)",
                    );
                }
                if index != self.current_idx {
                    self.activate(index, true);
                }
            }
            Action::SelectPreset(requested) => {
                if self.presets.len(self.current_name()) == 0 {
                    self.absorb(
                        DispatchError::PresetNotFound { index: requested },
                        "SelectPreset action (no presets)",
                    );
                } else {
                    let index = self.properties.selected_preset_idx.clamp(requested);
                    if index != requested {
                        self.absorb(
                            DispatchError::PresetNotFound { index: requested },
                            "SelectPreset action (clamped)",
                        );
                    }
                    self.apply_preset(index);
                }
            }
            Action::MakeNewPreset(name) => {
                self.create_preset(&name);
            }
            Action::EngineInput(event) => {
                if !self.handle_input(event) {
                    let engine = self.current_name().to_string();
                    self.reports.push(Report::InputIgnored { engine, event });
                }
            }
        }

        let after = self.properties.snapshot();
        if after.engine_idx != before.engine_idx || after.preset_idx != before.preset_idx {
            let _ = self.events.send(DispatcherEvent::SelectionChanged {
                engine_idx: after.engine_idx,
                preset_idx: after.preset_idx,
            });
        }
    }

    /// Switch to `index` (already validated).
    fn activate(&mut self, index: usize, save_outgoing: bool) {
        let Some(factory) = self.registry.get(index).cloned() else {
            return;
        };
        let started = Instant::now();
        let outgoing = self.current_name().to_string();

        // 1. save
        if save_outgoing {
            self.store_engine_state();
        }

        // 2. destroy (Vacant is zero-sized, boxing it does not allocate)
        drop(std::mem::replace(&mut self.current, Box::new(Vacant)));

        // 3. construct
        let mut engine = factory.construct();
        if engine.name() != factory.name() {
            self.reports.push(Report::NameMismatch {
                reported: engine.name().to_string(),
                registered: factory.name().to_string(),
            });
        }

        // 4. restore
        if let Some(blob) = self.states.get(factory.name()) {
            if let Err(error) = engine.from_json(blob) {
                self.reports.push(Report::RestoreFailed { error });
                engine = factory.construct();
            }
        }

        self.current = engine;
        self.current_idx = index;
        self.on_engine_activated();

        let report = Report::Switched {
            engine_type: self.engine_type(),
            from: outgoing,
            to: self.current_name().to_string(),
            elapsed: started.elapsed(),
        };
        self.reports.push(report);
    }

    fn store_engine_state(&mut self) {
        let name = self.current_name().to_string();
        self.states.save(&name, self.current.to_json());
        self.reports.push(Report::StateSaved { engine: name });
    }

    fn create_preset(&mut self, name: &str) -> usize {
        let engine = self.current_name().to_string();
        let trimmed = name.trim();
        let preset_name = if trimmed.is_empty() {
            self.generated_preset_name(&engine)
        } else {
            trimmed.to_string()
        };

        let overwritten = self
            .presets
            .presets(&engine)
            .iter()
            .any(|p| p.name == preset_name);
        let index = self
            .presets
            .upsert(&engine, Preset::new(preset_name.clone(), self.current.to_json()));

        self.refresh_preset_bounds();
        self.properties.selected_preset_idx.set(index);
        self.properties.bump_version();
        self.publish_engine_data(self.selector_data());

        self.reports.push(Report::PresetCreated {
            engine,
            name: preset_name,
            index,
            overwritten,
        });
        index
    }

    /// `"<engine> <n>"` with the smallest `n > len` not already in use.
    fn generated_preset_name(&self, engine: &str) -> String {
        let taken = self.presets.presets(engine);
        (taken.len() + 1..)
            .map(|n| format!("{} {}", engine, n))
            .find(|candidate| !taken.iter().any(|p| &p.name == candidate))
            .unwrap_or_else(|| engine.to_string())
    }

    /// Post-switch bookkeeping shared by construction and `activate`.
    fn on_engine_activated(&mut self) {
        let name = self.current_name().to_string();
        let factory_presets = self.current.factory_presets();
        self.presets.seed(&name, factory_presets);

        self.properties.selected_engine_idx.set(self.current_idx);
        self.refresh_preset_bounds();
        self.properties.bump_version();
        self.publish_engine_data(self.selector_data());
    }

    fn refresh_preset_bounds(&self) {
        let max = self.presets.max_index(self.current_name());
        self.properties.selected_preset_idx.set_bounds(0, max);
    }

    fn apply_preset(&mut self, index: usize) {
        let engine = self.current_name().to_string();
        let Some(preset) = self.presets.get(&engine, index) else {
            return;
        };
        let preset_name = preset.name.clone();
        if let Err(error) = self.current.from_json(&preset.data) {
            self.absorb(error, "apply preset");
            return;
        }

        self.properties.selected_preset_idx.set(index);
        self.properties.bump_version();
        self.reports.push(Report::PresetSelected {
            engine,
            index,
            name: preset_name,
        });
    }

    /// Report an error that has no synchronous caller.
    fn absorb(&mut self, error: DispatchError, context: &'static str) {
        self.reports.push(Report::Rejected { error, context });
    }
}

/// Placeholder occupying the slot between destroying the outgoing engine and
/// installing the incoming one. Never observable from outside `activate`.
struct Vacant;

impl Engine for Vacant {
    fn name(&self) -> &str {
        ""
    }

    fn engine_type(&self) -> EngineType {
        EngineType::Synth
    }

    fn process(&mut self, buffer: &mut [f32], _ctx: &ProcessContext) {
        buffer.fill(0.0);
    }

    fn to_json(&self) -> Value {
        Value::Null
    }

    fn from_json(&mut self, _state: &Value) -> Result<(), DispatchError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests;
