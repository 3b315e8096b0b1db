// Cross-thread action channel
//
// Control threads never write dispatcher properties. They push an `Action`
// into a lock-free SPSC ring buffer; the dispatcher's owning thread drains
// the queue at its safe point (between processing calls) and applies each
// action, clamping values to the bounds current at that moment.
//
// Flow:
// 1. UI/control thread: DispatcherHandle::send(Action) -> rtrb producer
// 2. Owning thread: EngineDispatcher::drain_actions() -> rtrb consumer
// 3. Owner updates properties, switches engines, publishes DispatcherEvent
// 4. UI threads observe properties (atomics) and events (broadcast)
// 5. Control thread flushes the owner's deferred reports (see `reports`)

use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::properties::{SelectionProperties, SelectionSnapshot};
use super::reports::ReportReceiver;
use crate::engine::{InputEvent, PresetSelectorData};
use crate::error::DispatchError;

/// Discrete request applied by the dispatcher's owning thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Switch engine; out-of-range indices are clamped
    SelectEngine(usize),
    /// Load a preset of the active engine; out-of-range indices are clamped
    SelectPreset(usize),
    /// Snapshot the active engine as a named preset
    MakeNewPreset(String),
    /// Forward a decoded input event to the active engine
    EngineInput(InputEvent),
}

/// One-way notification from the dispatcher to UI collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DispatcherEvent {
    /// Active engine metadata, republished on switch and preset-list change
    EngineData(PresetSelectorData),
    /// A drained action changed at least one property
    SelectionChanged { engine_idx: usize, preset_idx: usize },
}

/// Both ends of the action queue.
pub(crate) fn action_queue(capacity: usize) -> (Producer<Action>, Consumer<Action>) {
    RingBuffer::new(capacity.max(1))
}

/// Control-side endpoint of a dispatcher.
///
/// There is exactly one handle per dispatcher (single producer). It is
/// `Send`, so it can be moved to the UI thread while the dispatcher moves to
/// the audio thread.
pub struct DispatcherHandle {
    actions: Producer<Action>,
    properties: Arc<SelectionProperties>,
    events: broadcast::Sender<DispatcherEvent>,
    engine_names: Arc<[String]>,
    reports: ReportReceiver,
    feed: Option<EngineFeed>,
}

/// Active-engine metadata as of [`EngineDispatcher::take_handle`], with a
/// receiver subscribed at that same moment, so nothing published later is
/// missed.
///
/// [`EngineDispatcher::take_handle`]: super::EngineDispatcher::take_handle
pub struct EngineFeed {
    pub data: Option<PresetSelectorData>,
    pub events: broadcast::Receiver<DispatcherEvent>,
}

impl DispatcherHandle {
    pub(crate) fn new(
        actions: Producer<Action>,
        properties: Arc<SelectionProperties>,
        events: broadcast::Sender<DispatcherEvent>,
        engine_names: Arc<[String]>,
        reports: ReportReceiver,
    ) -> Self {
        Self {
            actions,
            properties,
            events,
            engine_names,
            reports,
            feed: None,
        }
    }

    /// Record the engine data current at hand-over and start listening.
    pub(crate) fn seed_feed(&mut self, data: PresetSelectorData) {
        self.feed = Some(EngineFeed {
            data: Some(data),
            events: self.events.subscribe(),
        });
    }

    /// Take the seeded feed. Later calls get a fresh subscription with no
    /// data.
    pub fn take_feed(&mut self) -> EngineFeed {
        self.feed.take().unwrap_or_else(|| EngineFeed {
            data: None,
            events: self.events.subscribe(),
        })
    }

    /// Enqueue an action.
    ///
    /// # Errors
    /// `ActionQueueFull` when the owning thread has not drained recently
    /// enough; the action is dropped.
    pub fn send(&mut self, action: Action) -> Result<(), DispatchError> {
        self.actions.push(action)?;
        Ok(())
    }

    pub fn select_engine(&mut self, index: usize) -> Result<(), DispatchError> {
        self.send(Action::SelectEngine(index))
    }

    pub fn select_preset(&mut self, index: usize) -> Result<(), DispatchError> {
        self.send(Action::SelectPreset(index))
    }

    pub fn make_new_preset(&mut self, name: impl Into<String>) -> Result<(), DispatchError> {
        self.send(Action::MakeNewPreset(name.into()))
    }

    pub fn forward_input(&mut self, event: InputEvent) -> Result<(), DispatchError> {
        self.send(Action::EngineInput(event))
    }

    pub fn properties(&self) -> &SelectionProperties {
        &self.properties
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        self.properties.snapshot()
    }

    /// Subscribe to dispatcher notifications.
    ///
    /// Only events published after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatcherEvent> {
        self.events.subscribe()
    }

    pub fn engine_names(&self) -> &[String] {
        &self.engine_names
    }

    /// Free slots left in the action queue.
    pub fn free_slots(&self) -> usize {
        self.actions.slots()
    }

    /// Log and record everything the owning thread reported since the last
    /// flush. Call from a control thread, never from the audio thread.
    ///
    /// # Returns
    /// Number of reports emitted
    pub fn flush_reports(&mut self) -> usize {
        self.reports.flush()
    }

    pub fn pending_reports(&self) -> usize {
        self.reports.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::reports::report_queue;

    fn handle_with_capacity(capacity: usize) -> (DispatcherHandle, Consumer<Action>) {
        let (producer, consumer) = action_queue(capacity);
        let (events, _) = broadcast::channel(4);
        let names: Arc<[String]> = vec!["Off".to_string()].into();
        let (_sender, reports) = report_queue(4);
        let handle = DispatcherHandle::new(
            producer,
            Arc::new(SelectionProperties::new(1)),
            events,
            names,
            reports,
        );
        (handle, consumer)
    }

    #[test]
    fn test_actions_arrive_in_order() {
        let (mut handle, mut consumer) = handle_with_capacity(4);
        handle.select_engine(2).unwrap();
        handle.make_new_preset("warm").unwrap();

        assert_eq!(consumer.pop().unwrap(), Action::SelectEngine(2));
        assert_eq!(
            consumer.pop().unwrap(),
            Action::MakeNewPreset("warm".to_string())
        );
        assert!(consumer.pop().is_err());
    }

    #[test]
    fn test_full_queue_reports_error() {
        let (mut handle, _consumer) = handle_with_capacity(1);
        handle.select_preset(0).unwrap();
        assert_eq!(handle.free_slots(), 0);
        assert_eq!(handle.select_preset(1), Err(DispatchError::ActionQueueFull));
    }

    #[test]
    fn test_handle_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<DispatcherHandle>();
        assert_send::<Consumer<Action>>();
    }

    #[test]
    fn test_unseeded_feed_has_no_data() {
        let (mut handle, _consumer) = handle_with_capacity(1);
        let feed = handle.take_feed();
        assert!(feed.data.is_none());
    }

    #[test]
    fn test_seeded_feed_is_taken_once() {
        let (mut handle, _consumer) = handle_with_capacity(1);
        handle.seed_feed(PresetSelectorData {
            name: "Lead".to_string(),
            icon: String::new(),
            presets: vec!["init".to_string()],
        });

        let feed = handle.take_feed();
        assert_eq!(feed.data.unwrap().name, "Lead");
        assert!(handle.take_feed().data.is_none());
    }

    #[test]
    fn test_event_json_shape() {
        let event = DispatcherEvent::SelectionChanged {
            engine_idx: 1,
            preset_idx: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "selection_changed");
        assert_eq!(json["payload"]["engine_idx"], 1);
    }
}
