// SelectorUi - engine/preset selector state machine
//
// Runs on the control thread and owns the dispatcher's handle. The screen
// flow is:
// 1. EngineScreen (initial): encoders and keys go to the active engine
// 2. Select key -> SelectorScreen: encoders move a cursor over presets,
//    or over engines while Shift is held
// 3. Confirm key, Select key again, or idle timeout -> commit the cursor
//    as Actions and return to EngineScreen
//
// Nothing here touches the dispatcher directly. Every change goes through
// the action queue and is applied at the owner's next drain. Being the
// handle's holder, the UI also flushes the owner's deferred reports.

use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::sync::broadcast;

use crate::config::UiConfig;
use crate::dispatcher::{Action, DispatcherEvent, DispatcherHandle, SelectionSnapshot};
use crate::engine::{EncoderEvent, InputEvent, InputHandler, Key, PresetSelectorData};
use crate::error::log_dispatch_error;

/// Which screen currently receives input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    EngineScreen,
    SelectorScreen,
}

impl ScreenKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ScreenKind::EngineScreen => "ENGINE",
            ScreenKind::SelectorScreen => "SELECT",
        }
    }
}

/// What the selector screen renders
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorView {
    pub engines: Vec<String>,
    /// Highlighted engine
    pub engine_cursor: usize,
    /// Highlighted preset
    pub preset_cursor: usize,
    /// Presets of the active engine, from the last published engine data
    pub presets: Vec<String>,
    /// Encoders move the engine cursor while true
    pub shift: bool,
}

/// What the engine screen renders
#[derive(Debug, Clone, PartialEq)]
pub struct EngineView {
    pub engine_idx: usize,
    pub preset_idx: usize,
    pub data: Option<PresetSelectorData>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    engine: usize,
    preset: usize,
    engine_moved: bool,
    preset_moved: bool,
}

/// Input handling adapter and screen state machine for one dispatcher
pub struct SelectorUi {
    handle: DispatcherHandle,
    events: broadcast::Receiver<DispatcherEvent>,
    screen: ScreenKind,
    shift: bool,
    cursor: Cursor,
    timeout: Duration,
    last_activity: Instant,
    engine_data: Option<PresetSelectorData>,
}

impl SelectorUi {
    /// Start on the engine screen with the engine data seeded into the
    /// handle by `take_handle`.
    pub fn new(mut handle: DispatcherHandle, config: &UiConfig) -> Self {
        let feed = handle.take_feed();
        Self {
            handle,
            events: feed.events,
            screen: ScreenKind::EngineScreen,
            shift: false,
            cursor: Cursor::default(),
            timeout: config.selector_timeout(),
            last_activity: Instant::now(),
            engine_data: feed.data,
        }
    }

    pub fn screen(&self) -> ScreenKind {
        self.screen
    }

    pub fn dispatcher_handle(&self) -> &DispatcherHandle {
        &self.handle
    }

    /// Engine data from the handle's feed, updated by
    /// [`poll_events`](Self::poll_events).
    pub fn engine_data(&self) -> Option<&PresetSelectorData> {
        self.engine_data.as_ref()
    }

    /// Consume pending dispatcher notifications and flush its reports.
    ///
    /// # Returns
    /// Number of events received
    pub fn poll_events(&mut self) -> usize {
        self.handle.flush_reports();
        let mut received = 0;
        loop {
            match self.events.try_recv() {
                Ok(DispatcherEvent::EngineData(data)) => {
                    self.engine_data = Some(data);
                    received += 1;
                }
                Ok(DispatcherEvent::SelectionChanged { .. }) => received += 1,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!("[SelectorUi] Lagged, skipped {} events", skipped);
                }
                Err(_) => break,
            }
        }
        received
    }

    pub fn selector_screen(&self) -> SelectorView {
        SelectorView {
            engines: self.handle.engine_names().to_vec(),
            engine_cursor: self.cursor.engine,
            preset_cursor: self.cursor.preset,
            presets: self
                .engine_data
                .as_ref()
                .map(|data| data.presets.clone())
                .unwrap_or_default(),
            shift: self.shift,
        }
    }

    pub fn engine_screen(&self) -> EngineView {
        let snapshot = self.handle.snapshot();
        EngineView {
            engine_idx: snapshot.engine_idx,
            preset_idx: snapshot.preset_idx,
            data: self.engine_data.clone(),
        }
    }

    /// Commit on idle timeout.
    ///
    /// # Returns
    /// `true` if the selector timed out and returned to the engine screen
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.screen != ScreenKind::SelectorScreen {
            return false;
        }
        if now.saturating_duration_since(self.last_activity) < self.timeout {
            return false;
        }
        debug!("[SelectorUi] Selector timed out");
        self.commit();
        true
    }

    fn open_selector(&mut self) {
        let snapshot = self.handle.snapshot();
        self.cursor = Cursor {
            engine: snapshot.engine_idx,
            preset: snapshot.preset_idx,
            ..Cursor::default()
        };
        self.screen = ScreenKind::SelectorScreen;
        self.touch();
    }

    /// Send the moved cursor parts and return to the engine screen.
    fn commit(&mut self) {
        let cursor = self.cursor;
        if cursor.engine_moved {
            self.send(Action::SelectEngine(cursor.engine));
        }
        if cursor.preset_moved {
            self.send(Action::SelectPreset(cursor.preset));
        }
        self.screen = ScreenKind::EngineScreen;
        self.shift = false;
    }

    fn move_cursor(&mut self, steps: i32) {
        let snapshot = self.handle.snapshot();
        if self.shift {
            let engine = step(self.cursor.engine, steps, snapshot.engine_max);
            if engine != self.cursor.engine {
                self.cursor.engine = engine;
                self.cursor.engine_moved = engine != snapshot.engine_idx;
                // preset list of another engine is unknown until it is active
                self.cursor.preset = 0;
                self.cursor.preset_moved = false;
            }
        } else {
            let max = preset_max(&snapshot, &self.cursor);
            let preset = step(self.cursor.preset, steps, max);
            if preset != self.cursor.preset {
                self.cursor.preset = preset;
                self.cursor.preset_moved = true;
            }
        }
        self.touch();
    }

    fn forward(&mut self, event: InputEvent) -> bool {
        self.send(Action::EngineInput(event))
    }

    fn send(&mut self, action: Action) -> bool {
        match self.handle.send(action) {
            Ok(()) => true,
            Err(err) => {
                log_dispatch_error(&err, "SelectorUi");
                warn!("[SelectorUi] Action dropped, dispatcher is not draining");
                false
            }
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

impl InputHandler for SelectorUi {
    fn encoder(&mut self, event: EncoderEvent) -> bool {
        match self.screen {
            ScreenKind::EngineScreen => self.forward(InputEvent::Encoder(event)),
            ScreenKind::SelectorScreen => {
                self.move_cursor(event.steps);
                true
            }
        }
    }

    fn keypress(&mut self, key: Key) -> bool {
        match (self.screen, key) {
            (ScreenKind::EngineScreen, Key::Select) => {
                self.open_selector();
                true
            }
            (ScreenKind::SelectorScreen, Key::Select | Key::Confirm) => {
                self.commit();
                true
            }
            (_, Key::Shift) => {
                self.shift = true;
                true
            }
            (ScreenKind::EngineScreen, other) => self.forward(InputEvent::KeyPress(other)),
            (ScreenKind::SelectorScreen, _) => false,
        }
    }

    fn keyrelease(&mut self, key: Key) -> bool {
        match (self.screen, key) {
            (_, Key::Shift) => {
                self.shift = false;
                true
            }
            (ScreenKind::EngineScreen, Key::Pad(_) | Key::Other(_)) => {
                self.forward(InputEvent::KeyRelease(key))
            }
            _ => false,
        }
    }
}

/// Upper preset bound for the cursor. Known only for the active engine.
fn preset_max(snapshot: &SelectionSnapshot, cursor: &Cursor) -> Option<usize> {
    if cursor.engine == snapshot.engine_idx {
        Some(snapshot.preset_max)
    } else {
        None
    }
}

fn step(value: usize, steps: i32, max: impl Into<Option<usize>>) -> usize {
    let moved = (value as i64 + steps as i64).max(0) as usize;
    match max.into() {
        Some(max) => moved.min(max),
        None => moved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatcherConfig;
    use crate::dispatcher::EngineDispatcher;
    use crate::engines::synth_registry;

    fn setup() -> (EngineDispatcher, SelectorUi) {
        let mut dispatcher =
            EngineDispatcher::new(synth_registry().unwrap(), &DispatcherConfig::default()).unwrap();
        let handle = dispatcher.take_handle().unwrap();
        (dispatcher, SelectorUi::new(handle, &UiConfig::default()))
    }

    fn press(ui: &mut SelectorUi, key: Key) -> bool {
        ui.handle(InputEvent::KeyPress(key))
    }

    fn turn(ui: &mut SelectorUi, steps: i32) -> bool {
        ui.handle(InputEvent::Encoder(EncoderEvent::new(0, steps)))
    }

    #[test]
    fn test_select_key_opens_selector() {
        let (_dispatcher, mut ui) = setup();
        assert_eq!(ui.screen(), ScreenKind::EngineScreen);
        assert!(press(&mut ui, Key::Select));
        assert_eq!(ui.screen(), ScreenKind::SelectorScreen);
        assert_eq!(ui.screen().display_name(), "SELECT");
    }

    #[test]
    fn test_shift_encoder_selects_engine_on_confirm() {
        let (mut dispatcher, mut ui) = setup();
        press(&mut ui, Key::Select);
        press(&mut ui, Key::Shift);
        turn(&mut ui, 2);
        assert_eq!(ui.selector_screen().engine_cursor, 2);

        // nothing is sent before the commit
        assert_eq!(dispatcher.drain_actions(), 0);

        press(&mut ui, Key::Confirm);
        assert_eq!(ui.screen(), ScreenKind::EngineScreen);
        assert_eq!(dispatcher.drain_actions(), 1);
        assert_eq!(dispatcher.current().name(), "Bass");
    }

    #[test]
    fn test_engine_cursor_is_clamped() {
        let (_dispatcher, mut ui) = setup();
        press(&mut ui, Key::Select);
        press(&mut ui, Key::Shift);
        turn(&mut ui, 50);
        assert_eq!(ui.selector_screen().engine_cursor, 3);
        turn(&mut ui, -70);
        assert_eq!(ui.selector_screen().engine_cursor, 0);
    }

    #[test]
    fn test_encoder_moves_preset_cursor() {
        let (mut dispatcher, mut ui) = setup();
        dispatcher.select(1).unwrap();

        press(&mut ui, Key::Select);
        turn(&mut ui, 5);
        // Lead has three presets
        assert_eq!(ui.selector_screen().preset_cursor, 2);
        press(&mut ui, Key::Select);

        dispatcher.drain_actions();
        assert_eq!(dispatcher.selected_preset_index(), 2);
    }

    #[test]
    fn test_timeout_commits_and_returns() {
        let (mut dispatcher, mut ui) = setup();
        press(&mut ui, Key::Select);
        press(&mut ui, Key::Shift);
        turn(&mut ui, 1);

        assert!(!ui.tick(Instant::now()));
        assert!(ui.tick(Instant::now() + Duration::from_millis(3001)));
        assert_eq!(ui.screen(), ScreenKind::EngineScreen);

        dispatcher.drain_actions();
        assert_eq!(dispatcher.current().name(), "Lead");
    }

    #[test]
    fn test_tick_outside_selector_does_nothing() {
        let (_dispatcher, mut ui) = setup();
        assert!(!ui.tick(Instant::now() + Duration::from_secs(60)));
    }

    #[test]
    fn test_engine_screen_forwards_to_engine() {
        let (mut dispatcher, mut ui) = setup();
        dispatcher.select(1).unwrap();

        assert!(turn(&mut ui, 10));
        assert!(press(&mut ui, Key::Pad(4)));
        assert_eq!(dispatcher.drain_actions(), 2);

        let cutoff = dispatcher.current().to_json()["cutoff"].as_f64().unwrap();
        assert!((cutoff - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_selector_ignores_other_keys() {
        let (mut dispatcher, mut ui) = setup();
        press(&mut ui, Key::Select);
        assert!(!press(&mut ui, Key::Pad(1)));
        assert_eq!(dispatcher.drain_actions(), 0);
    }

    #[test]
    fn test_poll_events_tracks_engine_data() {
        let (mut dispatcher, mut ui) = setup();
        dispatcher.select(2).unwrap();

        assert!(ui.poll_events() >= 1);
        let data = ui.engine_data().unwrap();
        assert_eq!(data.name, "Bass");
        assert_eq!(ui.selector_screen().presets, vec!["init"]);
        assert_eq!(ui.engine_screen().engine_idx, 2);
    }

    #[test]
    fn test_ui_built_after_switch_shows_active_engine() {
        let mut dispatcher =
            EngineDispatcher::new(synth_registry().unwrap(), &DispatcherConfig::default()).unwrap();
        dispatcher.select(1).unwrap();
        let mut ui = SelectorUi::new(dispatcher.take_handle().unwrap(), &UiConfig::default());

        // nothing was published after the handle changed hands
        assert_eq!(ui.poll_events(), 0);
        assert_eq!(ui.engine_data().unwrap().name, "Lead");

        press(&mut ui, Key::Select);
        let view = ui.selector_screen();
        assert_eq!(view.presets, vec!["init", "bright", "soft"]);
        assert_eq!(view.presets, dispatcher.selector_data().presets);
    }

    #[test]
    fn test_poll_events_flushes_owner_reports() {
        let (mut dispatcher, mut ui) = setup();
        press(&mut ui, Key::Select);
        press(&mut ui, Key::Shift);
        turn(&mut ui, 1);
        press(&mut ui, Key::Confirm);
        dispatcher.drain_actions();
        assert!(ui.dispatcher_handle().pending_reports() > 0);

        ui.poll_events();
        assert_eq!(ui.dispatcher_handle().pending_reports(), 0);
    }

    #[test]
    fn test_step_saturates() {
        assert_eq!(step(0, -3, 5), 0);
        assert_eq!(step(4, 3, 5), 5);
        assert_eq!(step(4, 3, None), 7);
    }
}
