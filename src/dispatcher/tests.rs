use serde_json::json;

use super::*;
use crate::config::DispatcherConfig;
use crate::engine::{ChannelLayout, EncoderEvent, EngineFactory, EngineRegistry};
use crate::engines::{synth_registry, LeadEngine};

fn synth_dispatcher() -> EngineDispatcher {
    EngineDispatcher::new(synth_registry().unwrap(), &DispatcherConfig::default()).unwrap()
}

fn drain_events(rx: &mut broadcast::Receiver<DispatcherEvent>) -> Vec<DispatcherEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn test_new_constructs_first_engine() {
    let dispatcher = synth_dispatcher();
    assert_eq!(dispatcher.current_index(), 0);
    assert_eq!(dispatcher.current().name(), "Off");
    assert_eq!(dispatcher.engine_type(), EngineType::Synth);
    assert_eq!(dispatcher.properties().selected_engine_idx.max(), 3);
}

#[test]
fn test_empty_registry_is_rejected() {
    let registry = EngineRegistry::new(EngineType::Synth);
    let result = EngineDispatcher::new(registry, &DispatcherConfig::default());
    assert!(matches!(result, Err(DispatchError::EmptyRegistry)));
}

#[test]
fn test_default_engine_from_config() {
    let config = DispatcherConfig {
        default_engine: Some("Bass".to_string()),
        ..DispatcherConfig::default()
    };
    let dispatcher = EngineDispatcher::new(synth_registry().unwrap(), &config).unwrap();
    assert_eq!(dispatcher.current().name(), "Bass");

    let config = DispatcherConfig {
        default_engine: Some("Theremin".to_string()),
        ..DispatcherConfig::default()
    };
    let dispatcher = EngineDispatcher::new(synth_registry().unwrap(), &config).unwrap();
    assert_eq!(dispatcher.current().name(), "Off");
}

#[test]
fn test_select_every_index_matches_name_table() {
    let mut dispatcher = synth_dispatcher();
    let names: Vec<String> = dispatcher
        .engine_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    for (index, name) in names.iter().enumerate() {
        let engine = dispatcher.select(index).unwrap();
        assert_eq!(engine.name(), name);
        assert_eq!(dispatcher.properties().selected_engine_idx.get(), index);
    }
}

#[test]
fn test_select_out_of_range_leaves_engine_untouched() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(1).unwrap();

    let err = dispatcher.select(4).err().unwrap();
    assert_eq!(err, DispatchError::InvalidSelection { index: 4, count: 4 });
    assert_eq!(dispatcher.current().name(), "Lead");
    assert_eq!(dispatcher.properties().selected_engine_idx.get(), 1);
}

#[test]
fn test_select_by_name() {
    let mut dispatcher = synth_dispatcher();
    assert_eq!(dispatcher.select_name("Noise").unwrap().name(), "Noise");

    let err = dispatcher.select_name("Theremin").err().unwrap();
    assert!(matches!(err, DispatchError::EngineNotFound { ref name } if name == "Theremin"));
    assert_eq!(dispatcher.current().name(), "Noise");
}

#[test]
fn test_select_factory_checks_category() {
    let mut dispatcher = synth_dispatcher();
    let lead = EngineFactory::of::<LeadEngine>();
    assert_eq!(dispatcher.select_factory(&lead).unwrap().name(), "Lead");

    let gain = EngineFactory::of::<crate::engines::GainEngine>();
    assert!(matches!(
        dispatcher.select_factory(&gain),
        Err(DispatchError::TypeMismatch { .. })
    ));
}

#[test]
fn test_switch_away_and_back_restores_state() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(1).unwrap();
    dispatcher
        .current_mut()
        .from_json(&json!({"frequency": 330.0, "cutoff": 0.9, "level": 0.2}))
        .unwrap();
    let before = dispatcher.current().to_json();

    dispatcher.select(2).unwrap();
    assert!(dispatcher.state_store().contains("Lead"));
    dispatcher.select(1).unwrap();

    assert_eq!(dispatcher.current().to_json(), before);
}

#[test]
fn test_preset_index_clamped_on_switch() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(1).unwrap();
    dispatcher.select_preset(2).unwrap();
    assert_eq!(dispatcher.selected_preset_index(), 2);

    // Bass ships a single preset
    dispatcher.select(2).unwrap();
    assert_eq!(dispatcher.properties().selected_preset_idx.max(), 0);
    assert_eq!(dispatcher.selected_preset_index(), 0);

    dispatcher.select(1).unwrap();
    assert_eq!(dispatcher.properties().selected_preset_idx.max(), 2);
    assert_eq!(dispatcher.selected_preset_index(), 0);
}

#[test]
fn test_select_preset_applies_data() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(1).unwrap();
    dispatcher.select_preset(1).unwrap();
    assert_eq!(dispatcher.current().to_json()["cutoff"], json!(0.95_f32 as f64));

    assert_eq!(
        dispatcher.select_preset(9),
        Err(DispatchError::PresetNotFound { index: 9 })
    );
    assert_eq!(dispatcher.selected_preset_index(), 1);
}

#[test]
fn test_make_new_preset_appends_and_selects() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(2).unwrap();
    dispatcher
        .current_mut()
        .from_json(&json!({"drive": 4.0}))
        .unwrap();

    let index = dispatcher.make_new_preset("warm");
    assert_eq!(index, 1);
    assert_eq!(dispatcher.selected_preset_index(), 1);
    assert_eq!(dispatcher.presets()[1].name, "warm");
    assert_eq!(dispatcher.presets()[1].data["drive"], json!(4.0));
}

#[test]
fn test_make_new_preset_overwrites_same_name_in_place() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(1).unwrap();
    dispatcher.select_preset(2).unwrap();

    let index = dispatcher.make_new_preset("init");
    assert_eq!(index, 0);
    assert_eq!(dispatcher.presets().len(), 3);
    assert_eq!(dispatcher.selected_preset_index(), 0);
    assert_eq!(dispatcher.presets()[0].data, dispatcher.current().to_json());
}

#[test]
fn test_make_new_preset_blank_name_is_generated() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(3).unwrap();
    let index = dispatcher.make_new_preset("   ");
    assert_eq!(dispatcher.presets()[index].name, "Noise 1");
}

#[test]
fn test_generated_preset_name_skips_taken_names() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select_name("Bass").unwrap();
    dispatcher.make_new_preset("Bass 2");
    let kept = dispatcher.presets()[1].data.clone();

    let index = dispatcher.make_new_preset("");
    assert_eq!(index, 2);
    assert_eq!(dispatcher.presets()[2].name, "Bass 3");
    assert_eq!(dispatcher.presets()[1].name, "Bass 2");
    assert_eq!(dispatcher.presets()[1].data, kept);
}

#[test]
fn test_take_handle_seeds_active_engine_data() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(1).unwrap();

    let mut handle = dispatcher.take_handle().unwrap();
    let mut feed = handle.take_feed();
    let data = feed.data.unwrap();
    assert_eq!(data.name, "Lead");
    assert_eq!(data.presets, vec!["init", "bright", "soft"]);

    // the feed's receiver already listens
    dispatcher.select(2).unwrap();
    let events = drain_events(&mut feed.events);
    assert!(events
        .iter()
        .any(|event| matches!(event, DispatcherEvent::EngineData(data) if data.name == "Bass")));
}

#[test]
fn test_direct_api_flushes_own_reports() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(2).unwrap();
    dispatcher.make_new_preset("warm");
    let pending = dispatcher.handle.as_ref().unwrap().pending_reports();
    assert_eq!(pending, 0);
}

#[test]
fn test_drain_leaves_reports_for_handle_holder() {
    let mut dispatcher = synth_dispatcher();
    let mut handle = dispatcher.take_handle().unwrap();

    handle.select_engine(1).unwrap();
    handle.select_preset(9).unwrap();
    dispatcher.drain_actions();

    // occupancy, saved state, switch, clamped preset, preset loaded
    assert_eq!(handle.pending_reports(), 5);
    assert_eq!(dispatcher.flush_reports(), 0);
    assert_eq!(handle.flush_reports(), 5);
    assert_eq!(handle.pending_reports(), 0);
}

#[test]
fn test_take_handle_once() {
    let mut dispatcher = synth_dispatcher();
    assert!(dispatcher.take_handle().is_some());
    assert!(dispatcher.take_handle().is_none());
}

#[test]
fn test_actions_scenario_off_lead_bass() {
    let mut dispatcher = synth_dispatcher();
    let mut handle = dispatcher.take_handle().unwrap();
    let mut rx = handle.subscribe();

    handle.select_engine(2).unwrap();
    handle.make_new_preset("warm").unwrap();
    assert_eq!(dispatcher.drain_actions(), 2);

    assert_eq!(dispatcher.current().name(), "Bass");
    assert_eq!(handle.snapshot().engine_idx, 2);
    assert_eq!(handle.snapshot().preset_idx, 1);

    let events = drain_events(&mut rx);
    let last_data = events
        .iter()
        .rev()
        .find_map(|event| match event {
            DispatcherEvent::EngineData(data) => Some(data.clone()),
            _ => None,
        })
        .expect("engine data published");
    assert_eq!(last_data.name, "Bass");
    assert_eq!(last_data.presets, vec!["init", "warm"]);
    assert!(events.contains(&DispatcherEvent::SelectionChanged {
        engine_idx: 2,
        preset_idx: 0
    }));
}

#[test]
fn test_action_select_engine_clamps() {
    let mut dispatcher = synth_dispatcher();
    let mut handle = dispatcher.take_handle().unwrap();

    handle.select_engine(99).unwrap();
    dispatcher.drain_actions();
    assert_eq!(dispatcher.current().name(), "Noise");
    assert_eq!(handle.snapshot().engine_idx, 3);
}

#[test]
fn test_action_select_preset_clamps() {
    let mut dispatcher = synth_dispatcher();
    let mut handle = dispatcher.take_handle().unwrap();

    handle.select_engine(1).unwrap();
    handle.select_preset(42).unwrap();
    dispatcher.drain_actions();
    assert_eq!(handle.snapshot().preset_idx, 2);
}

#[test]
fn test_action_select_preset_without_presets_is_noop() {
    let mut dispatcher = synth_dispatcher();
    let mut handle = dispatcher.take_handle().unwrap();
    let before = handle.snapshot();

    handle.select_preset(1).unwrap();
    assert_eq!(dispatcher.drain_actions(), 1);
    assert_eq!(dispatcher.current().name(), "Off");
    assert_eq!(handle.snapshot().preset_idx, before.preset_idx);
}

#[test]
fn test_drain_with_empty_queue() {
    let mut dispatcher = synth_dispatcher();
    assert_eq!(dispatcher.drain_actions(), 0);
}

#[test]
fn test_engine_input_forwarded_to_active_engine() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(1).unwrap();
    let mut handle = dispatcher.take_handle().unwrap();

    handle
        .forward_input(InputEvent::Encoder(EncoderEvent::new(0, 20)))
        .unwrap();
    dispatcher.drain_actions();
    let cutoff = dispatcher.current().to_json()["cutoff"].as_f64().unwrap();
    assert!((cutoff - 0.7).abs() < 1e-6);

    // Bass has no input capability
    dispatcher.select(2).unwrap();
    assert!(!dispatcher.handle_input(InputEvent::Encoder(EncoderEvent::new(0, 1))));
}

#[test]
fn test_to_json_shape() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(1).unwrap();
    dispatcher.select(2).unwrap();

    let doc = dispatcher.to_json();
    assert_eq!(doc["selected_engine_idx"], 2);
    assert_eq!(doc["selected_preset_idx"], 0);
    assert!(doc["engine_states"]["Off"].is_object());
    assert!(doc["engine_states"]["Lead"].is_object());
    assert!(doc["engine_states"].get("Bass").is_none());
    assert_eq!(doc["presets"]["Lead"].as_array().unwrap().len(), 3);
}

#[test]
fn test_round_trip_into_fresh_dispatcher() {
    let mut source = synth_dispatcher();
    source.select(2).unwrap();
    source
        .current_mut()
        .from_json(&json!({"drive": 6.0, "level": 0.3}))
        .unwrap();
    source.make_new_preset("gritty");
    source.save_engine_state();
    let doc = source.to_json();

    let mut restored = synth_dispatcher();
    restored.from_json(&doc).unwrap();

    assert_eq!(restored.current().name(), "Bass");
    assert_eq!(restored.current().to_json(), source.current().to_json());
    assert_eq!(restored.selected_preset_index(), 1);
    assert_eq!(restored.presets()[1].name, "gritty");
}

#[test]
fn test_from_json_does_not_save_outgoing_engine() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(1).unwrap();
    dispatcher
        .current_mut()
        .from_json(&json!({"cutoff": 0.05}))
        .unwrap();

    dispatcher
        .from_json(&json!({"selected_engine_idx": 2, "engine_states": {}}))
        .unwrap();
    assert!(!dispatcher.state_store().contains("Lead"));

    dispatcher.select(1).unwrap();
    assert_eq!(dispatcher.current().to_json()["cutoff"], json!(0.5));
}

#[test]
fn test_from_json_same_index_rebuilds_engine() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(1).unwrap();

    dispatcher
        .from_json(&json!({
            "selected_engine_idx": 1,
            "engine_states": {"Lead": {"frequency": 110.0, "cutoff": 0.25, "level": 0.5}}
        }))
        .unwrap();
    assert_eq!(dispatcher.current().to_json()["frequency"], json!(110.0));
}

#[test]
fn test_from_json_clamps_indices() {
    let mut dispatcher = synth_dispatcher();
    dispatcher
        .from_json(&json!({"selected_engine_idx": 99, "selected_preset_idx": -4}))
        .unwrap();
    assert_eq!(dispatcher.current().name(), "Noise");
    assert_eq!(dispatcher.current_index(), 3);
    assert_eq!(dispatcher.selected_preset_index(), 0);

    dispatcher
        .from_json(&json!({"selected_engine_idx": -1, "selected_preset_idx": 7}))
        .unwrap();
    assert_eq!(dispatcher.current().name(), "Off");
    assert_eq!(dispatcher.selected_preset_index(), 0);
}

#[test]
fn test_from_json_isolates_malformed_blob() {
    let mut dispatcher = synth_dispatcher();
    dispatcher
        .from_json(&json!({
            "selected_engine_idx": 2,
            "engine_states": {
                "Bass": {"drive": "very"},
                "Lead": {"frequency": 660.0, "cutoff": 0.4, "level": 0.8},
                "Theremin": {"wobble": 1}
            }
        }))
        .unwrap();

    // Bass comes up with defaults, the rest of the document still applies
    assert_eq!(dispatcher.current().name(), "Bass");
    assert_eq!(dispatcher.current().to_json()["drive"], json!(1.0));
    assert!(dispatcher.state_store().contains("Theremin"));

    dispatcher.select(1).unwrap();
    assert_eq!(dispatcher.current().to_json()["frequency"], json!(660.0));
}

#[test]
fn test_from_json_rejects_non_object_root() {
    let mut dispatcher = synth_dispatcher();
    dispatcher.select(1).unwrap();

    let err = dispatcher.from_json(&json!("nope")).unwrap_err();
    assert!(matches!(err, DispatchError::MalformedPersistedState { .. }));
    assert_eq!(dispatcher.current().name(), "Lead");
}

#[test]
fn test_process_delegates_to_active_engine() {
    let mut dispatcher = synth_dispatcher();
    let ctx = ProcessContext::new(48000, ChannelLayout::Stereo);
    let mut buffer = vec![0.3_f32; 128];

    dispatcher.process(&mut buffer, &ctx);
    assert!(buffer.iter().all(|&s| s == 0.0));

    dispatcher.select(1).unwrap();
    dispatcher.process(&mut buffer, &ctx);
    assert!(buffer.iter().any(|&s| s != 0.0));
}

#[test]
fn test_version_bumps_on_every_change() {
    let mut dispatcher = synth_dispatcher();
    let start = dispatcher.properties().version();
    dispatcher.select(1).unwrap();
    let after_switch = dispatcher.properties().version();
    assert!(after_switch > start);

    dispatcher.select_preset(1).unwrap();
    assert!(dispatcher.properties().version() > after_switch);
}

#[test]
fn test_dispatcher_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<EngineDispatcher>();
}
