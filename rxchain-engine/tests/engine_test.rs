use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rxchain_engine::{Engine, Error};
use rxchain_engine::device::ProcessDrivers;
use rxchain_messages::{Command, Config, Event, SampleShape, SourceType};

// Test helpers to reduce boilerplate

fn silence_config(dir: &Path) -> Config {
    Config {
        source_type: SourceType::Silence,
        dump_dir: dir.to_path_buf(),
        ..Config::default()
    }
}

fn setup_engine(
    config: Config,
) -> (
    flume::Sender<Command>,
    flume::Receiver<Event>,
    JoinHandle<anyhow::Result<Config>>,
) {
    let (cmd_tx, cmd_rx) = flume::unbounded::<Command>();
    let (event_tx, event_rx) = flume::unbounded::<Event>();

    let handle = thread::spawn(move || {
        let engine = Engine::new(cmd_rx, event_tx, config, &ProcessDrivers::default())?;
        engine.run()
    });

    (cmd_tx, event_rx, handle)
}

fn teardown_engine(
    cmd_tx: flume::Sender<Command>,
    handle: JoinHandle<anyhow::Result<Config>>,
) -> Config {
    cmd_tx.send(Command::Stop).unwrap();
    handle.join().unwrap().unwrap()
}

fn skip_state_snapshot(event_rx: &flume::Receiver<Event>) {
    event_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("Should receive StateSnapshot");
}

fn next_event(event_rx: &flume::Receiver<Event>) -> Event {
    event_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("Should receive an event")
}

#[test]
fn test_engine_construction() {
    let dir = tempfile::tempdir().unwrap();
    let (cmd_tx, cmd_rx) = flume::unbounded::<Command>();
    let (event_tx, event_rx) = flume::unbounded::<Event>();

    let engine = Engine::new(
        cmd_rx,
        event_tx,
        silence_config(dir.path()),
        &ProcessDrivers::default(),
    );
    assert!(engine.is_ok());

    drop(cmd_tx);
    drop(event_rx);
}

#[test]
fn test_engine_rejects_bad_configuration() {
    let (_cmd_tx, cmd_rx) = flume::unbounded::<Command>();
    let (event_tx, _event_rx) = flume::unbounded::<Event>();
    // Checked before the tuner is opened
    let config = Config {
        source_type: SourceType::RtlSdr,
        original_source_type: SourceType::RtlSdr,
        sample_shape: SampleShape::Iq,
        input_sample_rate: 44_100,
        ..Config::default()
    };
    let err = Engine::new(cmd_rx, event_tx, config, &ProcessDrivers::default())
        .err()
        .expect("Engine should reject 44100 -> 48000");
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::Configuration(_))
    ));
}

#[test]
fn test_engine_sends_state_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let (cmd_tx, event_rx, handle) = setup_engine(silence_config(dir.path()));

    match next_event(&event_rx) {
        Event::StateSnapshot(state) => {
            assert_eq!(state.sample_rate, 48_000);
            assert_eq!(state.virtual_frequency, 17_200);
            assert_eq!(state.hardware_frequency, 17_200);
            assert_eq!(state.mode.as_deref(), Some("CW"));
        }
        other => panic!("First event should be StateSnapshot, got {:?}", other),
    }

    teardown_engine(cmd_tx, handle);
}

#[test]
fn test_engine_retunes() {
    let dir = tempfile::tempdir().unwrap();
    let (cmd_tx, event_rx, handle) = setup_engine(silence_config(dir.path()));
    skip_state_snapshot(&event_rx);

    cmd_tx.send(Command::SetFrequency(20_900)).unwrap();
    match next_event(&event_rx) {
        Event::StateSnapshot(state) => assert_eq!(state.virtual_frequency, 20_900),
        other => panic!("Expected StateSnapshot, got {:?}", other),
    }

    // Below the CW tone
    cmd_tx.send(Command::SetFrequency(500)).unwrap();
    match next_event(&event_rx) {
        Event::CommandFailed(reason) => assert!(reason.contains("500")),
        other => panic!("Expected CommandFailed, got {:?}", other),
    }

    let config = teardown_engine(cmd_tx, handle);
    assert_eq!(config.frequency, 500);
}

#[test]
fn test_engine_options_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let (cmd_tx, event_rx, handle) = setup_engine(silence_config(dir.path()));
    skip_state_snapshot(&event_rx);

    cmd_tx
        .send(Command::SetOption {
            name: "bandwidth".into(),
            value: "75Hz".into(),
        })
        .unwrap();
    assert!(matches!(next_event(&event_rx), Event::CommandFailed(_)));

    cmd_tx
        .send(Command::SetOption {
            name: "bandwidth".into(),
            value: "250Hz".into(),
        })
        .unwrap();
    assert!(matches!(next_event(&event_rx), Event::StateSnapshot(_)));

    let config = teardown_engine(cmd_tx, handle);
    let options = config.receiver_options_for("CW");
    assert_eq!(options.get("bandwidth").map(String::as_str), Some("250Hz"));
    assert_eq!(options.get("humfilter").map(String::as_str), Some("50Hz"));
}

#[test]
fn test_engine_gain_and_filter_commands() {
    let dir = tempfile::tempdir().unwrap();
    let (cmd_tx, event_rx, handle) = setup_engine(silence_config(dir.path()));
    skip_state_snapshot(&event_rx);

    cmd_tx.send(Command::SetRfGain(-4)).unwrap();
    match next_event(&event_rx) {
        Event::StateSnapshot(state) => assert_eq!(state.rf_gain, -4),
        other => panic!("Expected StateSnapshot, got {:?}", other),
    }

    cmd_tx.send(Command::SetDemodulatorGain(200)).unwrap();
    assert!(matches!(next_event(&event_rx), Event::CommandFailed(_)));

    cmd_tx.send(Command::SetPreamp(1)).unwrap();
    match next_event(&event_rx) {
        Event::StateSnapshot(state) => assert_eq!(state.preamp, 1),
        other => panic!("Expected StateSnapshot, got {:?}", other),
    }

    // A sound card style source has no input filter
    cmd_tx.send(Command::SetFilterWidth(500)).unwrap();
    assert!(matches!(next_event(&event_rx), Event::CommandFailed(_)));

    teardown_engine(cmd_tx, handle);
}

#[test]
fn test_engine_reports_spectrum() {
    let dir = tempfile::tempdir().unwrap();
    let (cmd_tx, event_rx, handle) = setup_engine(silence_config(dir.path()));
    skip_state_snapshot(&event_rx);

    cmd_tx.send(Command::QuerySpectrum).unwrap();
    match next_event(&event_rx) {
        Event::Spectrum { rf, audio, .. } => {
            assert_eq!(rf.len(), 256);
            assert_eq!(audio.len(), 64);
        }
        other => panic!("Expected Spectrum, got {:?}", other),
    }

    teardown_engine(cmd_tx, handle);
}

#[test]
fn test_engine_stops_at_end_of_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.pcm");
    let bytes: Vec<u8> = (0..8 * 1024)
        .flat_map(|n: i32| ((n % 100 - 50) as i16 * 20).to_le_bytes())
        .collect();
    std::fs::write(&input, bytes).unwrap();

    let config = Config {
        source_type: SourceType::PcmFile,
        pcm_file: Some(input),
        dump_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let (_cmd_tx, event_rx, handle) = setup_engine(config);
    skip_state_snapshot(&event_rx);

    let config = handle.join().unwrap().unwrap();
    assert_eq!(config.source_type, SourceType::PcmFile);
}

#[test]
fn test_engine_runs_without_panic() {
    let dir = tempfile::tempdir().unwrap();
    let (cmd_tx, event_rx, handle) = setup_engine(silence_config(dir.path()));

    thread::sleep(Duration::from_millis(100));
    drop(event_rx);

    cmd_tx.send(Command::Stop).unwrap();
    let result = handle.join();
    assert!(result.is_ok(), "Engine thread should not panic");
}
