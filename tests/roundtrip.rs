mod utils;

use midi_seq::{Command, Engine, Mode};
use std::fs;
use tempfile::TempDir;
use utils::{enable_logging, fire_event, record_sequence, TestHost};

/// Two NoteOns half a second apart survive a trip through a MIDI file with
/// millisecond accuracy.
#[test]
fn midi_file_round_trip() {
    enable_logging();
    let td = TempDir::new().unwrap();
    let path = td.path().join("t.mid");
    let mut engine = Engine::new();
    let mut host = TestHost::new();
    record_sequence(
        &mut engine,
        &mut host,
        &[(0.0, &[144, 60, 100]), (500.0, &[144, 62, 100])],
    );
    engine.command(Command::Save(Some(path.clone())), &mut host);
    assert!(path.is_file());

    let mut reloaded = Engine::new();
    reloaded.command(Command::Open(Some(path)), &mut host);
    let events = reloaded.events();
    assert_eq!(2, events.len());
    assert_eq!(&[144, 60, 100], events[0].bytes());
    assert_eq!(&[144, 62, 100], events[1].bytes());
    assert!(events[0].delta().abs() <= 1.0);
    assert!((events[1].delta() - 500.0).abs() <= 1.0);
}

#[test]
fn midi_file_header_bytes() {
    let td = TempDir::new().unwrap();
    let path = td.path().join("t.mid");
    let mut engine = Engine::new();
    let mut host = TestHost::new();
    record_sequence(&mut engine, &mut host, &[(0.0, &[144, 60, 100])]);
    engine.command(Command::Save(Some(path.clone())), &mut host);

    let bytes = fs::read(&path).unwrap();
    assert_eq!(b"MThd", &bytes[0..4]);
    assert_eq!([0, 0, 0, 6], bytes[4..8]);
    assert_eq!([0, 1], bytes[8..10]); // format 1
    assert_eq!([0, 1], bytes[10..12]); // one track
    assert_eq!([0, 192], bytes[12..14]); // ticks per beat
    assert_eq!(b"MTrk", &bytes[14..18]);
    // the track ends with an end-of-track meta event
    assert_eq!(&[0xff, 0x2f, 0x00], &bytes[bytes.len() - 3..]);
}

#[test]
fn text_round_trip() {
    let td = TempDir::new().unwrap();
    let path = td.path().join("t.txt");
    let mut engine = Engine::new();
    let mut host = TestHost::new();
    record_sequence(
        &mut engine,
        &mut host,
        &[
            (0.0, &[144, 60, 100]),
            (12.5, &[240, 1, 2, 3]),
            (0.0, &[4, 247]),
            (1000.0, &[128, 60, 0]),
        ],
    );
    let saved = engine.events().to_vec();
    engine.save(&path).unwrap();

    let mut reloaded = Engine::new();
    reloaded.load(&path).unwrap();
    assert_eq!(saved, reloaded.events().to_vec());
}

#[test]
fn save_refuses_unknown_extensions() {
    let mut engine = Engine::new();
    let mut host = TestHost::new();
    record_sequence(&mut engine, &mut host, &[(0.0, &[144, 60, 100])]);
    let err = engine.save(std::path::Path::new("/tmp/t.wav")).unwrap_err();
    assert!(format!("{}", err).contains("can only save to .txt or .mid"));
}

#[test]
fn text_fallback_when_not_a_midi_file() {
    let td = TempDir::new().unwrap();
    let path = td.path().join("hand_written.txt");
    fs::write(&path, "0 144 60 100;\n250 128 60 0;\n").unwrap();
    let mut engine = Engine::new();
    let mut host = TestHost::new();
    engine.command(Command::Open(Some(path)), &mut host);
    let events = engine.events();
    assert_eq!(2, events.len());
    assert_eq!(&[144, 60, 100], events[0].bytes());
    assert!((events[1].delta() - 250.0).abs() < 1e-9);
}

#[test]
fn missing_file_leaves_the_sequence_alone() {
    let mut engine = Engine::new();
    let mut host = TestHost::new();
    record_sequence(&mut engine, &mut host, &[(0.0, &[144, 60, 100])]);
    engine.command(
        Command::Open(Some("/no/such/file/anywhere.mid".into())),
        &mut host,
    );
    assert_eq!(1, engine.events().len());
}

#[test]
fn unknown_save_extension_writes_nothing() {
    let td = TempDir::new().unwrap();
    let path = td.path().join("t.wav");
    let mut engine = Engine::new();
    let mut host = TestHost::new();
    record_sequence(&mut engine, &mut host, &[(0.0, &[144, 60, 100])]);
    engine.command(Command::Save(Some(path.clone())), &mut host);
    assert!(!path.exists());
}

#[test]
fn sysex_packets_are_not_saved_to_midi_files() {
    let td = TempDir::new().unwrap();
    let path = td.path().join("t.mid");
    let mut engine = Engine::new();
    let mut host = TestHost::new();
    record_sequence(
        &mut engine,
        &mut host,
        &[
            (0.0, &[240, 1, 2, 3]),
            (0.0, &[4, 247]),
            (10.0, &[144, 60, 100]),
        ],
    );
    engine.command(Command::Save(Some(path.clone())), &mut host);

    let mut reloaded = Engine::new();
    reloaded.command(Command::Open(Some(path)), &mut host);
    let events = reloaded.events();
    assert_eq!(1, events.len());
    assert_eq!(&[144, 60, 100], events[0].bytes());
}

#[test]
fn empty_text_save_reloads_as_empty() {
    let td = TempDir::new().unwrap();
    let path = td.path().join("empty.txt");
    let mut engine = Engine::new();
    let mut host = TestHost::new();
    engine.command(Command::Save(Some(path.clone())), &mut host);
    assert!(path.is_file());

    let mut reloaded = Engine::new();
    reloaded.command(Command::Open(Some(path)), &mut host);
    assert!(reloaded.events().is_empty());
}

/// A sequence loaded from a file plays back exactly like a recorded one.
#[test]
fn loaded_sequence_plays() {
    let td = TempDir::new().unwrap();
    let path = td.path().join("t.mid");
    let mut engine = Engine::new();
    let mut host = TestHost::new();
    record_sequence(
        &mut engine,
        &mut host,
        &[(0.0, &[144, 60, 100]), (500.0, &[128, 60, 0])],
    );
    engine.command(Command::Save(Some(path.clone())), &mut host);

    let mut player = Engine::new();
    player.command(Command::Open(Some(path)), &mut host);
    player.command(Command::Play, &mut host);
    while fire_event(&mut player, &mut host) {}
    assert_eq!(Mode::Idle, player.mode());
    assert_eq!(vec![144, 60, 100, 128, 60, 0], host.out);
    assert_eq!(1, host.bangs);
}
