#![allow(dead_code)]

use log::LevelFilter;
use midi_seq::{Command, Engine, Host, Timer};
use std::io::Write;
use std::path::Path;
use std::sync::Once;

static LOGGER: Once = Once::new();

pub fn enable_logging() {
    LOGGER.call_once(logger_init)
}

fn logger_init() {
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} [{}] - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Warn)
        .init();
}

/// A scripted host. Time only moves when a test moves it, emitted bytes and
/// bangs are collected, and timers record the absolute moment they would
/// fire. `reply_on` plays the part of a downstream connection that reacts
/// to one particular byte by sending a command back.
pub struct TestHost {
    pub now: f64,
    pub out: Vec<u8>,
    pub bangs: usize,
    pub armed: [Option<f64>; 2],
    pub reply_on: Option<(u8, Command)>,
    pub open_dialogs: usize,
    pub save_dialogs: usize,
}

fn slot(timer: Timer) -> usize {
    match timer {
        Timer::Event => 0,
        Timer::Watchdog => 1,
    }
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            // logical time never starts at zero on a real scheduler, and
            // zero doubles as the engine's "paused" marker
            now: 1000.0,
            out: Vec::new(),
            bangs: 0,
            armed: [None, None],
            reply_on: None,
            open_dialogs: 0,
            save_dialogs: 0,
        }
    }

    pub fn armed_at(&self, timer: Timer) -> Option<f64> {
        self.armed[slot(timer)]
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }
}

impl Host for TestHost {
    fn now(&self) -> f64 {
        self.now
    }

    fn schedule(&mut self, timer: Timer, delay: f64) {
        self.armed[slot(timer)] = Some(self.now + delay);
    }

    fn cancel(&mut self, timer: Timer) {
        self.armed[slot(timer)] = None;
    }

    fn send(&mut self, byte: u8) -> Option<Command> {
        self.out.push(byte);
        match &self.reply_on {
            Some((trigger, command)) if *trigger == byte => {
                let command = command.clone();
                self.reply_on = None;
                Some(command)
            }
            _ => None,
        }
    }

    fn done(&mut self) {
        self.bangs += 1;
    }

    fn open_dialog(&mut self) {
        self.open_dialogs += 1;
    }

    fn save_dialog(&mut self, _default: Option<&Path>) {
        self.save_dialogs += 1;
    }
}

/// Advance time to the armed event timer and deliver it. Returns false when
/// nothing was armed.
pub fn fire_event(engine: &mut Engine, host: &mut TestHost) -> bool {
    match host.armed_at(Timer::Event) {
        Some(at) => {
            if at > host.now {
                host.now = at;
            }
            host.armed[0] = None;
            engine.clock(Timer::Event, host);
            true
        }
        None => false,
    }
}

/// Feed a slice of values through the float inlet.
pub fn feed(engine: &mut Engine, host: &mut TestHost, values: &[f64]) {
    for &value in values {
        engine.command(Command::Float(value), host);
    }
}

/// Record `messages` as a sequence with the given deltas, then stop.
pub fn record_sequence(engine: &mut Engine, host: &mut TestHost, messages: &[(f64, &[u8])]) {
    engine.command(Command::Record, host);
    for (delta, bytes) in messages {
        host.now += delta;
        for &byte in bytes.iter() {
            engine.command(Command::Float(f64::from(byte)), host);
        }
    }
    engine.command(Command::Stop, host);
    host.out.clear();
    host.bangs = 0;
}
