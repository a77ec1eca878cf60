/*!
The sequence engine: a mode-driven state machine that records incoming MIDI
bytes into an event sequence, plays the sequence back against the host's
scheduled clock, follows an external tick stream, and keeps a note book so
that stopping always silences whatever is still sounding.

The engine owns no clock and no outlet of its own. Every entry point takes
the [`Host`], and everything the engine wants from its surroundings goes
through that trait. All calls are expected on one scheduler thread; the
engine never blocks and never spawns.
!*/

use crate::event::{fold_time, truncate_byte, Event, TempoEntry, META, TICK_EPSILON};
use crate::file::smf_read::{ScoreEvent, SmfReader};
use crate::file::smf_write::SmfWriter;
use crate::file::text;
use crate::notes::NoteBook;
use crate::store::Store;
use log::{debug, error, trace, warn};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Inline capacity of the event sequence before it moves to the heap.
const SEQ_INLINE: usize = 256;

/// Inline capacity of the tempo map.
const TEMPO_INLINE: usize = 128;

/// Nominal rate of the external tick stream, ticks per second.
const TICKS_PER_SEC: f64 = 48.0;

/// External ticks arriving closer together than this (ms) are discarded.
const MIN_TICK_DELAY: f64 = 1.0;

/// A speed argument at or below this behaves as a pause.
const TEMPO_EPSILON: f64 = 0.0001;

/// The track name written when a loaded file did not bring one.
const DEFAULT_TRACK_NAME: &str = "midi-track";

type Sequence = Store<Event, SEQ_INLINE>;
type TempoMap = Store<TempoEntry, TEMPO_INLINE>;

/// The engine's transport mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Idle,
    /// Incoming bytes are parsed and appended to the sequence.
    Record,
    /// The sequence is played against the host clock.
    Play,
    /// The sequence is played against an external tick stream.
    SlavePlay,
    /// The whole sequence is being emitted in one go (`dump`).
    PlayOnce,
}

/// The two timers the engine asks the host to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timer {
    /// Fires when the next event is due.
    Event,
    /// Fires when an expected external tick failed to arrive in time.
    Watchdog,
}

/// Everything the engine can be asked to do.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Clear the sequence and start recording.
    Record,
    /// Play the sequence at the current timescale.
    Play,
    /// Follow an external tick stream (see [`Command::Bang`]).
    Start,
    /// Leave whatever mode is active, silencing sounding notes.
    Stop,
    /// Freeze playback, remembering the time to the next event.
    Pause,
    /// Resume paused playback, or re-enter recording to append.
    Continue,
    /// Restart from the top when the end of the sequence is reached.
    Loop(bool),
    /// Retime playback to `percent` of recorded speed.
    Speed(f64),
    /// Emit the whole sequence immediately.
    Dump,
    /// Emit a NoteOff for every counted note.
    Panic,
    /// Empty the sequence and the tempo map.
    Clear,
    /// Load a file, trying the MIDI-file reader first and the text reader
    /// second. Without a name, the default name or the host dialog.
    Open(Option<PathBuf>),
    /// Save to a file: `.mid` writes a MIDI file, `.txt` writes text.
    Save(Option<PathBuf>),
    /// Ask the host to raise its file chooser.
    Click,
    /// In Record, a byte to ingest; otherwise nonzero plays, zero stops.
    Float(f64),
    /// One external tick (only meaningful after [`Command::Start`]).
    Bang,
}

/// The services the host patch supplies: a scheduled clock, a data outlet,
/// an end-of-sequence outlet and a file chooser. The host outlives the
/// engine and calls [`Engine::clock`] when a scheduled timer fires.
pub trait Host {
    /// The scheduler's current logical time, in milliseconds.
    fn now(&self) -> f64;

    /// Arm `timer` to fire `delay` milliseconds from now, replacing any
    /// earlier schedule for the same timer.
    fn schedule(&mut self, timer: Timer, delay: f64);

    /// Disarm `timer`.
    fn cancel(&mut self, timer: Timer);

    /// Emit one byte from the data outlet. Whatever is connected
    /// downstream may react by handing a command back; the engine runs it
    /// before emitting anything further and re-reads its own mode
    /// afterwards. Replies during a panic drain are dropped so the drain
    /// always completes.
    fn send(&mut self, byte: u8) -> Option<Command>;

    /// Bang the end-of-sequence outlet.
    fn done(&mut self);

    /// Raise the host's file-open chooser.
    fn open_dialog(&mut self) {}

    /// Raise the host's file-save chooser.
    fn save_dialog(&mut self, _default: Option<&Path>) {}
}

/// Parse state of the record-mode byte stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunningStatus {
    /// No status seen yet, data bytes are dropped.
    None,
    /// Inside (or between) channel messages of `expected` total bytes.
    Channel { status: u8, expected: usize },
    /// Inside a system-exclusive message, length open-ended.
    Sysex,
}

pub struct Engine {
    mode: Mode,
    sequence: Sequence,
    tempo_map: TempoMap,
    notes: NoteBook,
    running: RunningStatus,
    pending: [u8; 4],
    pending_len: usize,
    playhead: usize,
    next_score_time: f64,
    timescale: f64,
    new_timescale: f64,
    prev_time: f64,
    slave_prev_time: f64,
    clock_delay: f64,
    looping: bool,
    default_name: Option<PathBuf>,
    track_name: Option<String>,
    overflow_logged: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            mode: Mode::Idle,
            sequence: Sequence::new(),
            tempo_map: TempoMap::new(),
            notes: NoteBook::new(),
            running: RunningStatus::None,
            pending: [0; 4],
            pending_len: 0,
            playhead: 0,
            next_score_time: 0.0,
            timescale: 1.0,
            new_timescale: 1.0,
            prev_time: 0.0,
            slave_prev_time: 0.0,
            clock_delay: 0.0,
            looping: false,
            default_name: None,
            track_name: None,
            overflow_logged: false,
        }
    }

    /// The name `open` and `save` fall back to when called without one.
    pub fn set_default_name(&mut self, name: Option<PathBuf>) {
        self.default_name = name;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The recorded (or loaded) sequence, in playback order.
    pub fn events(&self) -> &[Event] {
        self.sequence.as_slice()
    }

    /// Run one command. This is the engine's whole control surface.
    pub fn command(&mut self, command: Command, host: &mut dyn Host) {
        trace!("command {:?} in mode {:?}", command, self.mode);
        match command {
            Command::Record => {
                self.sequence.clear();
                self.tempo_map.clear();
                self.set_mode(Mode::Record, host);
            }
            Command::Play => self.set_mode(Mode::Play, host),
            Command::Start => self.set_mode(Mode::SlavePlay, host),
            Command::Stop => self.stop(host),
            Command::Pause => self.pause(host),
            Command::Continue => self.resume(host),
            Command::Loop(on) => self.looping = on,
            Command::Speed(percent) => self.speed(percent, host),
            Command::Dump => self.dump(host),
            Command::Panic => self.drain_notes(host),
            Command::Clear => {
                self.sequence.clear();
                self.tempo_map.clear();
            }
            Command::Open(name) => self.open_file(name, host),
            Command::Save(name) => self.save_file(name, host),
            Command::Click => host.open_dialog(),
            Command::Float(value) => self.float_in(value, host),
            Command::Bang => self.slave_tick(host),
        }
    }

    /// The host calls this when a timer it scheduled fires.
    pub fn clock(&mut self, timer: Timer, host: &mut dyn Host) {
        match timer {
            Timer::Event => self.clock_tick(host),
            Timer::Watchdog => {
                // the expected external tick is late, stall playback
                if self.mode == Mode::SlavePlay {
                    host.cancel(Timer::Event);
                }
            }
        }
    }

    // -- mode machine ----------------------------------------------------

    fn set_mode(&mut self, new_mode: Mode, host: &mut dyn Host) {
        let changed = self.mode != new_mode;
        if changed {
            match self.mode {
                Mode::Idle | Mode::PlayOnce => {}
                Mode::Record => self.stop_recording(host.now()),
                Mode::Play => self.stop_playback(host),
                Mode::SlavePlay => self.stop_slavery(host),
            }
            self.mode = new_mode;
        }
        match new_mode {
            Mode::Idle | Mode::PlayOnce => {}
            Mode::Record => self.start_recording(host.now()),
            Mode::Play => self.start_playback(changed, host),
            Mode::SlavePlay => self.start_slavery(),
        }
    }

    fn is_running(&self) -> bool {
        self.prev_time > TICK_EPSILON
    }

    /// Leave whatever mode is active and silence every counted note. The
    /// drain happens even from Idle: a sequence that ended with notes still
    /// sounding leaves them counted until a stop or panic.
    fn stop(&mut self, host: &mut dyn Host) {
        self.drain_notes(host);
        if self.mode != Mode::Idle {
            self.set_mode(Mode::Idle, host);
        }
    }

    fn start_recording(&mut self, now: f64) {
        self.prev_time = now;
        self.running = RunningStatus::None;
        self.pending_len = 0;
    }

    fn stop_recording(&mut self, now: f64) {
        match self.running {
            RunningStatus::Sysex => {
                warn!("incomplete sysex");
                self.end_sysex(now);
            }
            RunningStatus::Channel { .. } => self.complete(now),
            RunningStatus::None => {}
        }
        // running status holds within one recording, never across two
        self.running = RunningStatus::None;
        self.pending_len = 0;
    }

    fn start_playback(&mut self, mode_changed: bool, host: &mut dyn Host) {
        host.cancel(Timer::Event);
        self.playhead = 0;
        self.next_score_time = 0.0;
        if self.sequence.is_empty() {
            self.mode = Mode::Idle;
            return;
        }
        let first_delta = self.sequence.as_slice()[0].delta;
        if mode_changed {
            // nothing is emitted within the scheduler event of the start
            // message itself, even for a first delta of zero
            self.next_score_time = first_delta;
            self.clock_delay = first_delta * self.new_timescale;
        } else {
            // a timescale change while already playing
            if self.is_running() {
                self.clock_delay -= host.now() - self.prev_time;
            }
            self.clock_delay *= self.new_timescale / self.timescale;
        }
        if self.clock_delay < 0.0 {
            self.clock_delay = 0.0;
        }
        self.timescale = self.new_timescale;
        host.schedule(Timer::Event, self.clock_delay);
        self.prev_time = host.now();
    }

    fn stop_playback(&mut self, host: &mut dyn Host) {
        host.cancel(Timer::Event);
        self.playhead = 0;
        self.next_score_time = 0.0;
    }

    fn start_slavery(&mut self) {
        if self.sequence.is_empty() {
            self.mode = Mode::Idle;
            return;
        }
        self.playhead = 0;
        self.next_score_time = 0.0;
        self.prev_time = 0.0;
        self.slave_prev_time = 0.0;
    }

    fn stop_slavery(&mut self, host: &mut dyn Host) {
        host.cancel(Timer::Event);
        host.cancel(Timer::Watchdog);
        self.playhead = 0;
        self.next_score_time = 0.0;
    }

    fn set_timescale(&mut self, timescale: f64) {
        self.new_timescale = timescale.max(1e-20).min(1e20);
    }

    fn pause(&mut self, host: &mut dyn Host) {
        if self.mode == Mode::Play && self.is_running() {
            self.clock_delay -= host.now() - self.prev_time;
            if self.clock_delay < 0.0 {
                self.clock_delay = 0.0;
            }
            host.cancel(Timer::Event);
            self.prev_time = 0.0;
        }
    }

    fn resume(&mut self, host: &mut dyn Host) {
        if self.mode == Mode::Play && !self.is_running() {
            if self.clock_delay < 0.0 {
                self.clock_delay = 0.0;
            }
            host.schedule(Timer::Event, self.clock_delay);
            self.prev_time = host.now();
        } else if self.mode == Mode::Record && !self.is_running() {
            // re-enter recording to append
            self.set_mode(Mode::Record, host);
        }
    }

    fn speed(&mut self, percent: f64, host: &mut dyn Host) {
        if percent > TEMPO_EPSILON {
            self.set_timescale(100.0 / percent);
            if self.is_running() && self.mode == Mode::Play {
                host.cancel(Timer::Event);
                self.clock_delay -= host.now() - self.prev_time;
                self.clock_delay *= self.new_timescale / self.timescale;
                if self.clock_delay < 0.0 {
                    self.clock_delay = 0.0;
                }
                self.timescale = self.new_timescale;
                host.schedule(Timer::Event, self.clock_delay);
                self.prev_time = host.now();
            }
        } else {
            self.pause(host);
        }
    }

    fn float_in(&mut self, value: f64, host: &mut dyn Host) {
        if self.mode == Mode::Record {
            self.record_byte(truncate_byte(value), host.now());
        } else if value != 0.0 {
            self.set_mode(Mode::Play, host);
        } else {
            self.stop(host);
        }
    }

    // -- outlet ----------------------------------------------------------

    /// Emit one byte, track it in the note book, then run whatever the
    /// downstream connection handed back.
    fn emit(&mut self, host: &mut dyn Host, byte: u8) {
        let reply = host.send(byte);
        self.notes.observe(byte);
        if let Some(command) = reply {
            debug!("outlet re-entered with {:?}", command);
            self.command(command, host);
        }
    }

    /// Emit a NoteOff for every note still counted in the book. The offs
    /// are gathered first, so the drain finishes no matter what the
    /// downstream connection does with them.
    fn drain_notes(&mut self, host: &mut dyn Host) {
        for off in self.notes.drain() {
            for &byte in off.iter() {
                let _ = host.send(byte);
            }
        }
    }

    // -- clock driver ----------------------------------------------------

    fn clock_tick(&mut self, host: &mut dyn Host) {
        if self.mode != Mode::Play && self.mode != Mode::SlavePlay {
            return;
        }
        let mut index = self.playhead;
        self.playhead = index + 1;
        loop {
            let event = match self.sequence.as_slice().get(index) {
                Some(event) => *event,
                None => {
                    error!("bug: clock fired past the end of the sequence");
                    return;
                }
            };
            for &byte in event.bytes() {
                self.emit(host, byte);
            }
            if self.mode != Mode::Play && self.mode != Mode::SlavePlay {
                // the outlet re-entered with a stop (or similar)
                return;
            }
            if self.playhead < self.sequence.len() {
                let next_delta = self.sequence.as_slice()[self.playhead].delta;
                self.next_score_time += next_delta;
                if next_delta < TICK_EPSILON {
                    // close enough to simultaneous: stay in this scheduler
                    // event rather than re-arming the clock
                    index = self.playhead;
                    self.playhead += 1;
                    continue;
                }
                self.clock_delay = next_delta * self.timescale;
                if self.clock_delay < 0.0 {
                    self.clock_delay = 0.0;
                }
                host.schedule(Timer::Event, self.clock_delay);
                self.prev_time = host.now();
                return;
            }
            // past the last event: the bang goes out right after the last
            // byte, and looping re-enters playback at the same timescale
            self.set_mode(Mode::Idle, host);
            host.done();
            if self.looping && self.mode == Mode::Idle {
                self.set_mode(Mode::Play, host);
            }
            return;
        }
    }

    // -- slave-tick input ------------------------------------------------

    fn slave_tick(&mut self, host: &mut dyn Host) {
        if self.mode != Mode::SlavePlay {
            return;
        }
        let now = host.now();
        if self.slave_prev_time > 0.0 {
            let elapsed = now - self.slave_prev_time;
            if elapsed < MIN_TICK_DELAY {
                return;
            }
            // if the next tick takes longer than this one did, stall
            host.schedule(Timer::Watchdog, elapsed);
            self.set_timescale(elapsed * (TICKS_PER_SEC / 1000.0));
            if self.is_running() {
                self.clock_delay -= now - self.prev_time;
                self.clock_delay *= self.new_timescale / self.timescale;
            } else {
                let delta = match self.sequence.as_slice().get(self.playhead) {
                    Some(event) => event.delta,
                    None => return,
                };
                self.clock_delay = delta * self.new_timescale;
            }
            if self.clock_delay < 0.0 {
                self.clock_delay = 0.0;
            }
            host.schedule(Timer::Event, self.clock_delay);
            self.prev_time = now;
            self.slave_prev_time = now;
            self.timescale = self.new_timescale;
        } else {
            // first tick: just set the reference point
            self.slave_prev_time = now;
        }
    }

    // -- dump ------------------------------------------------------------

    fn dump(&mut self, host: &mut dyn Host) {
        self.set_mode(Mode::PlayOnce, host);
        let mut index = 0;
        while index < self.sequence.len() {
            let event = self.sequence.as_slice()[index];
            for &byte in event.bytes() {
                self.emit(host, byte);
            }
            if self.mode != Mode::PlayOnce {
                return;
            }
            index += 1;
        }
        self.mode = Mode::Idle;
        host.done();
    }

    // -- record-mode byte parser -----------------------------------------

    fn record_byte(&mut self, byte: u8, now: f64) {
        if byte < 128 {
            if self.running != RunningStatus::None {
                self.add_byte(byte, false, now);
            }
            // a data byte with no running status is dropped
            return;
        }
        if byte == 254 {
            // active sensing is ignored entirely
            return;
        }
        if self.running == RunningStatus::Sysex {
            if byte == 247 {
                self.end_sysex(now);
            } else {
                // real-time bytes alike
                warn!("unterminated sysex");
                self.end_sysex(now);
                self.check_status(byte, now);
            }
        } else if byte != 247 {
            self.check_status(byte, now);
        }
    }

    /// A new status byte arrived. Flush any in-progress message, then
    /// latch the new status (or commit it outright if it stands alone).
    fn check_status(&mut self, byte: u8, now: f64) {
        if self.pending_len > 1 {
            self.complete(now);
        }
        match byte {
            248..=255 => {
                // stand-alone real-time event, running status unaffected
                self.push_event(&[byte], now);
                if let RunningStatus::Channel { status, .. } = self.running {
                    self.pending[0] = status;
                    self.pending_len = 1;
                } else {
                    self.pending_len = 0;
                }
            }
            240..=247 => {
                self.running = RunningStatus::Sysex;
                self.pending[0] = byte;
                self.pending_len = 1;
            }
            _ => {
                let expected = if byte < 192 {
                    3
                } else if byte < 224 {
                    2
                } else {
                    3
                };
                self.running = RunningStatus::Channel {
                    status: byte,
                    expected,
                };
                self.pending[0] = byte;
                self.pending_len = 1;
            }
        }
    }

    fn add_byte(&mut self, byte: u8, force_complete: bool, now: f64) {
        self.pending[self.pending_len] = byte;
        self.pending_len += 1;
        match self.running {
            RunningStatus::Channel { status, expected } => {
                if self.pending_len == expected {
                    self.complete(now);
                    // hold the running status for the next message
                    self.pending[0] = status;
                    self.pending_len = 1;
                } else if force_complete {
                    self.complete(now);
                }
            }
            RunningStatus::Sysex => {
                // sysex is broken into four-byte packets, each stamped with
                // the arrival time of its last byte
                if self.pending_len == 4 || force_complete {
                    self.complete(now);
                }
            }
            RunningStatus::None => {
                error!("bug: data byte without status");
                self.pending_len = 0;
            }
        }
    }

    fn end_sysex(&mut self, now: f64) {
        self.add_byte(247, true, now);
        self.running = RunningStatus::None;
    }

    /// Close out the pending message: store it if it reached its expected
    /// length, drop it otherwise.
    fn complete(&mut self, now: f64) {
        let expected = match self.running {
            RunningStatus::Channel { expected, .. } => expected,
            _ => 0,
        };
        if self.pending_len < expected {
            // no complaint when only the status byte has arrived
            if self.pending_len > 1 {
                warn!("truncated midi message");
            }
        } else if self.pending_len > 0 {
            let pending = self.pending;
            let len = self.pending_len;
            self.push_event(&pending[..len], now);
        }
        self.pending_len = 0;
    }

    /// Append one finished event, stamped with the time since the previous
    /// one.
    fn push_event(&mut self, data: &[u8], now: f64) {
        let delta = now - self.prev_time;
        self.prev_time = now;
        if !self.sequence.push(Event::new(delta, data)) && !self.overflow_logged {
            error!("bug: sequence storage exhausted, recording dropped");
            self.overflow_logged = true;
        }
    }

    // -- files -----------------------------------------------------------

    fn open_file(&mut self, name: Option<PathBuf>, host: &mut dyn Host) {
        let path = match name.or_else(|| self.default_name.clone()) {
            Some(path) => path,
            None => {
                host.open_dialog();
                return;
            }
        };
        if !path.is_file() {
            warn!("file '{}' not found", path.display());
            return;
        }
        if let Err(e) = self.load(&path) {
            warn!("unable to read '{}': {}", path.display(), e);
        }
        self.default_name = Some(path);
    }

    /// Load a sequence from `path`, reading it as a standard MIDI file
    /// first and falling back to the text form. On failure the error of the
    /// MIDI-file attempt is returned, since it carries the detail.
    pub fn load(&mut self, path: &Path) -> crate::Result<()> {
        match self.read_smf(path) {
            Ok(()) => debug!("loaded midi file '{}'", path.display()),
            Err(smf_error) => {
                trace!("not a midi file ({}), trying text", smf_error);
                self.sequence.clear();
                self.tempo_map.clear();
                if self.read_text(path).is_err() {
                    return Err(smf_error.into());
                }
            }
        }
        self.playhead = 0;
        Ok(())
    }

    fn read_smf(&mut self, path: &Path) -> crate::error::LibResult<()> {
        let reader = SmfReader::open(path)?;
        if !self.sequence.prepare(reader.event_count())
            || !self.tempo_map.prepare(reader.tempo_count())
        {
            error!(
                "bug: no room for {} events and {} tempi",
                reader.event_count(),
                reader.tempo_count()
            );
            return Ok(());
        }
        let sequence = &mut self.sequence;
        let tempo_map = &mut self.tempo_map;
        reader.ingest(|score_event| match score_event {
            ScoreEvent::Channel {
                score_time,
                status,
                channel,
                data1,
                data2,
            } => {
                let mut bytes = [status | channel, data1, META, META];
                if let Some(data2) = data2 {
                    bytes[2] = data2;
                }
                let _ = sequence.push(Event {
                    delta: score_time,
                    bytes,
                });
            }
            ScoreEvent::Tempo {
                score_time,
                ticks_per_sec,
            } => {
                let _ = tempo_map.push(TempoEntry {
                    score_time,
                    ticks_per_sec,
                });
            }
        })?;
        if self.sequence.len() != reader.event_count() {
            error!(
                "bug: declared {} events, got {}",
                reader.event_count(),
                self.sequence.len()
            );
        }
        // stable sorts: events of several tracks interleave by score time
        // without reordering within a track
        self.sequence
            .as_mut_slice()
            .sort_by(|a, b| a.delta.partial_cmp(&b.delta).unwrap_or(Ordering::Equal));
        self.tempo_map.as_mut_slice().sort_by(|a, b| {
            a.score_time
                .partial_cmp(&b.score_time)
                .unwrap_or(Ordering::Equal)
        });
        fold_time(
            self.sequence.as_mut_slice(),
            self.tempo_map.as_slice(),
            reader.default_rate(),
        );
        self.track_name = reader.track_names().first().cloned();
        Ok(())
    }

    fn read_text(&mut self, path: &Path) -> crate::error::LibResult<()> {
        let parsed = text::load(path)?;
        if parsed.truncated {
            warn!("bad text file (truncated)");
        }
        if !self.sequence.prepare(parsed.events.len()) {
            return Ok(());
        }
        self.tempo_map.clear();
        for event in parsed.events {
            let _ = self.sequence.push(event);
        }
        Ok(())
    }

    fn save_file(&mut self, name: Option<PathBuf>, host: &mut dyn Host) {
        let path = match name.or_else(|| self.default_name.clone()) {
            Some(path) => path,
            None => {
                host.save_dialog(self.default_name.as_deref());
                return;
            }
        };
        if let Err(e) = self.save(&path) {
            warn!("while saving sequence to '{}': {}", path.display(), e);
        } else {
            self.default_name = Some(path);
        }
    }

    /// Save the sequence to `path`. The extension picks the form: `.mid`
    /// writes a standard MIDI file, `.txt` writes the text form, anything
    /// else is refused.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("mid") => {
                let track_name = self.track_name.as_deref().unwrap_or(DEFAULT_TRACK_NAME);
                let writer = SmfWriter::new();
                writer.write_file(path, self.sequence.as_slice(), track_name, 0.0)?;
            }
            Some("txt") => text::save(path, self.sequence.as_slice())?,
            _ => {
                return Err(crate::error::UnsupportedExtensionSnafu { site: site!() }
                    .build()
                    .into())
            }
        }
        Ok(())
    }
}
