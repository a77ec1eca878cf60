/*!
Tick arithmetic shared by the MIDI-file reader and writer.

A file expresses time in "hard" ticks, whose meaning depends on the header's
division word and on tempo and time-signature meta events. The sequence
works in a fixed "user" tick space instead: 241 920 ticks per whole note,
which is 120 960 ticks per second at 120 beats per minute. The structs here
hold the coefficients for moving between the two.
!*/

use crate::event::TICK_EPSILON;
use log::{debug, error};

/// Ticks per quarter note when a file does not say otherwise.
pub(crate) const DEFAULT_BEAT_TICKS: u16 = 192;

/// Microseconds per beat at 120 beats per minute, the file-format default.
pub(crate) const DEFAULT_TEMPO: u32 = 500_000;

/// User ticks per whole note (256 * 27 * 5 * 7).
pub(crate) const DEFAULT_WHOLE_TICKS: f64 = 241_920.0;

/// User ticks per second at 120 beats per minute.
pub(crate) const DEFAULT_TICKS_PER_SEC: f64 = 120_960.0;

/// Conversion state while reading. Tempo and time-signature events update
/// it as the track unfolds.
pub(crate) struct ReadTicks {
    whole_ticks: f64,
    default_rate: f64,
    /// User ticks per second at the current tempo.
    rate: f64,
    /// User ticks per hard tick.
    ticks_coef: f64,
    user_bar: f64,
    hard_bar: f64,
    beat_ticks: u16,
    frames: Option<u8>,
    tempo: u32,
    meter: (u32, u32),
}

impl ReadTicks {
    /// `beat_ticks` is the division word's payload: ticks per quarter note,
    /// or ticks per frame when `frames` carries a SMPTE rate.
    pub(crate) fn new(beat_ticks: u16, frames: Option<u8>) -> Self {
        let mut ticks = Self {
            whole_ticks: DEFAULT_WHOLE_TICKS,
            default_rate: DEFAULT_TICKS_PER_SEC,
            rate: DEFAULT_TICKS_PER_SEC,
            ticks_coef: 1.0,
            user_bar: DEFAULT_WHOLE_TICKS,
            hard_bar: 0.0,
            beat_ticks,
            frames,
            tempo: DEFAULT_TEMPO,
            meter: (4, 4),
        };
        ticks.update();
        ticks
    }

    /// A tempo meta event: microseconds per beat. Zero falls back to the
    /// format default.
    pub(crate) fn set_tempo(&mut self, tempo: u32) {
        self.tempo = if tempo == 0 { DEFAULT_TEMPO } else { tempo };
        self.update();
    }

    /// A time-signature meta event. A zero numerator or denominator falls
    /// back to 4/4.
    pub(crate) fn set_meter(&mut self, numerator: u32, denominator: u32) {
        self.meter = if numerator == 0 || denominator == 0 {
            (4, 4)
        } else {
            (numerator, denominator)
        };
        self.update();
        debug!(
            "meter {}/{}, bar spans {} user / {} hard ticks",
            self.meter.0, self.meter.1, self.user_bar, self.hard_bar
        );
    }

    /// Recompute every coefficient from the current tempo, meter and
    /// division. In frames-per-second mode the time signature contributes
    /// nothing and the rate is pinned to the default.
    fn update(&mut self) {
        if let Some(frames) = self.frames {
            self.user_bar = self.whole_ticks;
            self.ticks_coef =
                self.default_rate / (f64::from(frames) * f64::from(self.beat_ticks));
            self.hard_bar = self.user_bar / self.ticks_coef;
            self.rate = self.default_rate;
        } else {
            let (num, den) = self.meter;
            self.user_bar = self.whole_ticks * f64::from(num) / f64::from(den);
            self.hard_bar =
                f64::from(self.beat_ticks) * 4.0 * f64::from(num) / f64::from(den);
            self.ticks_coef = self.whole_ticks / (f64::from(self.beat_ticks) * 4.0);
            self.rate = f64::from(DEFAULT_TEMPO) * self.default_rate / f64::from(self.tempo);
            if self.rate < TICK_EPSILON {
                error!("bug: tick rate collapsed, reverting to default");
                self.rate = self.default_rate;
            }
        }
    }

    /// Absolute score time in user ticks for a position in hard ticks.
    pub(crate) fn score_time(&self, hard_ticks: u64) -> f64 {
        self.ticks_coef * hard_ticks as f64
    }

    /// User ticks per second at the current tempo.
    pub(crate) fn rate(&self) -> f64 {
        self.rate
    }

    /// User ticks per second before any tempo event has been seen.
    pub(crate) fn default_rate(&self) -> f64 {
        self.default_rate
    }
}

/// Conversion state while writing. The writer always emits the default
/// division and tempo, so this is fixed at construction.
pub(crate) struct WriteTicks {
    beat_ticks: u16,
    /// Hard ticks per millisecond.
    ms_coef: f64,
}

impl WriteTicks {
    pub(crate) fn new() -> Self {
        Self {
            beat_ticks: DEFAULT_BEAT_TICKS,
            ms_coef: 1000.0 * f64::from(DEFAULT_BEAT_TICKS) / f64::from(DEFAULT_TEMPO),
        }
    }

    pub(crate) fn beat_ticks(&self) -> u16 {
        self.beat_ticks
    }

    /// A millisecond delay expressed in hard ticks, rounded to the nearest
    /// tick.
    pub(crate) fn hard_ticks(&self, ms: f64) -> u32 {
        let ticks = ms * self.ms_coef;
        if ticks <= 0.0 {
            0
        } else {
            ticks.round() as u32
        }
    }
}

#[test]
fn default_read_rate() {
    let ticks = ReadTicks::new(DEFAULT_BEAT_TICKS, None);
    assert!((ticks.rate() - DEFAULT_TICKS_PER_SEC).abs() < 1e-9);
    // 315 user ticks per hard tick at the default division
    assert!((ticks.score_time(192) - 60_480.0).abs() < 1e-9);
}

#[test]
fn tempo_event_scales_the_rate() {
    let mut ticks = ReadTicks::new(DEFAULT_BEAT_TICKS, None);
    ticks.set_tempo(250_000); // 240 bpm
    assert!((ticks.rate() - 241_920.0).abs() < 1e-9);
    ticks.set_tempo(0); // corrupt tempo falls back to the default
    assert!((ticks.rate() - DEFAULT_TICKS_PER_SEC).abs() < 1e-9);
}

#[test]
fn meter_does_not_change_score_time() {
    let mut ticks = ReadTicks::new(DEFAULT_BEAT_TICKS, None);
    let before = ticks.score_time(1000);
    ticks.set_meter(6, 8);
    assert!((ticks.score_time(1000) - before).abs() < 1e-9);
}

#[test]
fn frames_mode_ignores_tempo() {
    let mut ticks = ReadTicks::new(40, Some(25));
    let rate = ticks.rate();
    assert!((rate - DEFAULT_TICKS_PER_SEC).abs() < 1e-9);
    ticks.set_tempo(250_000);
    assert!((ticks.rate() - rate).abs() < 1e-9);
    // 25 fps * 40 ticks per frame = 1000 hard ticks per second
    assert!((ticks.score_time(1000) - DEFAULT_TICKS_PER_SEC).abs() < 1e-9);
}

#[test]
fn write_ticks_round_trip_whole_beats() {
    let ticks = WriteTicks::new();
    assert_eq!(0, ticks.hard_ticks(0.0));
    assert_eq!(0, ticks.hard_ticks(-3.0));
    // 500 ms is one beat at 120 bpm
    assert_eq!(u32::from(DEFAULT_BEAT_TICKS), ticks.hard_ticks(500.0));
    assert_eq!(u32::from(DEFAULT_BEAT_TICKS) * 2, ticks.hard_ticks(1000.0));
}
