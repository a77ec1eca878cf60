/*!
The in-memory form of the sequence: packed four-byte events with a time
delta, and the tempo map gathered while reading a MIDI file.
!*/

/// Marks the end of the meaningful bytes within an event's four byte slots.
/// This is an in-memory convention only, never written to the wire or to a
/// file.
pub(crate) const META: u8 = 255;

/// Deltas closer together than this are treated as simultaneous.
pub(crate) const TICK_EPSILON: f64 = 0.0001;

/// One stored MIDI message: a time delta plus up to four bytes, the unused
/// tail marked with [`META`]. A system-exclusive message longer than three
/// data bytes is stored as a run of full four-byte events, the last of them
/// ending with 247.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    pub(crate) delta: f64,
    pub(crate) bytes: [u8; 4],
}

impl Default for Event {
    fn default() -> Self {
        Self {
            delta: 0.0,
            bytes: [META; 4],
        }
    }
}

impl Event {
    /// Pack up to four bytes into an event, padding with [`META`].
    pub fn new(delta: f64, data: &[u8]) -> Self {
        let mut bytes = [META; 4];
        for (slot, byte) in bytes.iter_mut().zip(data.iter()) {
            *slot = *byte;
        }
        Self { delta, bytes }
    }

    /// Milliseconds since the previous event (score ticks transiently,
    /// between reading a MIDI file and folding its tempo map).
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// The meaningful bytes of the event, in emission order.
    pub fn bytes(&self) -> &[u8] {
        let used = self.bytes.iter().position(|&b| b == META).unwrap_or(4);
        &self.bytes[..used]
    }
}

/// The byte a number denotes on its way into the sequence: fractions drop,
/// values outside 0..=255 wrap the way a C byte cast would.
pub(crate) fn truncate_byte(value: f64) -> u8 {
    value as i64 as u8
}

/// A tempo change read from a MIDI file: the score time at which it takes
/// effect and the tick rate from then on.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct TempoEntry {
    /// Score ticks from the start of the track.
    pub(crate) score_time: f64,
    /// Score ticks per second.
    pub(crate) ticks_per_sec: f64,
}

/// Replace absolute score-time deltas with millisecond gaps between
/// consecutive events, sweeping a cursor through the tempo map alongside the
/// event list. Both slices must be sorted. A tempo entry at (or just after)
/// score time zero overrides `default_rate` before the first event.
pub(crate) fn fold_time(events: &mut [Event], tempi: &[TempoEntry], default_rate: f64) {
    let mut coef = 1000.0 / default_rate;
    let mut prev_score_time = 0.0;
    let mut tx = 0;
    while tx < tempi.len() && tempi[tx].score_time < TICK_EPSILON {
        coef = 1000.0 / tempi[tx].ticks_per_sec;
        tx += 1;
    }
    for event in events.iter_mut() {
        let mut clock_delta = 0.0;
        while tx < tempi.len() && tempi[tx].score_time <= event.delta {
            clock_delta += (tempi[tx].score_time - prev_score_time) * coef;
            prev_score_time = tempi[tx].score_time;
            coef = 1000.0 / tempi[tx].ticks_per_sec;
            tx += 1;
        }
        clock_delta += (event.delta - prev_score_time) * coef;
        prev_score_time = event.delta;
        event.delta = clock_delta;
    }
}

#[test]
fn truncate_byte_wraps() {
    assert_eq!(144, truncate_byte(144.0));
    assert_eq!(144, truncate_byte(144.9));
    assert_eq!(44, truncate_byte(300.0));
    assert_eq!(255, truncate_byte(-1.0));
}

#[test]
fn event_bytes_stop_at_meta() {
    let event = Event::new(1.5, &[144, 60, 100]);
    assert_eq!(&[144, 60, 100], event.bytes());
    assert_eq!([144, 60, 100, META], event.bytes);
    let event = Event::new(0.0, &[248]);
    assert_eq!(&[248], event.bytes());
    let event = Event::new(0.0, &[240, 1, 2, 3]);
    assert_eq!(4, event.bytes().len());
}

#[test]
fn fold_constant_rate() {
    // 1000 ticks per second: one tick is one millisecond
    let mut events = vec![
        Event::new(0.0, &[144, 60, 100]),
        Event::new(500.0, &[144, 62, 100]),
        Event::new(2000.0, &[128, 60, 0]),
    ];
    fold_time(&mut events, &[], 1000.0);
    assert!((events[0].delta - 0.0).abs() < 1e-9);
    assert!((events[1].delta - 500.0).abs() < 1e-9);
    assert!((events[2].delta - 1500.0).abs() < 1e-9);
}

#[test]
fn fold_with_tempo_change_mid_gap() {
    // rate doubles at score time 100: the first 100 ticks take 100 ms, the
    // next 100 take 50 ms
    let mut events = vec![Event::new(200.0, &[144, 60, 100])];
    let tempi = [TempoEntry {
        score_time: 100.0,
        ticks_per_sec: 2000.0,
    }];
    fold_time(&mut events, &tempi, 1000.0);
    assert!((events[0].delta - 150.0).abs() < 1e-9);
}

#[test]
fn fold_initial_tempo_overrides_default() {
    let mut events = vec![Event::new(100.0, &[144, 60, 100])];
    let tempi = [TempoEntry {
        score_time: 0.0,
        ticks_per_sec: 200.0,
    }];
    fold_time(&mut events, &tempi, 1000.0);
    assert!((events[0].delta - 500.0).abs() < 1e-9);
}
