/*!
A two-pass reader for standard MIDI files. The first pass walks every track
counting channel events and tempo changes, so that storage for the sequence
can be allocated exactly once; the second pass walks the same bytes again
and hands each event to an ingestion hook. Running status is honoured
within a track and never across tracks.
!*/

use crate::byte_reader::{ByteReader, ByteResult};
use crate::error::{self, LibResult};
use crate::file::ticks::{ReadTicks, DEFAULT_TICKS_PER_SEC};
use log::{debug, trace, warn};
use snafu::ResultExt;
use std::path::Path;

/// Longest system-exclusive payload the reader will buffer; anything larger
/// is skipped outright. Either way the payload is discarded.
const MAX_SYSEX: usize = 256;

/// A track holding fewer bytes than one delta byte plus one status byte
/// cannot contain an event.
const SHORTEST_EVENT: usize = 2;

const META_TRACK_NAME: u8 = 0x03;
const META_END_OF_TRACK: u8 = 0x2f;
const META_TEMPO: u8 = 0x51;
const META_TIME_SIGNATURE: u8 = 0x58;

/// What the second pass hands to the ingestion hook. Score times are in
/// user ticks from the start of the track.
pub(crate) enum ScoreEvent {
    Channel {
        score_time: f64,
        status: u8,
        channel: u8,
        data1: u8,
        data2: Option<u8>,
    },
    Tempo {
        score_time: f64,
        ticks_per_sec: f64,
    },
}

#[derive(Default)]
struct WalkStats {
    nevents: usize,
    ntempi: usize,
    ntracks: usize,
    names: Vec<String>,
}

struct TrackState {
    score_time: u64,
    running: Option<(u8, u8)>,
    name: String,
    seen_channel: bool,
}

pub(crate) struct SmfReader {
    data: Vec<u8>,
    body_start: usize,
    format: u16,
    declared_tracks: u16,
    beat_ticks: u16,
    frames: Option<u8>,
    nevents: usize,
    ntempi: usize,
    track_names: Vec<String>,
}

impl SmfReader {
    /// Read the file into memory, validate its header and run the counting
    /// pass.
    pub(crate) fn open(path: &Path) -> LibResult<Self> {
        let data = std::fs::read(path).context(error::FileOpenSnafu {
            site: site!(),
            path,
        })?;
        Self::parse(data)
    }

    pub(crate) fn parse(data: Vec<u8>) -> LibResult<Self> {
        let format;
        let declared_tracks;
        let beat_ticks;
        let frames;
        let body_start;
        {
            let mut reader = ByteReader::new(&data);
            reader.expect_tag("MThd").context(io!())?;
            let header_length = reader.read_u32().context(io!())? as usize;
            if header_length < 6 {
                invalid_file!("header length {} is too short", header_length);
            }
            let format_word = reader.read_u16().context(io!())?;
            if format_word > 2 {
                invalid_file!("unsupported format {}", format_word);
            }
            format = format_word;
            declared_tracks = reader.read_u16().context(io!())?;
            let division = reader.read_u16().context(io!())?;
            if division & 0x8000 != 0 {
                // the high byte is a negative SMPTE frames-per-second value
                frames = Some(((division >> 8) as u8).wrapping_neg());
                beat_ticks = division & 0x00ff;
            } else {
                frames = None;
                beat_ticks = division;
            }
            if beat_ticks == 0 {
                invalid_file!("division word of zero");
            }
            if header_length > 6 {
                warn!(
                    "{} extra bytes of midi file header, skipped",
                    header_length - 6
                );
                reader.skip(header_length - 6).context(io!())?;
            }
            body_start = reader.position();
        }
        if format == 2 {
            debug!("format 2 midi file, handled as format 1");
        }
        let mut smf = Self {
            data,
            body_start,
            format,
            declared_tracks,
            beat_ticks,
            frames,
            nevents: 0,
            ntempi: 0,
            track_names: Vec::new(),
        };
        smf.analyse()?;
        Ok(smf)
    }

    /// First pass: count channel events and tempo changes, pick one name
    /// per non-empty track.
    fn analyse(&mut self) -> LibResult<()> {
        let stats = self.walk(true, &mut |_| {})?;
        if stats.ntracks == 0 {
            warn!("no valid midi tracks");
        } else if stats.ntracks != usize::from(self.declared_tracks) {
            warn!(
                "midi file declares {} tracks but contains {}",
                self.declared_tracks, stats.ntracks
            );
        }
        debug!(
            "midi file format {}: {} events and {} tempi in {} tracks",
            self.format, stats.nevents, stats.ntempi, stats.ntracks
        );
        self.nevents = stats.nevents;
        self.ntempi = stats.ntempi;
        self.track_names = stats.names;
        Ok(())
    }

    /// Second pass: hand every channel event and tempo change to `hook`.
    pub(crate) fn ingest<F: FnMut(ScoreEvent)>(&self, mut hook: F) -> LibResult<()> {
        self.walk(false, &mut hook)?;
        Ok(())
    }

    pub(crate) fn event_count(&self) -> usize {
        self.nevents
    }

    pub(crate) fn tempo_count(&self) -> usize {
        self.ntempi
    }

    pub(crate) fn track_names(&self) -> &[String] {
        &self.track_names
    }

    /// The tick rate assumed before the first tempo event; the tempo folder
    /// needs it for files without one.
    pub(crate) fn default_rate(&self) -> f64 {
        DEFAULT_TICKS_PER_SEC
    }

    fn walk<F: FnMut(ScoreEvent)>(&self, first_pass: bool, hook: &mut F) -> LibResult<WalkStats> {
        let mut reader = ByteReader::new(&self.data);
        reader.skip(self.body_start).context(io!())?;
        let mut ticks = ReadTicks::new(self.beat_ticks, self.frames);
        let mut stats = WalkStats::default();
        while reader.has_more() {
            if reader.remaining() < 8 {
                debug!(
                    "{} trailing bytes after the last track",
                    reader.remaining()
                );
                break;
            }
            let tag = reader.read_n(4).context(io!())?;
            let is_track = tag == b"MTrk";
            let tag = String::from_utf8_lossy(tag).into_owned();
            let length = reader.read_u32().context(io!())? as usize;
            reader.set_limit(length);
            if !is_track {
                if first_pass {
                    warn!("unknown chunk {} in midi file, skipped", tag);
                }
                reader.finish_chunk();
                continue;
            }
            if length < SHORTEST_EVENT {
                if first_pass {
                    debug!("empty track in midi file, skipped");
                }
                reader.finish_chunk();
                continue;
            }
            let mut track = TrackState {
                score_time: 0,
                running: None,
                name: String::new(),
                seen_channel: false,
            };
            if let Err(e) = track_events(
                &mut reader,
                &mut ticks,
                &mut track,
                first_pass,
                &mut stats,
                hook,
            ) {
                if first_pass {
                    warn!("truncated event in midi file, skipping to end of track: {}", e);
                }
            }
            reader.finish_chunk();
            if track.seen_channel {
                let name = if track.name.is_empty() {
                    format!("{}-track", stats.ntracks)
                } else {
                    track.name
                };
                stats.ntracks += 1;
                if first_pass {
                    stats.names.push(name);
                }
            }
        }
        Ok(stats)
    }
}

/// True for program change and channel pressure, the two channel messages
/// carrying a single data byte.
fn one_data_byte(status: u8) -> bool {
    status & 0xe0 == 0xc0
}

/// Walk one track chunk until its end-of-track meta event. A `ByteError`
/// here means the chunk ended mid-event; the caller skips the remainder.
/// Recoverable corruption inside the track returns `Ok` after skipping.
fn track_events<F: FnMut(ScoreEvent)>(
    reader: &mut ByteReader,
    ticks: &mut ReadTicks,
    track: &mut TrackState,
    first_pass: bool,
    stats: &mut WalkStats,
    hook: &mut F,
) -> ByteResult<()> {
    loop {
        if reader.remaining() < SHORTEST_EVENT {
            return Ok(());
        }
        let delta = reader.read_vlq()?;
        track.score_time += u64::from(delta);
        let first = reader.read()?;
        if first < 0x80 {
            // a data byte in status position: running status
            match track.running {
                Some((status, channel)) => {
                    let data2 = if one_data_byte(status) {
                        None
                    } else {
                        Some(reader.read()?)
                    };
                    channel_event(ticks, track, stats, hook, first_pass, status, channel, first, data2);
                }
                None => {
                    if first_pass {
                        warn!("missing running status in midi file, skipping to end of track");
                    }
                    return Ok(());
                }
            }
        } else if first < 0xf0 {
            let status = first & 0xf0;
            let channel = first & 0x0f;
            track.running = Some((status, channel));
            let data1 = reader.read()?;
            let data2 = if one_data_byte(status) {
                None
            } else {
                Some(reader.read()?)
            };
            channel_event(ticks, track, stats, hook, first_pass, status, channel, data1, data2);
        } else if first == 0xf0 || first == 0xf7 {
            let length = reader.read_vlq()? as usize;
            if length > MAX_SYSEX {
                reader.skip(length)?;
                trace!("skipped a {} byte sysex payload", length);
            } else {
                let _payload = reader.read_n(length)?;
                trace!("discarded a {} byte sysex payload", length);
            }
        } else if first == 0xff {
            let meta_type = reader.read()?;
            let length = reader.read_vlq()? as usize;
            match meta_type {
                META_END_OF_TRACK => {
                    if length != 0 && first_pass {
                        debug!("end-of-track meta with a nonzero length");
                    }
                    return Ok(());
                }
                META_TEMPO => {
                    if length != 3 {
                        if first_pass {
                            warn!("corrupted tempo event in midi file, skipping to end of track");
                        }
                        return Ok(());
                    }
                    let payload = reader.read_n(3)?;
                    let tempo = u32::from_be_bytes([0, payload[0], payload[1], payload[2]]);
                    ticks.set_tempo(tempo);
                    if first_pass {
                        stats.ntempi += 1;
                    }
                    hook(ScoreEvent::Tempo {
                        score_time: ticks.score_time(track.score_time),
                        ticks_per_sec: ticks.rate(),
                    });
                }
                META_TIME_SIGNATURE => {
                    if length != 4 {
                        if first_pass {
                            warn!("corrupted time signature event in midi file, skipping to end of track");
                        }
                        return Ok(());
                    }
                    let payload = reader.read_n(4)?;
                    let denominator = 1u32.checked_shl(u32::from(payload[1])).unwrap_or(0);
                    ticks.set_meter(u32::from(payload[0]), denominator);
                }
                META_TRACK_NAME => {
                    let payload = reader.read_n(length)?;
                    if first_pass && track.name.is_empty() {
                        let name = String::from_utf8_lossy(payload).trim().to_string();
                        if !name.is_empty() {
                            trace!("track name '{}'", name);
                            track.name = name;
                        }
                    }
                }
                _ => {
                    trace!("skipping meta event {:#04x} of {} bytes", meta_type, length);
                    reader.skip(length)?;
                }
            }
        } else {
            // 0xf1..=0xf6 and real-time status bytes have no place in a file
            if first_pass {
                warn!("unknown event type in midi file, skipping to end of track");
            }
            return Ok(());
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn channel_event<F: FnMut(ScoreEvent)>(
    ticks: &ReadTicks,
    track: &mut TrackState,
    stats: &mut WalkStats,
    hook: &mut F,
    first_pass: bool,
    status: u8,
    channel: u8,
    data1: u8,
    data2: Option<u8>,
) {
    track.seen_channel = true;
    if first_pass {
        stats.nevents += 1;
    }
    hook(ScoreEvent::Channel {
        score_time: ticks.score_time(track.score_time),
        status,
        channel,
        data1,
        data2,
    });
}

#[cfg(test)]
fn collect(data: Vec<u8>) -> (SmfReader, Vec<(f64, [u8; 3])>) {
    let reader = SmfReader::parse(data).unwrap();
    let mut events = Vec::new();
    reader
        .ingest(|ev| {
            if let ScoreEvent::Channel {
                score_time,
                status,
                channel,
                data1,
                data2,
            } = ev
            {
                events.push((score_time, [status | channel, data1, data2.unwrap_or(0)]));
            }
        })
        .unwrap();
    (reader, events)
}

#[cfg(test)]
fn simple_file(track: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"MThd");
    data.extend_from_slice(&6u32.to_be_bytes());
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&192u16.to_be_bytes());
    data.extend_from_slice(b"MTrk");
    data.extend_from_slice(&(track.len() as u32).to_be_bytes());
    data.extend_from_slice(track);
    data
}

#[test]
fn bad_header_is_rejected() {
    assert!(SmfReader::parse(b"MThx\x00\x00\x00\x06".to_vec()).is_err());
    assert!(SmfReader::parse(Vec::new()).is_err());
    // a division word of zero is meaningless
    let mut data = simple_file(&[0x00, 0xff, 0x2f, 0x00]);
    data[12] = 0;
    data[13] = 0;
    assert!(SmfReader::parse(data).is_err());
}

#[test]
fn counts_channel_events() {
    let track = [
        0x00, 0x90, 60, 100, // note on
        0x60, 0x80, 60, 0, // note off after 96 ticks
        0x00, 0xff, 0x2f, 0x00, // end of track
    ];
    let (reader, events) = collect(simple_file(&track));
    assert_eq!(2, reader.event_count());
    assert_eq!(0, reader.tempo_count());
    assert_eq!(2, events.len());
    assert_eq!([0x90, 60, 100], events[0].1);
    assert_eq!([0x80, 60, 0], events[1].1);
    // 96 hard ticks are half a beat: 30 240 user ticks at the default
    // division
    assert!((events[1].0 - 30_240.0).abs() < 1e-9);
}

#[test]
fn running_status_within_a_track() {
    let track = [
        0x00, 0x90, 60, 100, //
        0x10, 62, 100, // running status
        0x10, 0xc5, 7, // program change, one data byte
        0x10, 9, // running status again
        0x00, 0xff, 0x2f, 0x00,
    ];
    let (reader, events) = collect(simple_file(&track));
    assert_eq!(4, reader.event_count());
    assert_eq!([0x90, 62, 100], events[1].1);
    assert_eq!([0xc5, 7, 0], events[2].1);
    assert_eq!([0xc5, 9, 0], events[3].1);
}

#[test]
fn tempo_and_sysex_handling() {
    let track = [
        0x00, 0xff, 0x51, 0x03, 0x03, 0xd0, 0x90, // tempo: 250 000 us per beat
        0x00, 0xf0, 0x03, 1, 2, 3, // sysex payload, discarded
        0x00, 0x90, 60, 100, //
        0x00, 0xff, 0x2f, 0x00,
    ];
    let (reader, events) = collect(simple_file(&track));
    assert_eq!(1, reader.event_count());
    assert_eq!(1, reader.tempo_count());
    assert_eq!(1, events.len());
}

#[test]
fn track_name_is_collected() {
    let track = [
        0x00, 0xff, 0x03, 0x04, b'l', b'e', b'a', b'd', //
        0x00, 0x90, 60, 100, //
        0x00, 0xff, 0x2f, 0x00,
    ];
    let (reader, _) = collect(simple_file(&track));
    assert_eq!(&["lead".to_string()], reader.track_names());
}

#[test]
fn truncated_track_keeps_earlier_events() {
    // the note off is cut short; the note on must still be counted
    let track = [
        0x00, 0x90, 60, 100, //
        0x60, 0x80, 60, // missing the velocity byte, no end of track
    ];
    let (reader, events) = collect(simple_file(&track));
    assert_eq!(1, reader.event_count());
    assert_eq!(1, events.len());
}

#[test]
fn unknown_chunks_are_skipped() {
    let mut data = Vec::new();
    data.extend_from_slice(b"MThd");
    data.extend_from_slice(&6u32.to_be_bytes());
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&2u16.to_be_bytes());
    data.extend_from_slice(&192u16.to_be_bytes());
    data.extend_from_slice(b"XFIH");
    data.extend_from_slice(&2u32.to_be_bytes());
    data.extend_from_slice(&[0xde, 0xad]);
    data.extend_from_slice(b"MTrk");
    let track = [0x00u8, 0x90, 60, 100, 0x00, 0xff, 0x2f, 0x00];
    data.extend_from_slice(&(track.len() as u32).to_be_bytes());
    data.extend_from_slice(&track);
    let (reader, events) = collect(data);
    assert_eq!(1, reader.event_count());
    assert_eq!(1, events.len());
}
