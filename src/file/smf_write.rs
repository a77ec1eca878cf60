/*!
Writes the sequence as a one-track, format-1 standard MIDI file at the
default division and tempo. Channel events use running status. System
messages and stored sysex packets are not written.
!*/

use crate::error::{self, LibResult};
use crate::event::Event;
use crate::file::ticks::WriteTicks;
use crate::vlq;
use log::trace;
use snafu::ResultExt;
use std::convert::TryFrom;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const META_PREFIX: u8 = 0xff;
const META_TRACK_NAME: u8 = 0x03;
const META_END_OF_TRACK: u8 = 0x2f;

pub(crate) struct SmfWriter {
    ticks: WriteTicks,
}

impl SmfWriter {
    pub(crate) fn new() -> Self {
        Self {
            ticks: WriteTicks::new(),
        }
    }

    /// Write `events` to `path`, naming the single track and closing it
    /// with an end-of-track meta event `end_delay_ms` after the last event.
    pub(crate) fn write_file(
        &self,
        path: &Path,
        events: &[Event],
        track_name: &str,
        end_delay_ms: f64,
    ) -> LibResult<()> {
        let mut track = TrackChunk::new();
        track.text_meta(0, META_TRACK_NAME, track_name);
        for event in events {
            track.channel_event(self.ticks.hard_ticks(event.delta()), event.bytes())?;
        }
        track.end_of_track(self.ticks.hard_ticks(end_delay_ms));
        let length = u32::try_from(track.bytes.len())
            .map_err(|_| error::TrackTooLongSnafu { site: site!() }.build())?;

        let mut w = File::create(path).context(error::FileOpenSnafu {
            site: site!(),
            path,
        })?;
        w.write_all(b"MThd").context(wr!())?;
        w.write_all(&6u32.to_be_bytes()).context(wr!())?;
        w.write_all(&1u16.to_be_bytes()).context(wr!())?; // format
        w.write_all(&1u16.to_be_bytes()).context(wr!())?; // track count
        w.write_all(&(self.ticks.beat_ticks() & 0x7fff).to_be_bytes())
            .context(wr!())?;
        w.write_all(b"MTrk").context(wr!())?;
        w.write_all(&length.to_be_bytes()).context(wr!())?;
        w.write_all(&track.bytes).context(wr!())?;
        Ok(())
    }
}

/// Accumulates one track's bytes so the chunk length is known before any of
/// it reaches the file. Repeats of the previous status byte are elided.
struct TrackChunk {
    bytes: Vec<u8>,
    status: u8,
}

impl TrackChunk {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            status: 0,
        }
    }

    fn delta(&mut self, ticks: u32) {
        self.bytes.extend(vlq::encode(ticks));
    }

    /// Append one channel event. Events that are not channel messages
    /// (sysex packets, real-time bytes) are skipped together with their
    /// delta. A malformed channel event aborts the save.
    fn channel_event(&mut self, delta: u32, message: &[u8]) -> LibResult<()> {
        let status = match message.first() {
            Some(&status) if (0x80..0xf0).contains(&status) => status,
            _ => {
                trace!("skipping a non-channel event");
                return Ok(());
            }
        };
        let data = &message[1..];
        let expected = if status & 0xe0 == 0xc0 { 1 } else { 2 };
        if data.len() != expected || data.iter().any(|&byte| byte > 127) {
            return error::BadEventSnafu {
                site: site!(),
                description: format!("malformed channel event with status {:#04x}", status),
            }
            .fail();
        }
        self.delta(delta);
        if status != self.status {
            self.bytes.push(status);
            self.status = status;
        }
        self.bytes.extend_from_slice(data);
        Ok(())
    }

    fn text_meta(&mut self, delta: u32, meta_type: u8, text: &str) {
        self.delta(delta);
        self.bytes.push(META_PREFIX);
        self.bytes.push(meta_type);
        self.bytes.extend(vlq::encode(text.len() as u32));
        self.bytes.extend_from_slice(text.as_bytes());
        // sysex and meta events cancel any running status
        self.status = 0;
    }

    fn end_of_track(&mut self, delta: u32) {
        self.delta(delta);
        self.bytes
            .extend_from_slice(&[META_PREFIX, META_END_OF_TRACK, 0x00]);
        self.status = 0;
    }
}

#[test]
fn running_status_elides_repeated_status() {
    let mut track = TrackChunk::new();
    track.channel_event(0, &[0x90, 60, 100]).unwrap();
    track.channel_event(10, &[0x90, 62, 100]).unwrap();
    track.channel_event(0, &[0x80, 60, 0]).unwrap();
    assert_eq!(
        vec![0, 0x90, 60, 100, 10, 62, 100, 0, 0x80, 60, 0],
        track.bytes
    );
}

#[test]
fn meta_cancels_running_status() {
    let mut track = TrackChunk::new();
    track.channel_event(0, &[0x90, 60, 100]).unwrap();
    track.end_of_track(0);
    assert_eq!(0, track.status);
}

#[test]
fn one_data_byte_messages() {
    let mut track = TrackChunk::new();
    track.channel_event(0, &[0xc0, 5]).unwrap();
    assert_eq!(vec![0, 0xc0, 5], track.bytes);
    assert!(track.channel_event(0, &[0xc0, 5, 6]).is_err());
}

#[test]
fn sysex_packets_are_skipped() {
    let mut track = TrackChunk::new();
    track.channel_event(7, &[0xf0, 1, 2, 3]).unwrap();
    track.channel_event(0, &[1, 2, 3, 4]).unwrap();
    track.channel_event(0, &[0xf7]).unwrap();
    assert!(track.bytes.is_empty());
}

#[test]
fn data_bytes_out_of_range_abort() {
    let mut track = TrackChunk::new();
    assert!(track.channel_event(0, &[0x90, 200, 100]).is_err());
}

#[test]
fn track_name_bytes() {
    let mut track = TrackChunk::new();
    track.text_meta(0, META_TRACK_NAME, "seq");
    assert_eq!(vec![0, 0xff, 0x03, 3, b's', b'e', b'q'], track.bytes);
}
