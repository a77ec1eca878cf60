/*!
The `file` module holds the two persisted forms of a sequence: standard
MIDI files and the plain-text representation, together with the tick
arithmetic the MIDI-file codecs share.
!*/

pub(crate) mod smf_read;
pub(crate) mod smf_write;
pub(crate) mod text;
pub(crate) mod ticks;
