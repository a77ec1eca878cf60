/*!
A MIDI sequence engine.

The [`Engine`] records a stream of MIDI bytes into an in-memory sequence,
plays it back against a host-supplied scheduled clock with a variable
timescale, follows an external tick stream, loads and saves the sequence as
a standard MIDI file (format 0 or 1) or as plain text, and guarantees that
any note it has switched on is eventually switched off again when playback
stops.

The engine is deliberately host-agnostic: the surrounding patch environment
provides the clock, the outlets and the file chooser through the [`Host`]
trait, and every engine entry point borrows it for the duration of the
call. All calls are expected on a single scheduler thread.

```no_run
use midi_seq::{Command, Engine, Host, Timer};

struct Printer(f64);

impl Host for Printer {
    fn now(&self) -> f64 {
        self.0
    }
    fn schedule(&mut self, _timer: Timer, _delay: f64) {}
    fn cancel(&mut self, _timer: Timer) {}
    fn send(&mut self, byte: u8) -> Option<Command> {
        println!("{}", byte);
        None
    }
    fn done(&mut self) {}
}

let mut host = Printer(1.0);
let mut engine = Engine::new();
engine.command(Command::Record, &mut host);
for byte in [144.0, 60.0, 100.0] {
    engine.command(Command::Float(byte), &mut host);
}
engine.command(Command::Stop, &mut host);
assert_eq!(1, engine.events().len());
```
!*/

#[macro_use]
mod error;

mod byte_reader;
mod engine;
mod event;
mod file;
mod notes;
mod store;
mod vlq;

pub use engine::{Command, Engine, Host, Mode, Timer};
pub use error::{Error, Result};
pub use event::Event;
