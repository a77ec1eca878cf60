/*!
The plain-text form of a sequence: one record per event, each a delta
followed by one to four byte values, terminated by a semicolon. Numbers are
ASCII decimal, whitespace separates them, and a semicolon may sit directly
against the last number of its record. A file with no semicolon at all
parses as an empty sequence, which keeps unrelated files from being
mistaken for sequences.
!*/

use crate::error::{self, LibResult};
use crate::event::{truncate_byte, Event};
use log::trace;
use snafu::ResultExt;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// The outcome of parsing the text form.
pub(crate) struct TextSequence {
    pub(crate) events: Vec<Event>,
    /// The input ended inside a record, with no terminating semicolon.
    pub(crate) truncated: bool,
}

enum Token {
    Number(f64),
    Semi,
}

fn flush_word(word: &mut String, tokens: &mut Vec<Token>) {
    if word.is_empty() {
        return;
    }
    match word.parse::<f64>() {
        Ok(number) => tokens.push(Token::Number(number)),
        Err(_) => trace!("ignoring token '{}'", word),
    }
    word.clear();
}

fn lex(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in source.chars() {
        if c == ';' {
            flush_word(&mut word, &mut tokens);
            tokens.push(Token::Semi);
        } else if c.is_whitespace() {
            flush_word(&mut word, &mut tokens);
        } else {
            word.push(c);
        }
    }
    flush_word(&mut word, &mut tokens);
    tokens
}

pub(crate) fn parse(source: &str) -> TextSequence {
    let mut events = Vec::new();
    let mut delta = 0.0;
    let mut bytes = [0u8; 4];
    // -1 expects the delta, 0..=3 index the byte slots
    let mut field: i32 = -1;
    for token in lex(source) {
        match token {
            Token::Number(number) => {
                if field < 0 {
                    delta = number;
                    field = 0;
                } else if field < 4 {
                    bytes[field as usize] = truncate_byte(number);
                    field += 1;
                }
                // numbers past the fourth byte of a record are dropped
            }
            Token::Semi => {
                if field > 0 {
                    events.push(Event::new(delta, &bytes[..field as usize]));
                }
                field = -1;
            }
        }
    }
    TextSequence {
        events,
        truncated: field >= 0,
    }
}

pub(crate) fn render(events: &[Event]) -> String {
    let mut out = String::new();
    for event in events {
        let _ = write!(out, "{}", event.delta());
        for byte in event.bytes() {
            let _ = write!(out, " {}", byte);
        }
        out.push_str(";\n");
    }
    out
}

pub(crate) fn load(path: &Path) -> LibResult<TextSequence> {
    let source = fs::read_to_string(path).context(error::FileOpenSnafu {
        site: site!(),
        path,
    })?;
    Ok(parse(&source))
}

pub(crate) fn save(path: &Path, events: &[Event]) -> LibResult<()> {
    fs::write(path, render(events)).context(wr!())?;
    Ok(())
}

#[test]
fn parse_simple_records() {
    let parsed = parse("0 144 60 100;\n500 128 60 0;\n");
    assert_eq!(2, parsed.events.len());
    assert!(!parsed.truncated);
    assert_eq!(&[144, 60, 100], parsed.events[0].bytes());
    assert!((parsed.events[1].delta() - 500.0).abs() < 1e-9);
    assert_eq!(&[128, 60, 0], parsed.events[1].bytes());
}

#[test]
fn no_semicolon_parses_as_empty() {
    let parsed = parse("#N canvas 0 0 450 300 12");
    assert!(parsed.events.is_empty());
    assert!(!parsed.truncated);
}

#[test]
fn trailing_partial_record_sets_truncated() {
    let parsed = parse("0 144 60 100;\n500 128");
    assert_eq!(1, parsed.events.len());
    assert!(parsed.truncated);
}

#[test]
fn fractional_deltas_survive() {
    let parsed = parse("12.625 248;");
    assert!((parsed.events[0].delta() - 12.625).abs() < 1e-12);
    assert_eq!(&[248], parsed.events[0].bytes());
}

#[test]
fn a_record_needs_at_least_one_byte() {
    // a delta with no bytes does not make an event
    let parsed = parse("100;\n0 144 60 100;");
    assert_eq!(1, parsed.events.len());
}

#[test]
fn unparsable_words_are_ignored() {
    let parsed = parse("0 144 sixty 60 100;");
    assert_eq!(1, parsed.events.len());
    assert_eq!(&[144, 60, 100], parsed.events[0].bytes());
}

#[test]
fn render_parse_round_trip() {
    let events = vec![
        Event::new(0.0, &[144, 60, 100]),
        Event::new(250.25, &[240, 1, 2, 3]),
        Event::new(0.0, &[4, 5, 247]),
        Event::new(1000.0, &[128, 60, 0]),
    ];
    let text = render(&events);
    let parsed = parse(&text);
    assert!(!parsed.truncated);
    assert_eq!(events, parsed.events);
}

#[test]
fn render_empty_sequence_is_empty() {
    assert!(render(&[]).is_empty());
}
