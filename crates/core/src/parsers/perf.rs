//! Importer for Linux `perf script` output.
//!
//! ```text
//! process_name  1234/1235  5678.901234:     250000 cycles:
//!         ffffffff810a func_b+0x20 (/lib/modules/kernel)
//!         55d1c0de2f00 func_a (/usr/bin/app)
//!           app.c:42
//!
//! ```
//!
//! Each blank-line-separated record is one sample: a header line followed by
//! the stack, leaf first. Records are grouped per (command, pid, tid) and fed
//! to one [`StackSampleBuilder`] each.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use flame_cat_protocol::ValueFormatter;
use log::{debug, trace};

use super::ImportResult;
use crate::builder::StackSampleBuilder;
use crate::lines::LineSource;
use crate::model::{Frame, FrameInfo, FrameRegistry, ProfileGroup};

const UNKNOWN_SYMBOL: &str = "[unknown]";

/// Import `perf script` text into one profile per thread.
pub fn import_perf_script<S: LineSource + ?Sized>(source: &S) -> ImportResult {
    let mut registry = FrameRegistry::new();
    let mut contexts: HashMap<ContextKey, usize> = HashMap::new();
    let mut builders: Vec<StackSampleBuilder> = Vec::new();
    let mut metric: Option<String> = None;
    let mut skipped = 0usize;

    for record in Records::new(source.lines()) {
        let Some(event) = parse_event(&record) else {
            skipped += 1;
            continue;
        };
        if let Some(metric) = &metric
            && *metric != event.event_type
        {
            trace!(
                "dropping {:?} record, profile tracks {:?}",
                event.event_type, metric
            );
            skipped += 1;
            continue;
        }
        let Some(time) = event.time else {
            trace!("dropping perf record without timestamp");
            skipped += 1;
            continue;
        };
        if metric.is_none() {
            metric = Some(event.event_type.clone());
        }

        let key = ContextKey {
            command: event.command,
            pid: event.pid,
            tid: event.tid,
        };
        let index = *contexts.entry(key).or_insert_with_key(|key| {
            let mut builder = StackSampleBuilder::new();
            builder.set_name(key.profile_name());
            builder.set_value_formatter(ValueFormatter::seconds());
            builders.push(builder);
            builders.len() - 1
        });

        let stack: Vec<Arc<Frame>> = event
            .stack
            .iter()
            .map(|entry| entry.intern(&mut registry))
            .collect();
        if let Err(err) = builders[index].append_sample_with_timestamp(&stack, time) {
            debug!("skipping sample for {:?}: {err}", builders[index].name());
            skipped += 1;
        }
    }

    let profiles: Vec<_> = builders
        .into_iter()
        .filter(|b| b.sample_count() > 0)
        .map(StackSampleBuilder::build)
        .collect();
    debug!(
        "perf script: {} profile(s), {} frame(s), {skipped} record(s) skipped",
        profiles.len(),
        registry.len()
    );
    ProfileGroup::from_profiles(profiles).into()
}

/// Identity of the execution context a record belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ContextKey {
    command: String,
    pid: Option<u64>,
    tid: u64,
}

impl ContextKey {
    fn profile_name(&self) -> String {
        let mut parts = vec![self.command.clone()];
        if let Some(pid) = self.pid {
            parts.push(format!("pid: {pid}"));
        }
        parts.push(format!("tid: {}", self.tid));
        parts.join(" ")
    }
}

/// Pull-based splitter turning a line stream into blank-line-delimited
/// records. A trailing record without a closing blank line is still yielded.
/// Whitespace-only lines are dropped without ending the record.
pub struct Records<I> {
    lines: I,
}

impl<I> Records<I> {
    pub fn new(lines: I) -> Self {
        Self { lines }
    }
}

impl<'a, I> Iterator for Records<I>
where
    I: Iterator<Item = Cow<'a, str>>,
{
    type Item = Vec<Cow<'a, str>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = Vec::new();
        for line in self.lines.by_ref() {
            if line.is_empty() {
                if !record.is_empty() {
                    return Some(record);
                }
            } else if !line.trim().is_empty() {
                record.push(line);
            }
        }
        (!record.is_empty()).then_some(record)
    }
}

/// One parsed sample record. `stack` is root first.
#[derive(Debug, Clone, PartialEq)]
struct PerfEvent {
    command: String,
    pid: Option<u64>,
    tid: u64,
    time: Option<f64>,
    event_type: String,
    stack: Vec<StackEntry>,
}

#[derive(Debug, Clone, PartialEq)]
struct StackEntry {
    address: Option<u64>,
    symbol: String,
    file: Option<String>,
    line: Option<u32>,
}

impl StackEntry {
    fn key(&self) -> String {
        let file = self.file.as_deref().unwrap_or_default();
        match self.line {
            Some(line) => format!("{}:{file}:{line}", self.symbol),
            None => format!("{}:{file}", self.symbol),
        }
    }

    fn display_name(&self) -> String {
        if self.symbol != UNKNOWN_SYMBOL {
            return self.symbol.clone();
        }
        match &self.file {
            Some(file) => format!("??? ({file})"),
            None => "???".to_string(),
        }
    }

    fn intern(&self, registry: &mut FrameRegistry) -> Arc<Frame> {
        registry.intern(
            &self.key(),
            FrameInfo {
                name: self.display_name(),
                file: self.file.clone(),
                line: self.line,
                address: self.address,
            },
        )
    }
}

/// Parse a record: comment lines are dropped, the first remaining line is
/// the header, the rest are stack or source-location lines.
fn parse_event(record: &[Cow<'_, str>]) -> Option<PerfEvent> {
    let mut lines = record
        .iter()
        .map(Deref::deref)
        .filter(|line: &&str| !line.trim_start().starts_with('#'));

    let header = lines.next()?;
    let Some((command, pid, tid)) = parse_command_and_ids(header) else {
        trace!("unparsable perf header: {header:?}");
        return None;
    };

    let Some(event_type) = parse_event_type(header) else {
        trace!("perf header without event type: {header:?}");
        return None;
    };

    let mut stack: Vec<StackEntry> = Vec::new();
    let mut after_frame = false;
    for line in lines {
        if let Some(entry) = parse_stack_line(line) {
            stack.push(entry);
            after_frame = true;
            continue;
        }
        if after_frame
            && let Some((file, line_number)) = parse_source_location(line)
            && let Some(last) = stack.last_mut()
        {
            last.file = Some(file.to_string());
            last.line = line_number;
        } else {
            trace!("skipping perf line: {line:?}");
        }
        after_frame = false;
    }
    stack.reverse();

    Some(PerfEvent {
        command: command.to_string(),
        pid,
        tid,
        time: parse_timestamp(header),
        event_type: event_type.to_string(),
        stack,
    })
}

/// Header prefix: `<command><ws><tid>` or `<command><ws><pid>/<tid>`,
/// followed by whitespace. The command may contain whitespace; it ends at
/// the first whitespace run followed by the id field.
fn parse_command_and_ids(line: &str) -> Option<(&str, Option<u64>, u64)> {
    let bytes = line.as_bytes();
    if bytes.first().is_none_or(u8::is_ascii_whitespace) {
        return None;
    }

    for start in 1..bytes.len() {
        if !bytes[start].is_ascii_whitespace() || bytes[start - 1].is_ascii_whitespace() {
            continue;
        }
        let rest = line[start..].trim_start();
        if let Some((pid, tid, after)) = parse_id_field(rest)
            && after.starts_with(|c: char| c.is_ascii_whitespace())
        {
            return Some((&line[..start], pid, tid));
        }
    }
    None
}

/// `<digits>` or `<digits>/<digits>`; returns (pid, tid, remainder).
fn parse_id_field(s: &str) -> Option<(Option<u64>, u64, &str)> {
    let (first, rest) = split_digits(s)?;
    if let Some(after_slash) = rest.strip_prefix('/')
        && let Some((second, rest)) = split_digits(after_slash)
    {
        return Some((Some(first), second, rest));
    }
    Some((None, first, rest))
}

fn split_digits(s: &str) -> Option<(u64, &str)> {
    let end = s.bytes().position(|b| !b.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

/// First `<digits>.<digits>` token that follows whitespace and is followed
/// by `:` and whitespace.
fn parse_timestamp(line: &str) -> Option<f64> {
    let bytes = line.as_bytes();
    (1..bytes.len())
        .filter(|&i| bytes[i - 1].is_ascii_whitespace() && bytes[i].is_ascii_digit())
        .find_map(|i| {
            let (int_len, frac_len) = decimal_len(&line[i..])?;
            let end = i + int_len + 1 + frac_len;
            let rest = line[end..].strip_prefix(':')?;
            if !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
                return None;
            }
            line[i..end].parse().ok()
        })
}

/// Lengths of the integer and fractional parts of a leading `<d+>.<d+>`.
fn decimal_len(s: &str) -> Option<(usize, usize)> {
    let bytes = s.as_bytes();
    let int_len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if int_len == 0 || bytes.get(int_len) != Some(&b'.') {
        return None;
    }
    let frac_len = bytes[int_len + 1..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    (frac_len > 0).then_some((int_len, frac_len))
}

/// The token immediately before the line's final `:`.
fn parse_event_type(line: &str) -> Option<&str> {
    let body = line.trim_end().strip_suffix(':')?;
    let token = body
        .rsplit(|c: char| c.is_ascii_whitespace())
        .next()
        .unwrap_or_default();
    (!token.is_empty()).then_some(token)
}

/// `<hex address> <symbol>[ (<file>)]`
fn parse_stack_line(line: &str) -> Option<StackEntry> {
    let (address, rest) = line.trim().split_once(|c: char| c.is_ascii_whitespace())?;
    if !address.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let (symbol, file) = split_file_suffix(rest.trim_start());
    let symbol = strip_offset(symbol);
    if symbol.is_empty() {
        return None;
    }
    Some(StackEntry {
        address: u64::from_str_radix(address, 16).ok(),
        symbol: symbol.to_string(),
        file: file.map(str::to_string),
        line: None,
    })
}

/// Split a trailing ` (<file>)` off a symbol. The file may not contain
/// whitespace; an empty `()` counts as no file.
fn split_file_suffix(s: &str) -> (&str, Option<&str>) {
    if let Some(inner) = s.strip_suffix(')')
        && let Some(open) = inner.rfind(" (")
    {
        let file = &inner[open + 2..];
        if !file.contains(|c: char| c.is_ascii_whitespace()) {
            let symbol = inner[..open].trim_end();
            return (symbol, (!file.is_empty()).then_some(file));
        }
    }
    (s, None)
}

/// Drop a trailing `+0x<hex>` offset, as printed by perf since Linux 4.8.
fn strip_offset(symbol: &str) -> &str {
    if let Some(pos) = symbol.rfind("+0x") {
        let digits = &symbol[pos + 3..];
        if !digits.is_empty() && digits.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return &symbol[..pos];
        }
    }
    symbol
}

/// Continuation line emitted by `perf script -F +srcline`:
/// `<ws><file>[:<line>][ (inlined)]`.
fn parse_source_location(line: &str) -> Option<(&str, Option<u32>)> {
    if !line.starts_with(|c: char| c.is_ascii_whitespace()) {
        return None;
    }
    let body = line.trim();
    let body = body
        .strip_suffix("(inlined)")
        .map_or(body, str::trim_end);
    if body.is_empty() || body.contains(|c: char| c.is_ascii_whitespace()) {
        return None;
    }
    if let Some((file, number)) = body.rsplit_once(':')
        && !file.is_empty()
        && let Ok(number) = number.parse()
    {
        return Some((file, Some(number)));
    }
    Some((body, None))
}
