//! Line-oriented views over profile payloads.

use std::borrow::Cow;

/// A finite text payload that can be read line by line, any number of times.
///
/// Each call to [`LineSource::lines`] starts again from the first line.
/// Lines are yielded without their `\n` or `\r\n` terminator, and nothing
/// beyond the current line needs to be materialized.
pub trait LineSource {
    fn lines(&self) -> impl Iterator<Item = Cow<'_, str>>;
}

impl LineSource for str {
    fn lines(&self) -> impl Iterator<Item = Cow<'_, str>> {
        str::lines(self).map(Cow::Borrowed)
    }
}

impl LineSource for String {
    fn lines(&self) -> impl Iterator<Item = Cow<'_, str>> {
        LineSource::lines(self.as_str())
    }
}

/// Raw bytes are decoded per line; invalid UTF-8 is replaced rather than
/// rejected so a single corrupt line cannot sink an import.
impl LineSource for [u8] {
    fn lines(&self) -> impl Iterator<Item = Cow<'_, str>> {
        let body = self.strip_suffix(b"\n").unwrap_or(self);
        let count = if self.is_empty() { 0 } else { usize::MAX };
        body.split(|&b| b == b'\n').take(count).map(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            String::from_utf8_lossy(line)
        })
    }
}

impl LineSource for Vec<u8> {
    fn lines(&self) -> impl Iterator<Item = Cow<'_, str>> {
        LineSource::lines(self.as_slice())
    }
}
