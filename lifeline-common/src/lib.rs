//! Process table types shared by the lifeline guard and its listers.
//!
//! A listing is free-form text with one process per line, formatted as
//! `<optional whitespace><pid digits><one whitespace><command>`. Anything that
//! does not fit that shape (headers, blank lines, kernel junk) is dropped.

use std::fmt;

/// One row of the process table at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub command: String,
}

impl ProcessEntry {
    pub fn new(pid: u32, command: impl Into<String>) -> Self {
        Self {
            pid,
            command: command.into(),
        }
    }
}

impl fmt::Display for ProcessEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pid, self.command)
    }
}

/// Ordered process table captured at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSnapshot {
    entries: Vec<ProcessEntry>,
}

impl ProcessSnapshot {
    pub fn new(entries: Vec<ProcessEntry>) -> Self {
        Self { entries }
    }

    /// Parses a listing, keeping the order of the lines that match.
    pub fn parse(listing: &str) -> Self {
        let entries = listing.lines().filter_map(parse_listing_line).collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ProcessEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry carrying `pid`. Pids may repeat across reuse windows;
    /// only the first one counts.
    pub fn find_pid(&self, pid: u32) -> Option<&ProcessEntry> {
        self.entries.iter().find(|e| e.pid == pid)
    }

    /// Entries with the exact same command but a different pid.
    pub fn command_twins<'a>(
        &'a self,
        me: &'a ProcessEntry,
    ) -> impl Iterator<Item = &'a ProcessEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.pid != me.pid && e.command == me.command)
    }
}

impl fmt::Display for ProcessSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{{pid: {}, command: {:?}}}", entry.pid, entry.command)?;
        }
        write!(f, "]")
    }
}

/// Parses a single listing line.
///
/// Returns `None` for lines that do not match, for pid 0, for pids that do
/// not fit in a `u32` and for lines whose command trims down to nothing.
pub fn parse_listing_line(line: &str) -> Option<ProcessEntry> {
    let rest = line.trim_start();
    let digits_end = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }

    let (digits, tail) = rest.split_at(digits_end);
    let mut tail_chars = tail.chars();
    match tail_chars.next() {
        Some(c) if c.is_whitespace() => {}
        _ => return None,
    }

    let pid: u32 = digits.parse().ok()?;
    if pid == 0 {
        return None;
    }
    let command = tail_chars.as_str().trim();
    if command.is_empty() {
        return None;
    }
    Some(ProcessEntry::new(pid, command))
}
