//! Event-driven replay from JSON-lines files

use crate::engine::EngineInput;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::io::BufRead;
use std::path::Path;

/// Recorded engine inputs in timestamp order
///
/// Inputs sharing a timestamp keep their file order.
pub struct EventStream {
    events: std::vec::IntoIter<EngineInput>,
}

impl EventStream {
    /// Load a JSON-lines file, keeping events within `[start_time, end_time]`
    pub fn from_path(
        path: impl AsRef<Path>,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening replay input {}", path.display()))?;
        Self::from_reader(std::io::BufReader::new(file), start_time, end_time)
    }

    pub fn from_reader(
        reader: impl BufRead,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Self> {
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let event: EngineInput = serde_json::from_str(trimmed)
                .with_context(|| format!("line {}: invalid replay event", index + 1))?;

            let at = event.timestamp();
            if start_time.is_some_and(|start| at < start) || end_time.is_some_and(|end| at > end) {
                continue;
            }
            events.push(event);
        }
        events.sort_by_key(|e| e.timestamp());

        Ok(Self {
            events: events.into_iter(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl Iterator for EventStream {
    type Item = EngineInput;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.next()
    }
}
