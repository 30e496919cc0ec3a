//! CallerInfo - emit 元と配送時刻の記録

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::panic::Location;
use std::path::Path;

/// Provenance of one emitted message.
///
/// Created by `Bus::emit`; afterwards only `delivered_at` changes, once, when
/// the dispatcher actually hands the message to its listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerInfo {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
    pub emitted_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl CallerInfo {
    pub fn new(location: &'static Location<'static>, emitted_at: DateTime<Utc>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
            emitted_at,
            delivered_at: None,
        }
    }

    pub(crate) fn mark_delivered(&mut self, at: DateTime<Utc>) {
        self.delivered_at = Some(at);
    }

    /// Time spent between emission and delivery, if delivered.
    pub fn latency(&self) -> Option<chrono::TimeDelta> {
        self.delivered_at.map(|at| at - self.emitted_at)
    }
}

impl fmt::Display for CallerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = Path::new(self.file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(self.file);
        write!(f, "{file}@{}", self.line)
    }
}
