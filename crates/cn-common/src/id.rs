//! Identifiers for launched helper processes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process id plus the id of the process's primary thread.
///
/// Both are recorded at launch and carried through every outcome report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessIds {
    pub pid: u32,
    pub tid: u32,
}

impl ProcessIds {
    pub fn new(pid: u32, tid: u32) -> Self {
        ProcessIds { pid, tid }
    }
}

impl fmt::Display for ProcessIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid={} tid={}", self.pid, self.tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ProcessIds::new(4242, 4243).to_string(), "pid=4242 tid=4243");
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&ProcessIds::new(1, 2)).unwrap();
        assert_eq!(json, r#"{"pid":1,"tid":2}"#);
    }
}
