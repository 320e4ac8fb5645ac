//! Shared utilities for integration testing.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use confstream::discovery::GroupReceiver;
use confstream::jobcfg::Group;

/// A writer whose contents stay readable after being handed to the
/// host API, so tests can assert on emitted frames.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl SharedBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// Emitted frames, split on the blank-line terminators.
    pub fn frames(&self) -> Vec<String> {
        self.contents()
            .split("\n\n")
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Drain groups arriving within the settle window. Watch tests assert
/// on the settled sequence, not on event timing.
#[allow(dead_code)]
pub async fn settle(rx: &mut GroupReceiver, window: Duration) -> Vec<Group> {
    let mut groups = Vec::new();
    loop {
        match tokio::time::timeout(window, rx.recv()).await {
            Ok(Some(batch)) => groups.extend(batch),
            Ok(None) | Err(_) => break,
        }
    }
    groups
}

/// Collapse consecutive identical groups: filesystem events often
/// arrive in create+write pairs and each re-parse is a valid emission.
#[allow(dead_code)]
pub fn dedup_consecutive(groups: Vec<Group>) -> Vec<Group> {
    let mut out: Vec<Group> = Vec::new();
    for group in groups {
        if out.last() != Some(&group) {
            out.push(group);
        }
    }
    out
}
