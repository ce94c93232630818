//! Common test utilities and helpers
//!
//! Shared between the integration test crates; not every crate uses every
//! helper.
#![allow(dead_code)]

use moduleflow::module::api::{ConsumeResult, Module};
use moduleflow::queue::api::Message;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Module collecting every `String` payload
#[derive(Default)]
pub struct Collector {
    received: Mutex<Vec<String>>,
}

impl Collector {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl Module for Collector {
    fn consume_message(&self, message: &Message) -> ConsumeResult {
        let text = message
            .downcast_ref::<String>()
            .cloned()
            .ok_or("expected a String payload")?;
        self.received.lock().unwrap().push(text);
        Ok(())
    }
}

/// Write `contents` to a fresh temporary TOML file
pub fn config_file(contents: &str) -> tempfile::NamedTempFile {
    use std::io::Write;

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}
