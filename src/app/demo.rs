//! Demonstration module kinds shipped with the binary

use crate::app::config::{ConfigError, ModuleConfig};
use crate::builtin::api::TimedTriggerMessage;
use crate::module::api::{ConsumeResult, Module, UnsupportedMessage};
use crate::module_kind;
use crate::queue::api::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Logs text payloads and timer ticks
pub struct EchoModule {
    prefix: String,
}

impl EchoModule {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn render(&self, message: &Message) -> Option<String> {
        if let Some(text) = message.downcast_ref::<String>() {
            Some(text.clone())
        } else if let Some(text) = message.downcast_ref::<&'static str>() {
            Some((*text).to_string())
        } else if let Some(value) = message.downcast_ref::<i64>() {
            Some(value.to_string())
        } else if message.is::<TimedTriggerMessage>() {
            Some("tick".to_string())
        } else {
            None
        }
    }
}

impl Module for EchoModule {
    fn consume_message(&self, message: &Message) -> ConsumeResult {
        match self.render(message) {
            Some(text) => {
                log::info!("{}{}", self.prefix, text);
                Ok(())
            }
            None => Err(Box::new(UnsupportedMessage {
                expected: "text, integer or timer tick",
                actual: message.type_name(),
            })),
        }
    }
}

/// Counts every message it receives
pub struct CounterModule {
    count: AtomicU64,
    report_every: u64,
}

impl CounterModule {
    pub fn new(report_every: u64) -> Self {
        Self {
            count: AtomicU64::new(0),
            report_every: report_every.max(1),
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Module for CounterModule {
    fn consume_message(&self, _message: &Message) -> ConsumeResult {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if count % self.report_every == 0 {
            log::info!("Counted {} messages", count);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
#[error("simulated failure on call {call}")]
pub struct SimulatedFailure {
    pub call: u64,
}

/// Fails every `fail_every`-th message, succeeds otherwise
pub struct FailingModule {
    calls: AtomicU64,
    fail_every: u64,
}

impl FailingModule {
    pub fn new(fail_every: u64) -> Self {
        Self {
            calls: AtomicU64::new(0),
            fail_every: fail_every.max(1),
        }
    }
}

impl Module for FailingModule {
    fn consume_message(&self, _message: &Message) -> ConsumeResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call % self.fail_every == 0 {
            return Err(Box::new(SimulatedFailure { call }));
        }
        Ok(())
    }
}

fn build_echo(config: &ModuleConfig) -> Result<Arc<dyn Module>, ConfigError> {
    let prefix = config.setting_str("prefix", &format!("[{}] ", config.name))?;
    Ok(Arc::new(EchoModule::new(prefix)))
}

fn build_counter(config: &ModuleConfig) -> Result<Arc<dyn Module>, ConfigError> {
    Ok(Arc::new(CounterModule::new(config.setting_u64("report_every", 10)?)))
}

fn build_failing(config: &ModuleConfig) -> Result<Arc<dyn Module>, ConfigError> {
    Ok(Arc::new(FailingModule::new(config.setting_u64("fail_every", 1)?)))
}

module_kind!("echo", "Logs text payloads and timer ticks", build_echo);
module_kind!("counter", "Counts messages, logging every `report_every`", build_counter);
module_kind!("failing", "Fails every `fail_every`-th message", build_failing);
