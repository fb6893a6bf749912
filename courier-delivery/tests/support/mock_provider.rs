//! Scripted provider for dispatcher tests
//!
//! The provider counts every `send` and decides the outcome from its script:
//! fail the first `n` calls, fail forever, or panic. An optional delay makes
//! each send take time so that concurrent dispatches overlap.
//!
//! # Example
//!
//! ```rust,no_run
//! use support::mock_provider::MockProvider;
//!
//! let flaky = MockProvider::builder("ProviderA").failing_first(1).build();
//! let down = MockProvider::builder("ProviderB").always_failing().build();
//! ```
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use courier_delivery::{Provider, ProviderError, Recipient};

#[derive(Debug, Clone, Copy)]
enum Script {
    /// Fail this many calls, then succeed
    FailFirst(u32),
    /// Panic on the first call, then succeed
    PanicFirst,
}

#[derive(Debug)]
pub struct MockProvider {
    name: String,
    script: Script,
    delay: Duration,
    calls: AtomicU32,
    recipients: parking_lot::Mutex<Vec<Recipient>>,
}

impl MockProvider {
    pub fn builder(name: &str) -> MockProviderBuilder {
        MockProviderBuilder {
            name: name.to_string(),
            script: Script::FailFirst(0),
            delay: Duration::ZERO,
        }
    }

    /// Number of `send` calls so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Recipients passed to `send`, in call order
    pub fn recipients(&self) -> Vec<Recipient> {
        self.recipients.lock().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, recipient: &Recipient) -> Result<(), ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.recipients.lock().push(recipient.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.script {
            Script::FailFirst(failures) if call < failures => {
                Err(ProviderError::rejected(&self.name, "Send failed"))
            }
            Script::PanicFirst if call == 0 => panic!("{} exploded", self.name),
            Script::FailFirst(_) | Script::PanicFirst => Ok(()),
        }
    }
}

pub struct MockProviderBuilder {
    name: String,
    script: Script,
    delay: Duration,
}

impl MockProviderBuilder {
    pub const fn failing_first(mut self, failures: u32) -> Self {
        self.script = Script::FailFirst(failures);
        self
    }

    pub const fn always_failing(self) -> Self {
        self.failing_first(u32::MAX)
    }

    pub const fn panicking_first(mut self) -> Self {
        self.script = Script::PanicFirst;
        self
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn build(self) -> Arc<MockProvider> {
        Arc::new(MockProvider {
            name: self.name,
            script: self.script,
            delay: self.delay,
            calls: AtomicU32::new(0),
            recipients: parking_lot::Mutex::new(Vec::new()),
        })
    }
}
