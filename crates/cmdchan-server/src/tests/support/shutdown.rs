//! Shutdown signal that tests trigger by hand.

use std::io;
use std::sync::{Arc, Condvar, Mutex};

use crate::process::{ArmedShutdown, ShutdownError, ShutdownSignal};

#[derive(Default)]
struct TriggerState {
    triggered: Mutex<bool>,
    released: Condvar,
}

/// Cloneable one-shot shutdown trigger.
#[derive(Clone, Default)]
pub struct TestShutdownSignal {
    state: Arc<TriggerState>,
    refuse_install: bool,
}

impl TestShutdownSignal {
    /// Builds an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a signal whose installation always fails.
    pub fn refusing() -> Self {
        Self {
            refuse_install: true,
            ..Self::default()
        }
    }

    /// Releases every waiter.
    pub fn trigger(&self) {
        let mut triggered = self.state.triggered.lock().expect("shutdown mutex poisoned");
        *triggered = true;
        self.state.released.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    type Armed = Self;

    fn install(&self) -> Result<Self, ShutdownError> {
        if self.refuse_install {
            return Err(ShutdownError::Install {
                source: io::Error::other("signal registration refused"),
            });
        }
        Ok(self.clone())
    }
}

impl ArmedShutdown for TestShutdownSignal {
    fn wait(self) {
        let mut triggered = self.state.triggered.lock().expect("shutdown mutex poisoned");
        while !*triggered {
            triggered = self
                .state
                .released
                .wait(triggered)
                .expect("shutdown mutex poisoned during wait");
        }
    }
}
