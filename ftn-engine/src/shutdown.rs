// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Root cancellation signal, propagated scheduler → pool → pipeline.
//!
//! Built on a watch channel: triggering is idempotent, observers either
//! poll [`Shutdown::is_triggered`] at loop tops or await
//! [`Shutdown::wait`] inside `select!`.

use tokio::sync::watch;

/// Create the root shutdown pair.
pub fn shutdown_channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

/// Owner side; trigger once, every clone of [`Shutdown`] observes it.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observer side.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is triggered (immediately if it already was).
    pub async fn wait(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        // wait_for only errs when the sender is gone, which also means
        // shutdown: the owner dropped.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
