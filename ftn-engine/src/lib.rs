// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! The testing runtime.
//!
//! A single supervisor task (the scheduler) pulls candidate nodes from the
//! catalog, prioritises them, and feeds the worker pool. Workers drive the
//! probe pipeline per node; results flow through the batcher into storage.
//! One node is never tested twice concurrently, and persistent failures
//! back off exponentially.

#[macro_use]
extern crate tracing;

pub mod batcher;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod pool;
pub mod scheduler;
pub mod shutdown;
pub mod state;

pub use batcher::ResultBatcher;
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use ingest::NodelistIngestor;
pub use pipeline::ProbePipeline;
pub use pool::WorkerPool;
pub use scheduler::Scheduler;
pub use shutdown::{shutdown_channel, Shutdown, ShutdownHandle};
pub use state::{backoff_delay, backoff_level, node_priority, NodeTestState, TestLifecycle};
