// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! A local worker pool for independent, CPU bound batch jobs.
//!
//! Tasks carry no ordering dependency and results come back in completion order;
//! callers sort them when order matters.

pub mod cancel;
pub mod pool;

pub use cancel::CancelHandle;
pub use pool::{run, run_with, PoolOptions};

use std::time::Duration;

/// Typed error for a failed batch. The first failure aborts the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum DistributeError<E: std::error::Error + 'static> {
    #[error("Task {index} failed: {source}")]
    Task {
        index: usize,
        #[source]
        source: E,
    },

    #[error("Task {index} panicked: {message}")]
    Panic { index: usize, message: String },

    #[error("No worker reported back within {0:?}")]
    Timeout(Duration),

    #[error("Batch was cancelled")]
    Cancelled,

    #[error("Worker pool shut down before every task reported back")]
    Disconnected,
}
