// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Worker pool is not running")]
    PoolStopped,

    #[error("Worker pool queue is full")]
    QueueFull,

    #[error(transparent)]
    Storage(#[from] ftn_storage::Error),

    #[error(transparent)]
    Nodelist(#[from] ftn_nodelist::Error),

    #[error(transparent)]
    Lookup(#[from] ftn_lookup::Error),
}
