// Copyright 2025 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// In-memory store error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed input or incomplete construction.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Operation issued after teardown.
    #[error("map is invalidated")]
    Invalidated,
    /// Unforced insertion into a full map, or no free slot on the probe sequence.
    #[error("capacity exceeded")]
    CapacityExceeded,
    /// No entry with the given key.
    #[error("key not found")]
    NotFound,
}

impl Error {
    /// Build an [`Error::InvalidArgument`] with a message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// In-memory store result.
pub type Result<T> = std::result::Result<T, Error>;
