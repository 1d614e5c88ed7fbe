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

/// Server error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// In-memory store error.
    #[error("memory error: {0}")]
    Memory(#[from] cream_memory::Error),
    /// Work queue error.
    #[error("queue error: {0}")]
    Queue(#[from] cream_common::error::Error),
    /// Malformed message on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Config error.
    #[error("config error: {0}")]
    Config(String),
    /// A server thread panicked.
    #[error("join error: {0}")]
    Join(String),
}

/// Server result.
pub type Result<T> = core::result::Result<T, Error>;
