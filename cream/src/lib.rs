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


//! An in-memory key-value cache server.
//!
//! Clients send one PUT, GET, EVICT or CLEAR request per TCP connection. A fixed pool of worker threads serves the
//! requests against a shared [`ConcurrentMap`](cream_memory::ConcurrentMap).

mod config;
mod error;
mod protocol;
mod server;
mod worker;

mod prelude;
pub use prelude::*;
