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


pub use cream_common::{event::Event, queue::BlockingQueue};
pub use cream_memory::{ConcurrentMap, ConcurrentMapBuilder, JenkinsHasher};

pub use crate::{
    config::{
        ServerConfig, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE, DEFAULT_MIN_KEY_SIZE,
        DEFAULT_MIN_VALUE_SIZE, DEFAULT_WORKERS,
    },
    error::{Error, Result},
    protocol::{
        read_payload, read_response, write_request, RequestCode, RequestHeader, ResponseCode, ResponseHeader,
    },
    server::Server,
    worker::{handle_request, Connection, Task, WorkerPool},
};
