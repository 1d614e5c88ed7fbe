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


use std::net::{Ipv4Addr, SocketAddr};

use crate::error::{Error, Result};

/// Default worker thread count.
pub const DEFAULT_WORKERS: usize = 4;
/// Default map capacity.
pub const DEFAULT_MAX_ENTRIES: u32 = 1024;
/// Default smallest accepted key size in bytes.
pub const DEFAULT_MIN_KEY_SIZE: u32 = 1;
/// Default largest accepted key size in bytes.
pub const DEFAULT_MAX_KEY_SIZE: u32 = 128;
/// Default smallest accepted value size in bytes.
pub const DEFAULT_MIN_VALUE_SIZE: u32 = 1;
/// Default largest accepted value size in bytes.
pub const DEFAULT_MAX_VALUE_SIZE: u32 = 512;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on. Port 0 picks a free port.
    pub addr: SocketAddr,
    /// Worker thread count.
    pub workers: usize,
    /// Map capacity.
    pub max_entries: u32,
    /// Smallest accepted key size in bytes.
    pub min_key_size: u32,
    /// Largest accepted key size in bytes.
    pub max_key_size: u32,
    /// Smallest accepted value size in bytes.
    pub min_value_size: u32,
    /// Largest accepted value size in bytes.
    pub max_value_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            workers: DEFAULT_WORKERS,
            max_entries: DEFAULT_MAX_ENTRIES,
            min_key_size: DEFAULT_MIN_KEY_SIZE,
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            min_value_size: DEFAULT_MIN_VALUE_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
        }
    }
}

impl ServerConfig {
    /// Set the address to listen on.
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Set the worker thread count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the map capacity.
    pub fn with_max_entries(mut self, max_entries: u32) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the accepted key size range, both ends inclusive.
    pub fn with_key_size(mut self, min: u32, max: u32) -> Self {
        self.min_key_size = min;
        self.max_key_size = max;
        self
    }

    /// Set the accepted value size range, both ends inclusive.
    pub fn with_value_size(mut self, min: u32, max: u32) -> Self {
        self.min_value_size = min;
        self.max_value_size = max;
        self
    }

    /// Check that the config can start a server.
    pub fn verify(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be positive".to_string()));
        }
        if self.max_entries == 0 {
            return Err(Error::Config("max entries must be positive".to_string()));
        }
        // Empty keys and values are never stored.
        if self.min_key_size == 0 || self.min_key_size > self.max_key_size {
            return Err(Error::Config(format!(
                "invalid key size range: [{}, {}]",
                self.min_key_size, self.max_key_size
            )));
        }
        if self.min_value_size == 0 || self.min_value_size > self.max_value_size {
            return Err(Error::Config(format!(
                "invalid value size range: [{}, {}]",
                self.min_value_size, self.max_value_size
            )));
        }
        Ok(())
    }

    /// Whether a key of `size` bytes is accepted.
    pub fn is_key_size_valid(&self, size: u32) -> bool {
        (self.min_key_size..=self.max_key_size).contains(&size)
    }

    /// Whether a value of `size` bytes is accepted.
    pub fn is_value_size_valid(&self, size: u32) -> bool {
        (self.min_value_size..=self.max_value_size).contains(&size)
    }
}
