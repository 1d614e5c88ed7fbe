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


use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;
use bytesize::ByteSize;
use clap::Parser;
use cream::{ServerConfig, DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE, DEFAULT_MIN_KEY_SIZE, DEFAULT_MIN_VALUE_SIZE};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// The number of worker threads used to service requests.
    pub num_workers: usize,

    /// Port number to listen on for incoming connections.
    pub port_number: u16,

    /// The maximum number of entries that can be stored in the cache.
    pub max_entries: u32,

    /// Address to listen on.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Largest accepted key.
    #[arg(long, default_value_t = ByteSize::b(DEFAULT_MAX_KEY_SIZE as u64))]
    pub max_key_size: ByteSize,

    /// Largest accepted value.
    #[arg(long, default_value_t = ByteSize::b(DEFAULT_MAX_VALUE_SIZE as u64))]
    pub max_value_size: ByteSize,
}

impl Args {
    pub fn config(&self) -> anyhow::Result<ServerConfig> {
        let max_key_size = u32::try_from(self.max_key_size.as_u64()).context("max key size overflows u32")?;
        let max_value_size = u32::try_from(self.max_value_size.as_u64()).context("max value size overflows u32")?;
        let config = ServerConfig::default()
            .with_addr(SocketAddr::new(self.host, self.port_number))
            .with_workers(self.num_workers)
            .with_max_entries(self.max_entries)
            .with_key_size(DEFAULT_MIN_KEY_SIZE, max_key_size)
            .with_value_size(DEFAULT_MIN_VALUE_SIZE, max_value_size);
        config.verify()?;
        Ok(config)
    }
}
