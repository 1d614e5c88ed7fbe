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


//! `cream` starts an in-memory key-value cache server.

mod args;

use args::Args;
use clap::Parser;
use cream::Server;

fn init_logger() {
    use tracing_subscriber::{prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_line_number(true))
        .with(EnvFilter::from_default_env())
        .init();
}

/// Log every deadlock found among `parking_lot` locks and return how many there are.
#[cfg(feature = "deadlock")]
fn report_deadlocks() -> usize {
    let deadlocks = parking_lot::deadlock::check_deadlock();
    for (i, threads) in deadlocks.iter().enumerate() {
        for t in threads {
            tracing::error!(
                "[cream]: deadlock #{i}, thread id: {:?}\n{:#?}",
                t.thread_id(),
                t.backtrace()
            );
        }
    }
    deadlocks.len()
}

fn main() -> anyhow::Result<()> {
    init_logger();

    #[cfg(feature = "deadlock")]
    {
        std::thread::spawn(move || loop {
            std::thread::sleep(std::time::Duration::from_secs(1));
            let deadlocks = report_deadlocks();
            if deadlocks > 0 {
                panic!("{deadlocks} deadlocks detected");
            }
        });
    }

    let args = Args::parse();
    tracing::debug!(?args, "[cream]: parsed arguments");

    let config = args.config()?;
    let server = Server::start(config)?;
    tracing::info!(addr = %server.local_addr(), "[cream]: listening");

    // The process runs until it is terminated by a signal.
    server.wait()?;
    Ok(())
}
