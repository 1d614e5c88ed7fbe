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


use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use cream_common::queue::BlockingQueue;
use cream_memory::{ConcurrentMap, ConcurrentMapBuilder, DefaultEventListener, JenkinsHasher};

use crate::{
    config::ServerConfig,
    error::{Error, Result},
    worker::{Task, WorkerPool},
};

struct Acceptor {
    listener: TcpListener,
    queue: Arc<BlockingQueue<Task<TcpStream>>>,
    stopped: Arc<AtomicBool>,
}

impl Acceptor {
    fn run(self) {
        tracing::debug!("[acceptor]: start");
        for stream in self.listener.incoming() {
            if self.stopped.load(Ordering::Acquire) {
                break;
            }
            match stream {
                Ok(stream) => {
                    tracing::trace!(peer = ?stream.peer_addr().ok(), "[acceptor]: accept connection");
                    if let Err(e) = self.queue.enqueue(Task::Serve(stream)) {
                        tracing::warn!(?e, "[acceptor]: work queue closed");
                        break;
                    }
                }
                Err(e) => tracing::warn!(?e, "[acceptor]: accept failed"),
            }
        }
        tracing::debug!("[acceptor]: stop");
    }
}

/// A running cache server.
///
/// One acceptor thread hands every accepted connection to a fixed pool of workers through a blocking queue. Each
/// worker serves a single request on a connection and closes it.
///
/// Dropping the server without calling [`Server::shutdown`] leaves its threads running until the process exits.
pub struct Server {
    config: Arc<ServerConfig>,
    local_addr: SocketAddr,
    map: Arc<ConcurrentMap<JenkinsHasher>>,
    queue: Arc<BlockingQueue<Task<TcpStream>>>,
    workers: WorkerPool<TcpStream>,
    acceptor: JoinHandle<()>,
    stopped: Arc<AtomicBool>,
}

impl Server {
    /// Build the map, spawn the workers and start accepting connections on `config.addr`.
    pub fn start(config: ServerConfig) -> Result<Self> {
        config.verify()?;
        let config = Arc::new(config);

        let map = Arc::new(
            ConcurrentMapBuilder::new(config.max_entries)
                .with_hash_builder(JenkinsHasher::default())
                .with_event_listener(Arc::new(DefaultEventListener))
                .build()?,
        );
        let queue = Arc::new(BlockingQueue::new());

        let listener = TcpListener::bind(config.addr)?;
        let local_addr = listener.local_addr()?;

        let workers = WorkerPool::spawn(config.workers, queue.clone(), map.clone(), config.clone())?;

        let stopped = Arc::new(AtomicBool::new(false));
        let acceptor = Acceptor {
            listener,
            queue: queue.clone(),
            stopped: stopped.clone(),
        };
        let acceptor = match thread::Builder::new()
            .name("cream-acceptor".to_string())
            .spawn(move || acceptor.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(e) = workers.shutdown() {
                    tracing::warn!(?e, "[server]: stop workers failed");
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            %local_addr,
            workers = config.workers,
            max_entries = config.max_entries,
            "[server]: start"
        );

        Ok(Self {
            config,
            local_addr,
            map,
            queue,
            workers,
            acceptor,
            stopped,
        })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The config the server was started with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The map the workers serve requests against.
    pub fn map(&self) -> &Arc<ConcurrentMap<JenkinsHasher>> {
        &self.map
    }

    /// Block the calling thread until the acceptor exits, which only happens if the work queue is closed.
    pub fn wait(self) -> Result<()> {
        let Self {
            local_addr,
            map,
            queue,
            workers,
            acceptor,
            ..
        } = self;
        acceptor
            .join()
            .map_err(|_| Error::Join("cream-acceptor panicked".to_string()))?;
        Self::close(local_addr, map, queue, workers)
    }

    /// Stop accepting connections, let the workers finish what is queued, and release the queue and the map.
    pub fn shutdown(self) -> Result<()> {
        self.stopped.store(true, Ordering::Release);
        Self::stop_acceptor(self.local_addr, self.acceptor)?;
        Self::close(self.local_addr, self.map, self.queue, self.workers)
    }

    /// Unblock the pending `accept` with a connection of our own and wait for the acceptor to see the stop flag.
    ///
    /// If the wake-up connection cannot be made, the acceptor is detached instead of joined. It exits on the next
    /// connection it accepts.
    fn stop_acceptor(local_addr: SocketAddr, acceptor: JoinHandle<()>) -> Result<()> {
        let mut wakeup = local_addr;
        match wakeup.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => wakeup.set_ip(Ipv4Addr::LOCALHOST.into()),
            IpAddr::V6(ip) if ip.is_unspecified() => wakeup.set_ip(Ipv6Addr::LOCALHOST.into()),
            _ => {}
        }
        if let Err(e) = TcpStream::connect(wakeup) {
            tracing::warn!(?e, %wakeup, "[server]: wake up acceptor failed, detach it");
            return Ok(());
        }
        acceptor
            .join()
            .map_err(|_| Error::Join("cream-acceptor panicked".to_string()))
    }

    fn close(
        local_addr: SocketAddr,
        map: Arc<ConcurrentMap<JenkinsHasher>>,
        queue: Arc<BlockingQueue<Task<TcpStream>>>,
        workers: WorkerPool<TcpStream>,
    ) -> Result<()> {
        workers.shutdown()?;
        queue.teardown(|task| {
            if let Task::Serve(stream) = task {
                tracing::debug!(peer = ?stream.peer_addr().ok(), "[server]: drop unserved connection");
            }
        })?;
        map.teardown()?;
        tracing::info!(%local_addr, "[server]: shutdown");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc, time::Duration};

    use super::*;

    #[test_log::test]
    fn test_unreachable_acceptor_is_detached() {
        // Nothing listens on the address once the listener is dropped.
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

        let (release_tx, release_rx) = mpsc::channel::<()>();
        let acceptor = thread::spawn(move || {
            let _ = release_rx.recv();
        });

        let (done_tx, done_rx) = mpsc::channel();
        let stopper = thread::spawn(move || {
            let res = Server::stop_acceptor(addr, acceptor);
            done_tx.send(()).unwrap();
            res
        });
        let returned = done_rx.recv_timeout(Duration::from_secs(5)).is_ok();

        drop(release_tx);
        stopper.join().unwrap().unwrap();
        assert!(returned, "stopping the acceptor hung");
    }

    #[test]
    fn test_shutdown_unspecified_address() {
        let server = Server::start(
            ServerConfig::default()
                .with_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
                .with_workers(1),
        )
        .unwrap();
        server.shutdown().unwrap();
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let res = Server::start(ServerConfig::default().with_workers(0));
        assert!(matches!(res, Err(Error::Config(_))));
    }

    #[test]
    fn test_start_rejects_bound_address() {
        let server = Server::start(ServerConfig::default().with_workers(1)).unwrap();
        let res = Server::start(ServerConfig::default().with_addr(server.local_addr()));
        assert!(matches!(res, Err(Error::Io(_))));
        server.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_idle_server() {
        let server = Server::start(ServerConfig::default().with_workers(2).with_max_entries(8)).unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.config().workers, 2);
        assert_eq!(server.map().capacity(), 8);
        let map = server.map().clone();
        server.shutdown().unwrap();
        assert!(!map.is_valid());
    }
}
