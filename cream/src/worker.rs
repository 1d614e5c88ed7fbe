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
    hash::BuildHasher,
    io::{Read, Write},
    sync::Arc,
    thread::{self, JoinHandle},
};

use cream_common::queue::BlockingQueue;
use cream_memory::{ConcurrentMap, Error as MemoryError};

use crate::{
    config::ServerConfig,
    error::{Error, Result},
    protocol::{read_payload, RequestCode, RequestHeader, ResponseCode, ResponseHeader},
};

/// A connection a worker can serve one request on.
pub trait Connection: Read + Write + Send + 'static {}

impl<T> Connection for T where T: Read + Write + Send + 'static {}

/// An item of the work queue.
#[derive(Debug)]
pub enum Task<C> {
    /// Serve one request on the connection, then close it.
    Serve(C),
    /// Make the worker that receives it exit.
    Stop,
}

/// Serve exactly one request read from `conn` against `map`.
///
/// Returns the response code sent back. An error means the request could not be read or the response could not be
/// written, and the connection should be dropped.
pub fn handle_request<C, S>(map: &ConcurrentMap<S>, config: &ServerConfig, conn: &mut C) -> Result<ResponseCode>
where
    C: Read + Write,
    S: BuildHasher + Send + Sync + 'static,
{
    let header = RequestHeader::read_from(conn)?;
    tracing::trace!(?header, "[worker]: receive request");

    let code = match header.code {
        RequestCode::Put => {
            if !config.is_key_size_valid(header.key_size) || !config.is_value_size_valid(header.value_size) {
                respond(conn, ResponseCode::BadRequest, 0)?
            } else {
                let key = read_payload(conn, header.key_size)?;
                let value = read_payload(conn, header.value_size)?;
                match map.put(key, value, true) {
                    Ok(()) => respond(conn, ResponseCode::Ok, header.value_size)?,
                    Err(e) => {
                        tracing::debug!(?e, "[worker]: put failed");
                        respond(conn, ResponseCode::BadRequest, 0)?
                    }
                }
            }
        }
        RequestCode::Get => {
            if !config.is_key_size_valid(header.key_size) {
                respond(conn, ResponseCode::BadRequest, 0)?
            } else {
                let key = read_payload(conn, header.key_size)?;
                // Copy the value out within the read episode. Writers must not wait on the client socket.
                let response = map.get(&key).map(|value| {
                    ResponseHeader {
                        code: ResponseCode::Ok,
                        value_size: value.len() as u32,
                    }
                    .encode(&value)
                });
                match response {
                    Ok(buf) => {
                        conn.write_all(&buf)?;
                        ResponseCode::Ok
                    }
                    Err(MemoryError::NotFound) => respond(conn, ResponseCode::NotFound, 0)?,
                    Err(e) => {
                        tracing::debug!(?e, "[worker]: get failed");
                        respond(conn, ResponseCode::BadRequest, 0)?
                    }
                }
            }
        }
        RequestCode::Evict => {
            if !config.is_key_size_valid(header.key_size) {
                respond(conn, ResponseCode::BadRequest, 0)?
            } else {
                let key = read_payload(conn, header.key_size)?;
                if let Err(e) = map.delete(&key) {
                    tracing::trace!(?e, "[worker]: evict missed");
                }
                respond(conn, ResponseCode::Ok, 0)?
            }
        }
        RequestCode::Clear => match map.clear() {
            Ok(()) => respond(conn, ResponseCode::Ok, 0)?,
            Err(e) => {
                tracing::debug!(?e, "[worker]: clear failed");
                respond(conn, ResponseCode::BadRequest, 0)?
            }
        },
        RequestCode::Unknown(code) => {
            tracing::debug!(code, "[worker]: unsupported request code");
            respond(conn, ResponseCode::Unsupported, 0)?
        }
    };

    conn.flush()?;
    Ok(code)
}

fn respond(conn: &mut impl Write, code: ResponseCode, value_size: u32) -> Result<ResponseCode> {
    ResponseHeader { code, value_size }.write_to(conn, &[])?;
    Ok(code)
}

struct Worker<C, S> {
    id: usize,
    queue: Arc<BlockingQueue<Task<C>>>,
    map: Arc<ConcurrentMap<S>>,
    config: Arc<ServerConfig>,
}

impl<C, S> Worker<C, S>
where
    C: Connection,
    S: BuildHasher + Send + Sync + 'static,
{
    fn run(self) {
        tracing::debug!(id = self.id, "[worker]: start");
        loop {
            match self.queue.dequeue() {
                Ok(Task::Serve(mut conn)) => match handle_request(&self.map, &self.config, &mut conn) {
                    Ok(code) => tracing::trace!(id = self.id, ?code, "[worker]: request served"),
                    Err(e) => tracing::warn!(id = self.id, ?e, "[worker]: drop connection on error"),
                },
                Ok(Task::Stop) => break,
                Err(e) => {
                    tracing::debug!(id = self.id, ?e, "[worker]: queue closed");
                    break;
                }
            }
        }
        tracing::debug!(id = self.id, "[worker]: stop");
    }
}

/// A fixed set of threads serving connections taken from a shared queue, one request per connection.
pub struct WorkerPool<C> {
    queue: Arc<BlockingQueue<Task<C>>>,
    handles: Vec<JoinHandle<()>>,
}

impl<C> WorkerPool<C>
where
    C: Connection,
{
    /// Spawn `workers` threads named `cream-worker-{i}` that serve connections from `queue` against `map`.
    ///
    /// If a thread cannot be spawned, the already running ones are stopped before the error is returned.
    pub fn spawn<S>(
        workers: usize,
        queue: Arc<BlockingQueue<Task<C>>>,
        map: Arc<ConcurrentMap<S>>,
        config: Arc<ServerConfig>,
    ) -> Result<Self>
    where
        S: BuildHasher + Send + Sync + 'static,
    {
        let mut pool = Self {
            queue,
            handles: Vec::with_capacity(workers),
        };
        for id in 0..workers {
            let worker = Worker {
                id,
                queue: pool.queue.clone(),
                map: map.clone(),
                config: config.clone(),
            };
            match thread::Builder::new()
                .name(format!("cream-worker-{id}"))
                .spawn(move || worker.run())
            {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    if let Err(e) = pool.shutdown() {
                        tracing::warn!(?e, "[worker pool]: stop partially spawned pool failed");
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(pool)
    }

    /// Running worker count.
    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Stop every worker and wait for them to exit.
    ///
    /// Each worker finishes the tasks queued before its stop signal. Producers must be stopped first.
    pub fn shutdown(self) -> Result<()> {
        for _ in 0..self.handles.len() {
            self.queue.enqueue(Task::Stop)?;
        }
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or_default().to_string();
            handle
                .join()
                .map_err(|_| Error::Join(format!("{name} panicked")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, sync::mpsc, time::Duration};

    use bytes::Bytes;
    use cream_memory::{ConcurrentMapBuilder, DefaultEventListener, JenkinsHasher};
    use parking_lot::Mutex;

    use super::*;
    use crate::protocol::{read_response, write_request};

    #[derive(Debug)]
    struct MockConnection {
        input: Cursor<Vec<u8>>,
        output: Arc<Mutex<Vec<u8>>>,
    }

    impl MockConnection {
        fn new(code: RequestCode, key: &[u8], value: &[u8]) -> Self {
            let mut input = vec![];
            write_request(&mut input, code, key, value).unwrap();
            Self {
                input: Cursor::new(input),
                output: Arc::default(),
            }
        }

        fn response(&self, with_value: bool) -> (ResponseHeader, Bytes) {
            let output = self.output.lock().clone();
            read_response(&mut Cursor::new(output), with_value).unwrap()
        }
    }

    impl Read for MockConnection {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockConnection {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.lock().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn map_for_test(capacity: u32) -> Arc<ConcurrentMap> {
        Arc::new(
            ConcurrentMapBuilder::new(capacity)
                .with_hash_builder(JenkinsHasher::default())
                .with_event_listener(Arc::new(DefaultEventListener))
                .build()
                .unwrap(),
        )
    }

    fn serve(map: &ConcurrentMap, code: RequestCode, key: &[u8], value: &[u8]) -> (ResponseHeader, Bytes) {
        let mut conn = MockConnection::new(code, key, value);
        let config = ServerConfig::default();
        let sent = handle_request(map, &config, &mut conn).unwrap();
        let res = conn.response(code == RequestCode::Get);
        assert_eq!(sent, res.0.code);
        res
    }

    #[test_log::test]
    fn test_request_cycle() {
        let map = map_for_test(16);

        let (header, _) = serve(&map, RequestCode::Put, b"key", b"value");
        assert_eq!(header.code, ResponseCode::Ok);
        assert_eq!(header.value_size, 5);

        let (header, value) = serve(&map, RequestCode::Get, b"key", b"");
        assert_eq!(header.code, ResponseCode::Ok);
        assert_eq!(value, Bytes::from_static(b"value"));

        let (header, _) = serve(&map, RequestCode::Evict, b"key", b"");
        assert_eq!(header.code, ResponseCode::Ok);
        let (header, _) = serve(&map, RequestCode::Get, b"key", b"");
        assert_eq!(header.code, ResponseCode::NotFound);

        // Evicting an absent key still succeeds.
        let (header, _) = serve(&map, RequestCode::Evict, b"key", b"");
        assert_eq!(header.code, ResponseCode::Ok);

        serve(&map, RequestCode::Put, b"a", b"1");
        serve(&map, RequestCode::Put, b"b", b"2");
        assert_eq!(map.len(), 2);
        let (header, _) = serve(&map, RequestCode::Clear, b"", b"");
        assert_eq!(header.code, ResponseCode::Ok);
        assert!(map.is_empty());
    }

    #[test]
    fn test_put_forces_on_full_map() {
        let map = map_for_test(2);
        serve(&map, RequestCode::Put, b"a", b"1");
        serve(&map, RequestCode::Put, b"b", b"2");
        let (header, _) = serve(&map, RequestCode::Put, b"c", b"3");
        assert_eq!(header.code, ResponseCode::Ok);
        assert_eq!(map.len(), 2);
        assert_eq!(&*map.get(b"c").unwrap(), b"3");
    }

    #[test]
    fn test_size_bounds() {
        let map = map_for_test(16);

        let (header, _) = serve(&map, RequestCode::Put, &[0; 129], b"value");
        assert_eq!(header.code, ResponseCode::BadRequest);
        let (header, _) = serve(&map, RequestCode::Put, b"key", &[0; 513]);
        assert_eq!(header.code, ResponseCode::BadRequest);
        let (header, _) = serve(&map, RequestCode::Put, b"key", b"");
        assert_eq!(header.code, ResponseCode::BadRequest);
        let (header, _) = serve(&map, RequestCode::Get, b"", b"");
        assert_eq!(header.code, ResponseCode::BadRequest);
        let (header, _) = serve(&map, RequestCode::Evict, &[0; 200], b"");
        assert_eq!(header.code, ResponseCode::BadRequest);
        assert!(map.is_empty());

        let (header, _) = serve(&map, RequestCode::Put, &[7; 128], &[9; 512]);
        assert_eq!(header.code, ResponseCode::Ok);
        assert_eq!(map.get(&[7; 128]).unwrap().len(), 512);
    }

    /// Blocks in `write` until released, reporting when it got there.
    struct StalledConnection {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        stalled: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
    }

    impl Read for StalledConnection {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for StalledConnection {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let _ = self.stalled.send(());
            let _ = self.release.recv();
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test_log::test]
    fn test_slow_client_does_not_block_writers() {
        let map = map_for_test(16);
        map.put(&b"k"[..], &b"v"[..], true).unwrap();

        let (stalled_tx, stalled_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let reader = {
            let map = map.clone();
            thread::spawn(move || {
                let mut input = vec![];
                write_request(&mut input, RequestCode::Get, b"k", b"").unwrap();
                let mut conn = StalledConnection {
                    input: Cursor::new(input),
                    output: vec![],
                    stalled: stalled_tx,
                    release: release_rx,
                };
                let code = handle_request(&map, &ServerConfig::default(), &mut conn).unwrap();
                (code, conn.output)
            })
        };
        stalled_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let writer = {
            let map = map.clone();
            thread::spawn(move || {
                map.put(&b"other"[..], &b"x"[..], true).unwrap();
                done_tx.send(()).unwrap();
            })
        };
        let finished = done_rx.recv_timeout(Duration::from_secs(5)).is_ok();

        drop(release_tx);
        let (code, output) = reader.join().unwrap();
        writer.join().unwrap();

        assert!(finished, "put waited for the client socket");
        assert_eq!(code, ResponseCode::Ok);
        let (header, value) = read_response(&mut Cursor::new(output), true).unwrap();
        assert_eq!(header.code, ResponseCode::Ok);
        assert_eq!(value, Bytes::from_static(b"v"));
        assert_eq!(&*map.get(b"other").unwrap(), b"x");
    }

    #[test]
    fn test_unsupported() {
        let map = map_for_test(16);
        let (header, _) = serve(&map, RequestCode::Unknown(0x03), b"", b"");
        assert_eq!(header.code, ResponseCode::Unsupported);
    }

    #[test]
    fn test_torn_down_map() {
        let map = map_for_test(16);
        map.teardown().unwrap();
        let (header, _) = serve(&map, RequestCode::Put, b"key", b"value");
        assert_eq!(header.code, ResponseCode::BadRequest);
        let (header, _) = serve(&map, RequestCode::Get, b"key", b"");
        assert_eq!(header.code, ResponseCode::BadRequest);
        let (header, _) = serve(&map, RequestCode::Evict, b"key", b"");
        assert_eq!(header.code, ResponseCode::Ok);
        let (header, _) = serve(&map, RequestCode::Clear, b"", b"");
        assert_eq!(header.code, ResponseCode::BadRequest);
    }

    #[test]
    fn test_truncated_request() {
        let map = map_for_test(16);
        let mut input = vec![];
        write_request(&mut input, RequestCode::Put, b"key", b"value").unwrap();
        input.truncate(input.len() - 2);
        let mut conn = MockConnection {
            input: Cursor::new(input),
            output: Arc::default(),
        };
        let res = handle_request(&map, &ServerConfig::default(), &mut conn);
        assert!(matches!(res, Err(Error::Io(_))));
        assert!(conn.output.lock().is_empty());
        assert!(map.is_empty());
    }

    #[test_log::test]
    fn test_pool_serves_queued_connections() {
        let map = map_for_test(64);
        let queue = Arc::new(BlockingQueue::new());
        let pool = WorkerPool::spawn(3, queue.clone(), map.clone(), Arc::new(ServerConfig::default())).unwrap();
        assert_eq!(pool.workers(), 3);

        let outputs = (0..32u8)
            .map(|i| {
                let conn = MockConnection::new(RequestCode::Put, &[i], &[i, i]);
                let output = conn.output.clone();
                queue.enqueue(Task::Serve(conn)).unwrap();
                output
            })
            .collect::<Vec<_>>();

        pool.shutdown().unwrap();
        assert!(queue.is_empty());
        assert_eq!(map.len(), 32);
        for output in outputs {
            let (header, _) = read_response(&mut Cursor::new(output.lock().clone()), false).unwrap();
            assert_eq!(header.code, ResponseCode::Ok);
            assert_eq!(header.value_size, 2);
        }
        for i in 0..32u8 {
            assert_eq!(&*map.get(&[i]).unwrap(), &[i, i]);
        }
    }
}
