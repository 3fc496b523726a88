use anyhow::Result;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, watch};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::protocol::{Request, Response, decode};
use crate::transport::{MAX_DATAGRAM, send_response};

/// Idle backoff of the acceptor when no datagram is waiting.
const IDLE_BACKOFF: Duration = Duration::from_millis(3);

/// One received datagram waiting for a worker.
struct Job {
    src: SocketAddr,
    bytes: Vec<u8>,
}

pub struct Listener {
    socket: Arc<UdpSocket>,
    dispatcher: Arc<Dispatcher>,
    workers: usize,
    chunk_size: usize,
}

impl Listener {
    pub async fn bind(config: &ServerConfig, dispatcher: Arc<Dispatcher>) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind(config.bind).await?;
        tracing::info!("Listening on {}", socket.local_addr()?);

        Ok(Arc::new(Self {
            socket: Arc::new(socket),
            dispatcher,
            workers: config.workers.max(1),
            chunk_size: config.chunk_size,
        }))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Accepts datagrams until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// The acceptor never waits for a worker: when the queue is full the datagram is
    /// dropped and the client's timeout takes over.
    ///
    /// Workers finish the jobs already queued before this returns.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let (tx, rx) = mpsc::channel::<Job>(self.workers * 4);
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let listener = self.clone();
            let jobs = rx.clone();
            handles.push(tokio::spawn(async move {
                listener.worker_loop(worker_id, jobs).await;
            }));
        }
        tracing::info!("Started {} request workers", self.workers);

        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.socket.try_recv_from(&mut buf) {
                Ok((len, src)) => {
                    tracing::trace!("Received {} bytes from {}", len, src);
                    let job = Job {
                        src,
                        bytes: buf[..len].to_vec(),
                    };
                    match tx.try_send(job) {
                        Ok(()) => {}
                        Err(TrySendError::Full(job)) => {
                            tracing::warn!(
                                "Request queue full, dropping datagram from {}",
                                job.src
                            );
                        }
                        Err(TrySendError::Closed(_)) => {
                            tracing::error!("All request workers have stopped");
                            break;
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    tokio::select! {
                        _ = tokio::time::sleep(IDLE_BACKOFF) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    // ICMP port-unreachable from a vanished client surfaces here on some platforms.
                    tracing::warn!("Failed to receive datagram: {}", e);
                    tokio::time::sleep(IDLE_BACKOFF).await;
                }
            }
        }

        tracing::info!("Listener shutting down");
        drop(tx);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Request worker ended abnormally: {}", e);
            }
        }
        Ok(())
    }

    async fn worker_loop(&self, worker_id: usize, jobs: Arc<Mutex<mpsc::Receiver<Job>>>) {
        tracing::debug!("Worker {} started", worker_id);

        loop {
            let job = { jobs.lock().await.recv().await };
            let Some(job) = job else {
                break;
            };
            self.handle(job).await;
        }

        tracing::debug!("Worker {} stopped", worker_id);
    }

    async fn handle(&self, job: Job) {
        let request: Request = match decode(&job.bytes) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Dropping undecodable datagram from {}: {}", job.src, e);
                return;
            }
        };
        tracing::info!("{} from {} ({})", request.command, job.src, request.username);

        let request_id = request.request_id;

        // A panicking handler must not take the worker down with it.
        let dispatcher = self.dispatcher.clone();
        let response = match tokio::spawn(async move { dispatcher.dispatch(request).await }).await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Handler for request from {} panicked: {}", job.src, e);
                Response::failed("internal error")
            }
        };

        if let Err(e) = send_response(&self.socket, job.src, request_id, &response, self.chunk_size).await {
            tracing::warn!("Failed to answer {}: {}", job.src, e);
        }
    }
}
