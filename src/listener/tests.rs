//! Listener Module Tests
//!
//! ## Test Scopes
//! - **End to end**: Real UDP exchanges over loopback through the worker pool.
//! - **Robustness**: Garbage datagrams are dropped and the loop keeps serving.
//! - **Concurrency**: Parallel clients, including simultaneous `clear` calls.

#[cfg(test)]
mod tests {
    use crate::collection::{CollectionStore, LockPolicy};
    use crate::config::ServerConfig;
    use crate::dispatcher::{CommandRegistry, Dispatcher};
    use crate::listener::Listener;
    use crate::model::fixtures::draft;
    use crate::persistence::{InMemoryRepository, RecordRepository};
    use crate::protocol::{CommandId, Payload, Request, Response, ResponseStatus, encode};
    use crate::transport::UdpClient;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tokio::net::UdpSocket;
    use tokio::sync::watch;

    struct Running {
        addr: SocketAddr,
        store: Arc<CollectionStore>,
        shutdown: watch::Sender<bool>,
        handle: tokio::task::JoinHandle<anyhow::Result<()>>,
    }

    async fn start(workers: usize) -> Running {
        let repository = Arc::new(InMemoryRepository::new());
        repository.create_user("alice", "pw-a").unwrap();
        repository.create_user("bob", "pw-b").unwrap();
        let store = Arc::new(CollectionStore::new(LockPolicy::per_class()));
        let dispatcher = Arc::new(Dispatcher::new(store.clone(), repository));

        let config = ServerConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            workers,
            ..ServerConfig::default()
        };
        let listener = Listener::bind(&config, dispatcher).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(listener.run(rx));

        Running {
            addr,
            store,
            shutdown,
            handle,
        }
    }

    fn request(command: CommandId, payload: Option<Payload>, user: &str, digest: &str) -> Request {
        Request {
            request_id: 0,
            command,
            payload,
            username: user.to_string(),
            password_digest: digest.to_string(),
            mute: false,
        }
    }

    async fn client(addr: SocketAddr) -> UdpClient {
        UdpClient::connect(addr, Duration::from_secs(3)).await.unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_over_loopback() {
        let server = start(2).await;
        let mut alice = client(server.addr).await;

        let added = alice
            .exchange(&request(
                CommandId::Add,
                Some(Payload::Record(draft("loopback"))),
                "alice",
                "pw-a",
            ))
            .await
            .unwrap();
        assert!(added.is_ok(), "{}", added.console_text());

        let shown = alice
            .exchange(&request(CommandId::Show, None, "alice", "pw-a"))
            .await
            .unwrap();
        assert!(shown.console_text().contains("loopback"));
        assert_eq!(server.store.len().await, 1);

        let rejected = alice
            .exchange(&request(CommandId::Clear, None, "alice", "bad"))
            .await
            .unwrap();
        assert_eq!(rejected.status, ResponseStatus::Unauthorized);
        assert_eq!(server.store.len().await, 1);

        server.shutdown.send(true).unwrap();
        server.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_large_show_is_fragmented_and_reassembled() {
        let server = start(3).await;
        let mut alice = client(server.addr).await;

        for i in 0..40 {
            let response = alice
                .exchange(&request(
                    CommandId::Add,
                    Some(Payload::Record(draft(&format!("group-number-{}", i)))),
                    "alice",
                    "pw-a",
                ))
                .await
                .unwrap();
            assert!(response.is_ok());
        }

        let shown = alice
            .exchange(&request(CommandId::Show, None, "alice", "pw-a"))
            .await
            .unwrap();
        assert_eq!(shown.console_text().lines().count(), 40);

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn test_garbage_datagram_does_not_stop_the_loop() {
        let server = start(1).await;

        let noisy = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        noisy.send_to(b"definitely not a request", server.addr).await.unwrap();

        let mut bob = client(server.addr).await;
        let response = bob
            .exchange(&request(CommandId::Help, None, "", ""))
            .await
            .unwrap();
        assert!(response.is_ok());

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_clients_and_clears() {
        let server = start(5).await;

        let mut tasks = Vec::new();
        for i in 0..10 {
            let addr = server.addr;
            let (user, digest) = if i % 2 == 0 {
                ("alice", "pw-a")
            } else {
                ("bob", "pw-b")
            };
            tasks.push(tokio::spawn(async move {
                let mut c = client(addr).await;
                c.exchange(&request(
                    CommandId::Add,
                    Some(Payload::Record(draft(&format!("g{}", i)))),
                    user,
                    digest,
                ))
                .await
                .unwrap()
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(server.store.len().await, 10);

        let clears: Vec<_> = (0..2)
            .map(|_| {
                let addr = server.addr;
                tokio::spawn(async move {
                    let mut c = client(addr).await;
                    c.exchange(&request(CommandId::Clear, None, "alice", "pw-a"))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for clear in clears {
            assert!(clear.await.unwrap().is_ok());
        }

        let owners: Vec<String> = server
            .store
            .snapshot()
            .await
            .into_iter()
            .map(|r| r.owner)
            .collect();
        assert_eq!(owners.len(), 5);
        assert!(owners.iter().all(|o| o == "bob"));

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_ends_run() {
        let server = start(2).await;
        server.shutdown.send(true).unwrap();

        let finished = tokio::time::timeout(Duration::from_secs(2), server.handle).await;
        assert!(finished.is_ok(), "run must return after shutdown");
    }

    #[tokio::test]
    async fn test_full_queue_drops_datagrams_instead_of_blocking() {
        // ARRANGE: one worker stuck in a slow handler, so the queue fills up.
        let handled = Arc::new(AtomicUsize::new(0));
        let registry = CommandRegistry::new();
        let counter = handled.clone();
        registry.register(CommandId::Help, move |_ctx| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(Response::ok())
            }
        });
        let store = Arc::new(CollectionStore::default());
        let dispatcher = Arc::new(Dispatcher::with_registry(
            registry,
            store,
            Arc::new(InMemoryRepository::new()),
        ));
        let config = ServerConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            workers: 1,
            ..ServerConfig::default()
        };
        let listener = Listener::bind(&config, dispatcher).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(listener.run(rx));

        // ACT
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let bytes = encode(&request(CommandId::Help, None, "", "")).unwrap();
        for _ in 0..30 {
            sender.send_to(&bytes, addr).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        let started = Instant::now();
        shutdown.send(true).unwrap();
        handle.await.unwrap().unwrap();

        // ASSERT: the backlog was bounded by the queue, not by the datagrams sent.
        let count = handled.load(Ordering::SeqCst);
        assert!(count >= 1);
        assert!(count < 30, "every datagram was queued: {}", count);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_repository_trait_object_is_shareable() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn RecordRepository>();
        assert_send_sync::<Dispatcher>();
    }
}
