use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use grindvakt_config::{ControlConfig, GrindvaktConfig};
use grindvakt_engine::{control_send, serve_control, EngineError, FilterEngine, Verdict};
use grindvakt_prevention::{Action, ChainId, Command, Rule, COMMAND_WIRE_SIZE};
use grindvakt_protocols::ip_protocol;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// IPv4 + ICMP echo request, 192.168.122.1 -> 192.168.122.122
const ICMP_ECHO: &[u8] = &[
    0x45, 0x00, 0x00, 0x1c, 0xa6, 0xf2, 0x40, 0x00, 0x40, 0x01, 0x1d, 0x5a, 0xc0, 0xa8, 0x7a,
    0x01, 0xc0, 0xa8, 0x7a, 0x7a, 0x08, 0x00, 0xf7, 0xff, 0x00, 0x01, 0x00, 0x01,
];

struct Server {
    engine: Arc<FilterEngine>,
    path: PathBuf,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), EngineError>>,
}

async fn server_start(name: &str) -> Server {
    server_start_with_timeout(name, 5_000).await
}

async fn server_start_with_timeout(name: &str, read_timeout_ms: u64) -> Server {
    let path = std::env::temp_dir()
        .join(format!("grindvakt-test-{}", std::process::id()))
        .join(format!("{name}.sock"));
    let control = ControlConfig {
        socket_path: path.clone(),
        read_timeout_ms,
    };
    let engine = Arc::new(FilterEngine::new(&GrindvaktConfig::default()).unwrap());
    let (stop, stopped) = oneshot::channel::<()>();

    let task = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            serve_control(engine, &control, async {
                let _ = stopped.await;
            })
            .await
        }
    });

    // Wait for the listener to come up.
    for _ in 0..100 {
        if path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    Server {
        engine,
        path,
        stop,
        task,
    }
}

impl Server {
    async fn stop(self) -> Arc<FilterEngine> {
        let _ = self.stop.send(());
        self.task.await.unwrap().unwrap();
        assert!(!self.path.exists());
        self.engine
    }
}

#[tokio::test]
async fn add_and_flush_over_socket() {
    let server = server_start("add-flush").await;
    let rule = Rule::new(Action::Drop)
        .with_source(Ipv4Addr::new(192, 168, 122, 1))
        .with_protocol(ip_protocol::ICMP)
        .with_icmp_type(8);

    let reply = control_send(
        &server.path,
        &Command::Add {
            chain: ChainId::Input,
            rule,
        },
    )
    .await
    .unwrap();
    assert_eq!(reply, "ok");
    assert_eq!(server.engine.hook_local_in(ICMP_ECHO), Verdict::Drop);

    control_send(
        &server.path,
        &Command::Flush {
            chain: ChainId::Input,
        },
    )
    .await
    .unwrap();
    assert_eq!(server.engine.hook_local_in(ICMP_ECHO), Verdict::Accept);

    server.stop().await;
}

#[tokio::test]
async fn oversize_write_is_rejected() {
    let server = server_start("oversize").await;

    let mut stream = UnixStream::connect(&server.path).await.unwrap();
    let mut request = Command::Add {
        chain: ChainId::Output,
        rule: Rule::new(Action::Drop),
    }
    .encode()
    .to_vec();
    request.extend_from_slice(&[0; 8]);
    stream.write_all(&request).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    assert_eq!(reply[0], 1);
    let message = String::from_utf8(reply[1..].to_vec()).unwrap();
    assert!(message.contains(&format!("expected a {COMMAND_WIRE_SIZE}-byte command")));

    let engine = server.stop().await;
    assert!(engine.firewall().chain(ChainId::Output).is_empty());
    assert_eq!(engine.metrics().control_rejected.get(), 1);
}

#[tokio::test]
async fn full_chain_is_reported_to_client() {
    let server = server_start("full-chain").await;
    let add = Command::Add {
        chain: ChainId::Input,
        rule: Rule::new(Action::Drop),
    };

    // Fill the chain up to its default budget directly, then overflow it.
    let budget = server.engine.firewall().chain(ChainId::Input).max_rules();
    for _ in 0..budget {
        server.engine.control().write(&add.encode()).unwrap();
    }

    let err = control_send(&server.path, &add).await.unwrap_err();
    assert!(matches!(err, EngineError::Rejected(msg) if msg.contains("Rule memory exhausted")));

    server.stop().await;
}

#[tokio::test]
async fn idle_client_is_timed_out() {
    let server = server_start_with_timeout("idle", 100).await;
    let add = Command::Add {
        chain: ChainId::Input,
        rule: Rule::new(Action::Drop),
    };

    // Full command, but the write half stays open.
    let mut stream = UnixStream::connect(&server.path).await.unwrap();
    stream.write_all(&add.encode()).await.unwrap();

    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply[0], 1);
    assert!(String::from_utf8_lossy(&reply[1..]).contains("timed out"));

    let engine = server.stop().await;
    assert!(engine.firewall().chain(ChainId::Input).is_empty());
    assert_eq!(engine.metrics().control_rejected.get(), 1);
}

#[tokio::test]
async fn stop_waits_for_connections_in_flight() {
    let Server {
        engine,
        path,
        stop,
        task,
    } = server_start("in-flight").await;

    let mut stream = UnixStream::connect(&path).await.unwrap();
    stream
        .write_all(
            &Command::Add {
                chain: ChainId::Output,
                rule: Rule::new(Action::Drop),
            }
            .encode(),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let _ = stop.send(());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished());

    stream.shutdown().await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    assert_eq!(reply, b"\x00ok");

    task.await.unwrap().unwrap();
    assert!(!path.exists());
    assert_eq!(engine.firewall().chain(ChainId::Output).len(), 1);
}
