//! Fakes shared by the unit tests.
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::bot::CommandRouter;
use crate::monitoring::{CheckerSettings, HealthChecker, ProbeError, Prober};
use crate::notifications::{
    ActionTable, NotificationSender, NotificationService, OutgoingMessage, SenderError,
};
use crate::registry::{MonitoredTarget, ServerRecord, TargetRegistry};
use crate::remediation::{RemediationController, default_services};
use crate::remote::{CommandExecutor, CommandOutput, ExecError};

pub fn server(address: &str, name: &str) -> ServerRecord {
    ServerRecord {
        address: address.to_string(),
        name: name.to_string(),
        login: "root".to_string(),
        secret: "password".to_string(),
        port: 22,
    }
}

/// `(url, address, server name)` triples; servers are deduplicated by address.
pub fn registry_with(entries: &[(&str, &str, &str)]) -> TargetRegistry {
    let targets = entries
        .iter()
        .map(|(url, address, _)| MonitoredTarget {
            url: url.to_string(),
            address: address.to_string(),
        })
        .collect();
    let mut seen = HashSet::new();
    let servers = entries
        .iter()
        .filter(|(_, address, _)| seen.insert(*address))
        .map(|(_, address, name)| server(address, name))
        .collect();
    TargetRegistry::new(targets, servers).unwrap()
}

pub fn notification_service(
    sender: &Arc<RecordingSender>,
    servers: &[ServerRecord],
) -> Arc<NotificationService> {
    let actions = ActionTable::new(servers, &default_services());
    Arc::new(NotificationService::new(sender.clone(), Arc::new(actions)))
}

#[derive(Default)]
pub struct RecordingSender {
    messages: Mutex<Vec<OutgoingMessage>>,
    answers: Mutex<Vec<(String, String)>>,
    fail: bool,
    hang: bool,
}

impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every call stays pending forever, like a transport that never answers.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn answers(&self) -> Vec<(String, String)> {
        self.answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), SenderError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(SenderError::SendFailed("transport down".to_string()));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), SenderError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(SenderError::SendFailed("transport down".to_string()));
        }
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Records every command; succeeds unless told otherwise per (address, service).
#[derive(Default)]
pub struct FakeExecutor {
    calls: Mutex<Vec<(String, String)>>,
    failures: Mutex<HashMap<(String, String), Result<CommandOutput, ExecError>>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeExecutor {
    pub fn with_delay_ms(ms: u64) -> Self {
        Self {
            delay: Some(Duration::from_millis(ms)),
            ..Self::default()
        }
    }

    pub fn fail_with_exit(&self, address: &str, service: &str, exit_code: i32, stderr: &str) {
        self.failures.lock().unwrap().insert(
            (address.to_string(), service.to_string()),
            Ok(CommandOutput {
                exit_code,
                stdout: String::new(),
                stderr: stderr.to_string(),
            }),
        );
    }

    pub fn fail_with_error(&self, address: &str, service: &str, error: ExecError) {
        self.failures
            .lock()
            .unwrap()
            .insert((address.to_string(), service.to_string()), Err(error));
    }

    pub fn commands_for(&self, address: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == address)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn execute(
        &self,
        server: &ServerRecord,
        command: &str,
    ) -> Result<CommandOutput, ExecError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((server.address.clone(), command.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let service = command.rsplit(' ').next().unwrap_or_default().to_string();
        let scripted = self
            .failures
            .lock()
            .unwrap()
            .get(&(server.address.clone(), service))
            .cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        scripted.unwrap_or_else(|| {
            Ok(CommandOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        })
    }
}

/// Every URL is up unless marked down.
#[derive(Default)]
pub struct FakeProber {
    down: Mutex<HashSet<String>>,
}

impl FakeProber {
    pub fn set_down(&self, url: &str) {
        self.down.lock().unwrap().insert(url.to_string());
    }

    pub fn set_up(&self, url: &str) {
        self.down.lock().unwrap().remove(url);
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, url: &str) -> Result<(), ProbeError> {
        if self.down.lock().unwrap().contains(url) {
            Err(ProbeError::Request("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

/// reqwest client that ignores proxy settings, for talking to local listeners.
pub fn local_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .no_proxy()
        .build()
        .unwrap()
}

/// Minimal HTTP/1.1 server: answers one connection per scripted
/// `(status, body)` pair, in order, then stops listening.
pub struct StubHttpServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubHttpServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();
        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                recorded.lock().unwrap().push(request);
                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        Self { addr, requests }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Waits in real time until `condition` holds, failing after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
}

/// Router over a single server (`10.0.0.1`, "SERVER1") with every probe up.
pub fn command_router(sender: &Arc<RecordingSender>, chat_id: &str) -> CommandRouter {
    let registry = Arc::new(registry_with(&[("http://10.0.0.1", "10.0.0.1", "SERVER1")]));
    let notifications = notification_service(sender, registry.servers());
    let controller = Arc::new(RemediationController::new(
        Arc::new(FakeExecutor::default()),
        notifications.clone(),
        default_services(),
    ));
    let checker = Arc::new(HealthChecker::new(
        registry.clone(),
        Arc::new(FakeProber::default()),
        controller.clone(),
        notifications.clone(),
        CheckerSettings {
            check_interval: Duration::from_secs(60),
            auto_restart_delay: Duration::from_secs(10),
            cancel_on_recovery: true,
        },
    ));
    CommandRouter::new(registry, checker, controller, notifications, chat_id)
}
