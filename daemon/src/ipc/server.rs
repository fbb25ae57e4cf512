//! Local IPC server
//!
//! Unix domain socket on Unix, named pipe on Windows. Every connection gets
//! request-response handling plus pushed events once it subscribed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::protocol::{read_message, write_message, Request, Response};
use crate::events::AppEvent;
use crate::state::AppCommand;

#[cfg(unix)]
use tokio::net::UnixListener;
#[cfg(windows)]
use tokio::net::windows::named_pipe::{NamedPipeServer, ServerOptions};

/// IPC server forwarding front-end requests to the controller
pub struct Server {
    endpoint: PathBuf,
    #[cfg(unix)]
    listener: UnixListener,
    #[cfg(windows)]
    first_pipe: parking_lot::Mutex<Option<NamedPipeServer>>,
    commands: mpsc::Sender<AppCommand>,
    events: broadcast::Sender<AppEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the endpoint
    ///
    /// The caller holds the instance lock, so a leftover socket file is stale.
    #[cfg(unix)]
    pub fn bind(
        endpoint: &Path,
        commands: mpsc::Sender<AppCommand>,
        events: broadcast::Sender<AppEvent>,
    ) -> Result<Self> {
        use std::os::unix::fs::PermissionsExt;

        if let Some(parent) = endpoint.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        if endpoint.exists() {
            std::fs::remove_file(endpoint).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(endpoint).context("failed to bind Unix socket")?;

        // Owner-only (0600)
        std::fs::set_permissions(endpoint, std::fs::Permissions::from_mode(0o600))?;

        info!(?endpoint, "IPC server listening");

        Ok(Self {
            endpoint: endpoint.to_owned(),
            listener,
            commands,
            events,
            shutdown_tx: broadcast::channel(1).0,
        })
    }

    /// Create the first pipe instance; fails if another process owns the name
    #[cfg(windows)]
    pub fn bind(
        endpoint: &Path,
        commands: mpsc::Sender<AppCommand>,
        events: broadcast::Sender<AppEvent>,
    ) -> Result<Self> {
        let first = ServerOptions::new()
            .first_pipe_instance(true)
            .create(endpoint)
            .context("failed to create named pipe")?;

        info!(?endpoint, "IPC server listening");

        Ok(Self {
            endpoint: endpoint.to_owned(),
            first_pipe: parking_lot::Mutex::new(Some(first)),
            commands,
            events,
            shutdown_tx: broadcast::channel(1).0,
        })
    }

    /// Run the server, accepting connections
    #[cfg(unix)]
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    self.spawn_client(stream);
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }

    #[cfg(windows)]
    pub async fn run(&self) -> Result<()> {
        let mut pipe = self
            .first_pipe
            .lock()
            .take()
            .context("IPC server is already running")?;

        loop {
            if let Err(e) = pipe.connect().await {
                error!(error = %e, "pipe connect error");
                continue;
            }
            debug!("client connected");

            let next = ServerOptions::new()
                .create(&self.endpoint)
                .context("failed to create named pipe instance")?;
            let connected = std::mem::replace(&mut pipe, next);
            self.spawn_client(connected);
        }
    }

    fn spawn_client<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let commands = self.commands.clone();
        let events = self.events.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                result = handle_client(stream, commands, events) => {
                    if let Err(e) = result {
                        warn!(error = %e, "client handler error");
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("client handler shutting down");
                }
            }
        });
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        #[cfg(unix)]
        if self.endpoint.exists() {
            if let Err(e) = std::fs::remove_file(&self.endpoint) {
                warn!(error = %e, "failed to remove socket file");
            }
        }

        info!(endpoint = ?self.endpoint, "IPC server shutdown complete");
    }
}

/// Handle a single client connection
///
/// Reading runs in its own future so a pushed event never interrupts a
/// partially read request.
async fn handle_client<S>(
    stream: S,
    commands: mpsc::Sender<AppCommand>,
    events: broadcast::Sender<AppEvent>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (request_tx, mut request_rx) = mpsc::channel::<Request>(8);

    let read_loop = async move {
        while let Some(request) = read_message::<_, Request>(&mut reader).await? {
            if request_tx.send(request).await.is_err() {
                break;
            }
        }
        debug!("client disconnected");
        Ok::<(), anyhow::Error>(())
    };
    tokio::pin!(read_loop);

    let mut subscription: Option<broadcast::Receiver<AppEvent>> = None;
    let mut reading = true;

    loop {
        tokio::select! {
            biased;
            request = request_rx.recv() => {
                let Some(request) = request else {
                    return Ok(());
                };
                debug!(?request, "received request");
                if matches!(request, Request::Subscribe) {
                    subscription = Some(events.subscribe());
                    debug!("client subscribed to events");
                }
                let response = process_request(request, &commands).await;
                write_message(&mut writer, &response).await?;
            }
            result = &mut read_loop, if reading => {
                // Requests already read are still answered via request_rx
                result?;
                reading = false;
            }
            event = next_event(&mut subscription) => match event {
                Ok(event) => write_message(&mut writer, &Response::Event { event }).await?,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "IPC client lagged behind events");
                }
                Err(broadcast::error::RecvError::Closed) => subscription = None,
            },
        }
    }
}

async fn next_event(
    subscription: &mut Option<broadcast::Receiver<AppEvent>>,
) -> Result<AppEvent, broadcast::error::RecvError> {
    match subscription {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Translate a request into controller commands
async fn process_request(request: Request, commands: &mpsc::Sender<AppCommand>) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Subscribe => Response::Subscribed,

        Request::GetState => {
            let (reply, answer) = oneshot::channel();
            match ask(commands, AppCommand::Snapshot { reply }, answer).await {
                Ok(state) => Response::State { state },
                Err(response) => response,
            }
        }

        Request::ListDisplays => {
            let (reply, answer) = oneshot::channel();
            match ask(commands, AppCommand::ListDisplays { reply }, answer).await {
                Ok(displays) => Response::Displays { displays },
                Err(response) => response,
            }
        }

        Request::ApplyProfile { profile_id } => {
            forward(commands, AppCommand::ApplyProfile { profile_id }).await
        }
        Request::SaveProfile { profile } => forward(commands, AppCommand::SaveProfile(profile)).await,
        Request::DeleteProfile { profile_id } => {
            forward(commands, AppCommand::DeleteProfile { profile_id }).await
        }
        Request::SetHotkeys { hotkeys } => forward(commands, AppCommand::SetHotkeys(hotkeys)).await,
        Request::SetSelectedDisplays { displays } => {
            forward(commands, AppCommand::SetSelectedDisplays(displays)).await
        }
        Request::SetFlags {
            start_minimized,
            start_with_os,
            hide_on_close,
        } => {
            forward(
                commands,
                AppCommand::SetFlags {
                    start_minimized,
                    start_with_os,
                    hide_on_close,
                },
            )
            .await
        }
    }
}

async fn forward(commands: &mpsc::Sender<AppCommand>, command: AppCommand) -> Response {
    match commands.send(command).await {
        Ok(()) => Response::Accepted,
        Err(_) => unavailable(),
    }
}

async fn ask<T>(
    commands: &mpsc::Sender<AppCommand>,
    command: AppCommand,
    answer: oneshot::Receiver<T>,
) -> Result<T, Response> {
    commands.send(command).await.map_err(|_| unavailable())?;
    answer.await.map_err(|_| unavailable())
}

fn unavailable() -> Response {
    Response::error("unavailable", "the daemon is shutting down")
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use tokio::net::UnixStream;
    use uuid::Uuid;

    use super::*;
    use crate::settings::AppSettings;
    use crate::state::AppState;

    struct Fixture {
        server: std::sync::Arc<Server>,
        commands: mpsc::Receiver<AppCommand>,
        events: broadcast::Sender<AppEvent>,
        dir: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("profile-toggler-{}", Uuid::new_v4()));
            let (command_tx, commands) = mpsc::channel(8);
            let (events, _) = broadcast::channel(8);
            let server = Server::bind(&dir.join("ipc.sock"), command_tx, events.clone()).unwrap();
            let server = std::sync::Arc::new(server);

            let running = std::sync::Arc::clone(&server);
            tokio::spawn(async move { running.run().await });

            Self {
                server,
                commands,
                events,
                dir,
            }
        }

        async fn connect(&self) -> UnixStream {
            UnixStream::connect(self.dir.join("ipc.sock")).await.unwrap()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    async fn roundtrip(stream: &mut UnixStream, request: &Request) -> serde_json::Value {
        write_message(stream, request).await.unwrap();
        receive(stream).await
    }

    async fn receive(stream: &mut UnixStream) -> serde_json::Value {
        tokio::time::timeout(Duration::from_secs(2), read_message(stream))
            .await
            .unwrap()
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let fixture = Fixture::new();
        let mut client = fixture.connect().await;

        let response = roundtrip(&mut client, &Request::Ping).await;
        assert_eq!(response["type"], "pong");
    }

    #[tokio::test]
    async fn test_socket_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = Fixture::new();
        let mode = std::fs::metadata(fixture.dir.join("ipc.sock"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_command_is_forwarded() {
        let mut fixture = Fixture::new();
        let mut client = fixture.connect().await;
        let profile_id = Uuid::new_v4();

        let response = roundtrip(&mut client, &Request::ApplyProfile { profile_id }).await;
        assert_eq!(response["type"], "accepted");

        let command = fixture.commands.recv().await.unwrap();
        assert!(matches!(command, AppCommand::ApplyProfile { profile_id: id } if id == profile_id));
    }

    #[tokio::test]
    async fn test_get_state_is_answered_by_controller() {
        let mut fixture = Fixture::new();
        let mut client = fixture.connect().await;
        let last_applied = Uuid::new_v4();

        let mut commands = std::mem::replace(&mut fixture.commands, mpsc::channel(1).1);
        tokio::spawn(async move {
            if let Some(AppCommand::Snapshot { reply }) = commands.recv().await {
                let _ = reply.send(AppState {
                    settings: AppSettings::default(),
                    last_applied: Some(last_applied),
                });
            }
        });

        let response = roundtrip(&mut client, &Request::GetState).await;
        assert_eq!(response["type"], "state");
        assert_eq!(response["state"]["last_applied"], last_applied.to_string());
    }

    #[tokio::test]
    async fn test_controller_gone_reports_error() {
        let mut fixture = Fixture::new();
        let mut client = fixture.connect().await;
        fixture.commands.close();

        let response = roundtrip(&mut client, &Request::ListDisplays).await;
        assert_eq!(response["type"], "error");
        assert_eq!(response["code"], "unavailable");
    }

    #[tokio::test]
    async fn test_subscribed_client_receives_events() {
        let fixture = Fixture::new();
        let mut client = fixture.connect().await;

        let response = roundtrip(&mut client, &Request::Subscribe).await;
        assert_eq!(response["type"], "subscribed");

        fixture.events.send(AppEvent::HotkeysRegistered { count: 2 }).unwrap();
        let pushed = receive(&mut client).await;
        assert_eq!(pushed["type"], "event");
        assert_eq!(pushed["event"]["type"], "hotkeys_registered");
        assert_eq!(pushed["event"]["count"], 2);
    }

    #[tokio::test]
    async fn test_shutdown_removes_socket() {
        let fixture = Fixture::new();
        let socket = fixture.dir.join("ipc.sock");
        assert!(socket.exists());

        fixture.server.shutdown().await;
        assert!(!socket.exists());
    }
}
