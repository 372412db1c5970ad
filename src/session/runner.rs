//! The tokio event loop around a [`Session`].
//!
//! One task owns the session and serializes its inputs into a single
//! sequence: the next timer deadline, transport events and caller commands.
//! Callers talk to it through a cloneable [`SessionHandle`]; every command is
//! answered on a oneshot channel, and connection status is republished on a
//! `watch` channel after each step.
//!
//! Repository snapshots are written on a blocking thread every flush
//! interval, and once more on the way out.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

use super::{AdminOperation, ConnectionStatus, Session, SessionError};
use crate::notify::NotificationSink;
use crate::protobuf::{MqttClientProxyMessage, Waypoint};
use crate::storage::{Repository, RepositoryError};
use crate::transport::{DeviceId, Transport, TransportEvent};

type Reply<V> = oneshot::Sender<Result<V, SessionError>>;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum SessionCommand {
    Connect {
        device: DeviceId,
        reply: Reply<()>,
    },
    Disconnect {
        auto_reconnect: bool,
    },
    SendText {
        text: String,
        to: Option<u32>,
        channel: u32,
        reply_id: Option<u32>,
        emoji: bool,
        reply: Reply<u32>,
    },
    SendWaypoint {
        waypoint: Waypoint,
        channel: u32,
        reply: Reply<u32>,
    },
    SendPosition {
        latitude: f64,
        longitude: f64,
        altitude: Option<i32>,
        reply: Reply<u32>,
    },
    SendAdmin {
        operation: AdminOperation,
        target: Option<u32>,
        reply: Reply<u32>,
    },
    ImportChannelUrl {
        url: String,
        reply: Reply<Vec<u32>>,
    },
    ImportContactUrl {
        url: String,
        reply: Reply<u32>,
    },
    RequestTraceRoute {
        dest: u32,
        channel: u32,
        reply: Reply<u32>,
    },
    SendMqttProxy {
        message: MqttClientProxyMessage,
        reply: Reply<()>,
    },
    Shutdown,
}

pub struct SessionRunner<T, R, N> {
    session: Session<T, R, N>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    status_tx: watch::Sender<ConnectionStatus>,
    flush_interval: Duration,
}

impl<T: Transport, R: Repository, N: NotificationSink> SessionRunner<T, R, N> {
    /// `events` is the receiving end of the channel the transport emits on.
    pub fn new(
        session: Session<T, R, N>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(session.status());
        let runner = Self {
            session,
            events,
            commands,
            status_tx,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        };
        let handle = SessionHandle {
            commands: commands_tx,
            status: status_rx,
        };
        (runner, handle)
    }

    /// How often saved repository changes are written out.
    pub fn with_flush_interval(mut self, every: Duration) -> Self {
        self.flush_interval = every;
        self
    }

    /// Run until shutdown, every handle is dropped, or the transport channel
    /// closes. Returns the session for inspection.
    pub async fn run(self) -> Session<T, R, N> {
        let SessionRunner {
            mut session,
            mut events,
            mut commands,
            status_tx,
            flush_interval,
        } = self;
        info!("Session runner started");
        session.start(Instant::now().into_std());
        publish(&session, &status_tx);

        let mut flush_tick = interval(flush_interval);
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let (flush_done_tx, mut flush_done) = mpsc::unbounded_channel();
        let mut flush_in_flight = false;

        loop {
            let deadline = session.next_deadline().map(Instant::from_std);
            tokio::select! {
                // Due timers before input so a busy link cannot hold them off;
                // events before commands so a connect sees every discovery already queued
                biased;
                _ = sleep_until_deadline(deadline) => {
                    session.on_timers(Instant::now().into_std());
                }
                Some(done) = flush_done.recv() => {
                    flush_in_flight = false;
                    report_flush(&mut session, done);
                }
                _ = flush_tick.tick(), if !flush_in_flight => {
                    if let Some(job) = session.repository_mut().take_flush() {
                        flush_in_flight = true;
                        let done_tx = flush_done_tx.clone();
                        tokio::task::spawn_blocking(move || {
                            let _ = done_tx.send(job());
                        });
                    }
                }
                event = events.recv() => match event {
                    Some(event) => session.on_transport_event(event, Instant::now().into_std()),
                    None => {
                        warn!("Transport event channel closed; stopping session");
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) => {
                        info!("Session runner received shutdown");
                        break;
                    }
                    Some(command) => handle_command(&mut session, command),
                    None => {
                        debug!("All session handles dropped");
                        break;
                    }
                },
            }
            publish(&session, &status_tx);
        }

        session.disconnect(false, Instant::now().into_std());
        publish(&session, &status_tx);
        drop(flush_done_tx);
        if flush_in_flight {
            if let Some(done) = flush_done.recv().await {
                report_flush(&mut session, done);
            }
        }
        if let Some(job) = session.repository_mut().take_flush() {
            match tokio::task::spawn_blocking(job).await {
                Ok(done) => report_flush(&mut session, done),
                Err(e) => warn!("Final repository flush did not finish: {}", e),
            }
        }
        info!("Session runner stopped");
        session
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

fn report_flush<T: Transport, R: Repository, N: NotificationSink>(
    session: &mut Session<T, R, N>,
    done: Result<(), RepositoryError>,
) {
    if let Err(e) = done {
        warn!("Repository flush failed, will retry: {}", e);
        session.repository_mut().flush_failed();
    }
}

fn publish<T: Transport, R: Repository, N: NotificationSink>(
    session: &Session<T, R, N>,
    status_tx: &watch::Sender<ConnectionStatus>,
) {
    let status = session.status();
    status_tx.send_if_modified(|current| {
        if *current == status {
            false
        } else {
            *current = status;
            true
        }
    });
}

fn respond<V>(reply: Reply<V>, result: Result<V, SessionError>) {
    if reply.send(result).is_err() {
        debug!("Caller went away before the reply was ready");
    }
}

fn handle_command<T: Transport, R: Repository, N: NotificationSink>(
    session: &mut Session<T, R, N>,
    command: SessionCommand,
) {
    let now = Instant::now().into_std();
    match command {
        SessionCommand::Connect { device, reply } => respond(reply, session.connect(&device, now)),
        SessionCommand::Disconnect { auto_reconnect } => session.disconnect(auto_reconnect, now),
        SessionCommand::SendText {
            text,
            to,
            channel,
            reply_id,
            emoji,
            reply,
        } => respond(reply, session.send_text(&text, to, channel, reply_id, emoji)),
        SessionCommand::SendWaypoint {
            waypoint,
            channel,
            reply,
        } => respond(reply, session.send_waypoint(waypoint, channel)),
        SessionCommand::SendPosition {
            latitude,
            longitude,
            altitude,
            reply,
        } => respond(reply, session.send_position(latitude, longitude, altitude)),
        SessionCommand::SendAdmin {
            operation,
            target,
            reply,
        } => respond(reply, session.send_admin(operation, target, now)),
        SessionCommand::ImportChannelUrl { url, reply } => {
            respond(reply, session.import_channel_url(&url, now))
        }
        SessionCommand::ImportContactUrl { url, reply } => {
            respond(reply, session.import_contact_url(&url, now))
        }
        SessionCommand::RequestTraceRoute {
            dest,
            channel,
            reply,
        } => respond(reply, session.request_trace_route(dest, channel)),
        SessionCommand::SendMqttProxy { message, reply } => {
            respond(reply, session.send_mqtt_proxy(message))
        }
        SessionCommand::Shutdown => {}
    }
}

/// Cloneable front door to a running [`SessionRunner`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    status: watch::Receiver<ConnectionStatus>,
}

impl SessionHandle {
    async fn request<V>(
        &self,
        build: impl FnOnce(Reply<V>) -> SessionCommand,
    ) -> Result<V, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn connect(&self, device: DeviceId) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Connect { device, reply })
            .await
    }

    pub fn disconnect(&self, auto_reconnect: bool) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::Disconnect { auto_reconnect })
            .map_err(|_| SessionError::Closed)
    }

    pub async fn send_text(
        &self,
        text: impl Into<String>,
        to: Option<u32>,
        channel: u32,
        reply_id: Option<u32>,
        emoji: bool,
    ) -> Result<u32, SessionError> {
        let text = text.into();
        self.request(|reply| SessionCommand::SendText {
            text,
            to,
            channel,
            reply_id,
            emoji,
            reply,
        })
        .await
    }

    pub async fn send_waypoint(&self, waypoint: Waypoint, channel: u32) -> Result<u32, SessionError> {
        self.request(|reply| SessionCommand::SendWaypoint {
            waypoint,
            channel,
            reply,
        })
        .await
    }

    pub async fn send_position(
        &self,
        latitude: f64,
        longitude: f64,
        altitude: Option<i32>,
    ) -> Result<u32, SessionError> {
        self.request(|reply| SessionCommand::SendPosition {
            latitude,
            longitude,
            altitude,
            reply,
        })
        .await
    }

    pub async fn send_admin(
        &self,
        operation: AdminOperation,
        target: Option<u32>,
    ) -> Result<u32, SessionError> {
        self.request(|reply| SessionCommand::SendAdmin {
            operation,
            target,
            reply,
        })
        .await
    }

    pub async fn import_channel_url(&self, url: impl Into<String>) -> Result<Vec<u32>, SessionError> {
        let url = url.into();
        self.request(|reply| SessionCommand::ImportChannelUrl { url, reply })
            .await
    }

    pub async fn import_contact_url(&self, url: impl Into<String>) -> Result<u32, SessionError> {
        let url = url.into();
        self.request(|reply| SessionCommand::ImportContactUrl { url, reply })
            .await
    }

    pub async fn request_trace_route(&self, dest: u32, channel: u32) -> Result<u32, SessionError> {
        self.request(|reply| SessionCommand::RequestTraceRoute {
            dest,
            channel,
            reply,
        })
        .await
    }

    pub async fn send_mqtt_proxy(&self, message: MqttClientProxyMessage) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::SendMqttProxy { message, reply })
            .await
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
    }

    /// Watch connection status; the receiver yields after every change.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }
}
