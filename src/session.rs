//! User session: one authenticated connection at a time.
//!
//! The session owns the authentication state machine
//! (`NotAuthenticated -> Authenticating -> Authenticated`) and mirrors the
//! library connection state of the current connection. A lost connection drops
//! the state back to `NotAuthenticated`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{ConnectionSession, Crypto, PlatformCredentials};
use crate::native::Backend;
use crate::observable::{ObservableValue, Subscription};
use crate::runtime::{CancelSignal, WorkerContext};
use crate::types::{Config, Error, Result, SolutionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotAuthenticated,
    Authenticating,
    Authenticated,
}

struct Current {
    api: Arc<ConnectionSession>,
    solution_id: SolutionId,
    public_key: Option<String>,
    _connection_events: Subscription,
}

pub struct Session {
    backend: Arc<dyn Backend>,
    worker: WorkerContext,
    config: Config,
    crypto: Crypto,
    state: Arc<ObservableValue<SessionState>>,
    connected: Arc<ObservableValue<bool>>,
    current: Mutex<Option<Current>>,
    lifetime: CancelSignal,
    closed: AtomicBool,
}

/// Returns the session to `NotAuthenticated` when dropped armed, including
/// when the establishing future itself is dropped.
struct PendingAuthentication<'a> {
    session: &'a Session,
    armed: bool,
}

impl PendingAuthentication<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingAuthentication<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.session.reset();
        }
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(format!("{} cannot be empty", name)));
    }
    Ok(())
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, worker: WorkerContext, config: Config) -> Self {
        let crypto = Crypto::new(backend.crypto(), worker.clone());
        Self {
            backend,
            worker,
            config,
            crypto,
            state: Arc::new(ObservableValue::new(SessionState::NotAuthenticated)),
            connected: Arc::new(ObservableValue::new(false)),
            current: Mutex::new(None),
            lifetime: CancelSignal::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &ObservableValue<SessionState> {
        &self.state
    }

    /// Library connection state of the current connection.
    pub fn connected(&self) -> &ObservableValue<bool> {
        &self.connected
    }

    pub fn crypto(&self) -> &Crypto {
        &self.crypto
    }

    pub fn solution_id(&self) -> Option<SolutionId> {
        self.current.lock().as_ref().map(|c| c.solution_id.clone())
    }

    /// Public key of the authorized user; `None` for guest connections.
    pub fn public_key(&self) -> Option<String> {
        self.current.lock().as_ref().and_then(|c| c.public_key.clone())
    }

    /// The current connection, valid until the next authorize or disconnect.
    pub fn api(&self) -> Result<Arc<ConnectionSession>> {
        self.current
            .lock()
            .as_ref()
            .map(|c| c.api.clone())
            .ok_or(Error::NotAuthenticated)
    }

    /// Authenticate as a user of `solution_id`, replacing any current connection.
    pub async fn authorize(
        &self,
        platform_url: &str,
        solution_id: &str,
        private_key: &str,
        cancel: Option<&CancelSignal>,
    ) -> Result<()> {
        require("platform_url", platform_url)?;
        require("solution_id", solution_id)?;
        require("private_key", private_key)?;
        let credentials =
            PlatformCredentials::new(platform_url, SolutionId::from(solution_id), private_key);
        self.establish("session.authorize", Some(credentials), platform_url, solution_id, cancel)
            .await
    }

    /// Connect as a guest of `solution_id`, replacing any current connection.
    pub async fn connect_anonymously(
        &self,
        platform_url: &str,
        solution_id: &str,
        cancel: Option<&CancelSignal>,
    ) -> Result<()> {
        require("platform_url", platform_url)?;
        require("solution_id", solution_id)?;
        self.establish("session.connect", None, platform_url, solution_id, cancel)
            .await
    }

    async fn establish(
        &self,
        operation: &str,
        credentials: Option<PlatformCredentials>,
        platform_url: &str,
        solution_id: &str,
        cancel: Option<&CancelSignal>,
    ) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Disposed("session"));
        }
        if cancel.is_some_and(CancelSignal::is_fired) {
            return Err(Error::cancelled(operation));
        }
        let certs_path = self.config.paths.ensure_trust_anchor()?.to_path_buf();
        self.begin_authentication()?;
        let pending = PendingAuthentication {
            session: self,
            armed: true,
        };

        let linked = CancelSignal::link_if_needed(cancel, Some(&self.lifetime));
        let result = match self
            .connect(operation, credentials, platform_url, solution_id, certs_path, linked.as_ref())
            .await
        {
            Ok((api, public_key)) => self.install(api, SolutionId::from(solution_id), public_key),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                pending.disarm();
                tracing::info!("session_authenticated: solution_id={}", solution_id);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("session_authentication_failed: solution_id={}, error={}", solution_id, e);
                drop(pending);
                Err(e)
            }
        }
    }

    fn begin_authentication(&self) -> Result<()> {
        self.state.observable().serialized(|| {
            if self.state.get() == SessionState::Authenticating {
                return Err(Error::state_transition("another authentication is in progress"));
            }
            self.set_state(SessionState::Authenticating);
            Ok(())
        })
    }

    async fn connect(
        &self,
        operation: &str,
        credentials: Option<PlatformCredentials>,
        platform_url: &str,
        solution_id: &str,
        certs_path: std::path::PathBuf,
        cancel: Option<&CancelSignal>,
    ) -> Result<(ConnectionSession, Option<String>)> {
        self.close_current().await;
        if self.lifetime.is_fired() {
            return Err(Error::cancelled(operation));
        }

        let backend = self.backend.clone();
        self.worker
            .run_blocking("session.set_certs_path", move || backend.set_certs_path(&certs_path), cancel)
            .await?;

        let dispatcher_config = self.config.dispatcher.clone();
        let (api, public_key) = match credentials {
            Some(credentials) => {
                let public_key = self
                    .crypto
                    .derive_public_key(&credentials.private_key, cancel)
                    .await?;
                let api = ConnectionSession::connect(
                    self.backend.clone(),
                    self.worker.clone(),
                    dispatcher_config,
                    &credentials,
                    cancel,
                )
                .await?;
                (api, Some(public_key))
            }
            None => {
                let api = ConnectionSession::connect_public(
                    self.backend.clone(),
                    self.worker.clone(),
                    dispatcher_config,
                    platform_url,
                    &SolutionId::from(solution_id),
                    cancel,
                )
                .await?;
                (api, None)
            }
        };

        // A connection that completed after the session closed is not kept.
        if self.lifetime.is_fired() {
            if let Err(e) = api.close().await {
                tracing::warn!("session_connection_close_failed: {}", e);
            }
            return Err(Error::cancelled(operation));
        }
        Ok((api, public_key))
    }

    fn install(&self, api: ConnectionSession, solution_id: SolutionId, public_key: Option<String>) -> Result<()> {
        let state = self.state.clone();
        let connected = self.connected.clone();
        let connection_events = api.events().connected().subscribe_fn(move |up: &bool| {
            if let Err(e) = connected.set(*up) {
                tracing::warn!("session_connected_observers_failed: {}", e);
            }
            if !*up {
                tracing::info!("session_connection_lost");
                if let Err(e) = state.set(SessionState::NotAuthenticated) {
                    tracing::warn!("session_state_observers_failed: {}", e);
                }
            }
        })?;
        // Events routed before the subscription existed are not replayed.
        if let Err(e) = self.connected.set(api.events().connected().get()) {
            tracing::warn!("session_connected_observers_failed: {}", e);
        }

        *self.current.lock() = Some(Current {
            api: Arc::new(api),
            solution_id,
            public_key,
            _connection_events: connection_events,
        });
        self.set_state(SessionState::Authenticated);
        Ok(())
    }

    fn reset(&self) {
        self.current.lock().take();
        self.set_state(SessionState::NotAuthenticated);
    }

    fn set_state(&self, state: SessionState) {
        if let Err(e) = self.state.set(state) {
            tracing::warn!("session_state_observers_failed: {}", e);
        }
    }

    async fn close_current(&self) {
        let previous = self.current.lock().take();
        if let Some(previous) = previous {
            if let Err(e) = previous.api.close().await {
                tracing::warn!("session_connection_close_failed: error={}", e);
            }
            if let Err(e) = self.connected.set(false) {
                tracing::warn!("session_connected_observers_failed: {}", e);
            }
        }
    }

    /// Close the current connection and return to `NotAuthenticated`.
    pub async fn disconnect(&self) {
        self.close_current().await;
        self.set_state(SessionState::NotAuthenticated);
        tracing::info!("session_disconnected");
    }

    /// Cancel in-flight authentication, disconnect and dispose the state values.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.lifetime.fire();
        self.disconnect().await;
        for result in [self.state.dispose(), self.connected.dispose()] {
            if let Err(e) = result {
                tracing::warn!("session_dispose_failed: {}", e);
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.lifetime.fire();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state.get())
            .field("connected", &self.connected.get())
            .field("solution_id", &self.solution_id())
            .finish()
    }
}
