//! Login and destroy.
//!
//! # Responsibilities
//! - Sequence resolve → connect → ready for one login
//! - Roll every side effect back when the bootstrap fails
//! - Tear down completely on destroy, even while a login is in flight
//!
//! # Design Decisions
//! - A login holds the bootstrap guard until it returns; destroy bumps the
//!   epoch first, then takes the guard, so its teardown always runs after the
//!   overtaken login has dropped its pending step
//! - An overtaken login never tears down itself

use std::sync::Arc;
use std::time::SystemTime;

use crate::client::{Client, ClientInner, GatewaySignals, Phase, GATEWAY_VERSION};
use crate::error::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::observability::metrics;
use crate::transport::{GatewaySession, TransportError};

impl Client {
    /// Log in and bring the persistent connection up.
    ///
    /// Reuses the cached gateway address unless `force` is set. When this
    /// returns an error no timer, connection or request state from the
    /// attempt is left behind and the client is idle again.
    pub async fn login(&self, token: &str, force: bool) -> ClientResult<()> {
        let token = token.trim();
        if token.is_empty() {
            metrics::record_login("rejected");
            return Err(ClientError::EmptyToken);
        }

        let (epoch, mut destroyed) = {
            let mut state = self.inner.state();
            if state.phase != Phase::Idle {
                metrics::record_login("rejected");
                tracing::warn!(state = %state.phase, "Login rejected, client is busy");
                return Err(ClientError::LoginInProgress { state: state.phase });
            }
            state.phase = Phase::Resolving;
            state.token = Some(token.to_string());
            (*self.inner.epoch.borrow(), self.inner.epoch.subscribe())
        };
        let _bootstrap = self.inner.bootstrap.lock().await;
        if *self.inner.epoch.borrow() != epoch {
            return Err(self.abandon());
        }

        tracing::info!(force, "Logging in");
        self.inner.requests.authorize(token);

        let resolved = tokio::select! {
            biased;
            _ = destroyed.changed() => None,
            result = self.inner.resolver.resolve(self.inner.requests.as_ref(), force) => Some(result),
        };
        let address = match resolved {
            Some(Ok(address)) => address,
            Some(Err(e)) => return Err(self.fail_bootstrap(epoch, e).await),
            None => return Err(self.abandon()),
        };

        if !self.inner.advance(epoch, Phase::Connecting) {
            return Err(self.abandon());
        }

        let session = GatewaySession {
            token: token.to_string(),
            options: Arc::clone(&self.inner.options),
            signals: GatewaySignals::new(&self.inner),
            scheduler: self.inner.timers.scheduler().clone(),
        };

        tracing::info!(address = %address, version = GATEWAY_VERSION, "Connecting to gateway");
        let connected = tokio::select! {
            biased;
            _ = destroyed.changed() => None,
            result = self.inner.connection.connect(&address, GATEWAY_VERSION, session) => Some(result),
        };
        match connected {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(self.fail_bootstrap(epoch, e).await),
            None => return Err(self.abandon()),
        }

        if !self.inner.advance(epoch, Phase::Ready) {
            return Err(self.abandon());
        }

        metrics::record_login("ready");
        tracing::info!(state = %Phase::Ready, "Client ready");
        self.inner.events.emit(ClientEvent::Ready);
        Ok(())
    }

    /// Tear everything down and return to idle.
    ///
    /// Never fails; teardown errors are logged. Background tasks are only
    /// stopped when `stop_background` is set. Safe to call repeatedly and
    /// while a login is in flight.
    pub async fn destroy(&self, stop_background: bool) {
        let epoch = {
            let mut state = self.inner.state();
            self.inner.epoch.send_modify(|epoch| *epoch += 1);
            tracing::info!(state = %state.phase, stop_background, "Destroying client");
            state.phase = Phase::Destroying;
            *self.inner.epoch.borrow()
        };

        // An overtaken login drops its pending step and releases this.
        let _bootstrap = self.inner.bootstrap.lock().await;
        self.inner.teardown(stop_background).await;

        {
            let mut state = self.inner.state();
            if *self.inner.epoch.borrow() == epoch {
                state.reset();
            }
        }

        metrics::record_destroy();
        tracing::info!("Client destroyed");
    }

    /// Roll back a failed bootstrap and hand back the root cause.
    ///
    /// When a destroy has overtaken the login, the rollback is left to that
    /// destroy, which is waiting on the bootstrap guard.
    async fn fail_bootstrap(&self, epoch: u64, error: TransportError) -> ClientError {
        metrics::record_login("failed");

        if *self.inner.epoch.borrow() != epoch {
            tracing::warn!(error = %error, "Bootstrap failed after destroy, leaving teardown to it");
            return ClientError::Bootstrap(error);
        }

        tracing::warn!(error = %error, "Bootstrap failed, rolling back");
        self.inner.teardown(true).await;

        {
            let mut state = self.inner.state();
            if *self.inner.epoch.borrow() == epoch {
                state.reset();
            }
        }

        ClientError::Bootstrap(error)
    }

    /// Give up a login overtaken by destroy; the destroy owns the teardown.
    fn abandon(&self) -> ClientError {
        tracing::warn!("Login overtaken by destroy, abandoning bootstrap");
        metrics::record_login("failed");
        ClientError::Destroyed
    }
}

impl ClientInner {
    /// Move to `phase` unless a destroy happened since `epoch`.
    fn advance(&self, epoch: u64, phase: Phase) -> bool {
        let mut state = self.state();
        if *self.epoch.borrow() != epoch {
            return false;
        }
        state.phase = phase;
        if phase == Phase::Ready {
            state.ready_at = Some(SystemTime::now());
        }
        tracing::debug!(state = %phase, "Client state changed");
        true
    }

    /// Release collaborators, timers and optionally background tasks, in that order.
    async fn teardown(&self, stop_background: bool) {
        if let Err(e) = self.requests.destroy().await {
            tracing::warn!(error = %e, "Request channel teardown failed");
        }
        if let Err(e) = self.connection.destroy().await {
            tracing::warn!(error = %e, "Connection teardown failed");
        }

        let cancelled = self.timers.cancel_all();
        let stopped = if stop_background {
            self.background.shutdown_all()
        } else {
            0
        };

        tracing::debug!(cancelled, stopped, "Teardown complete");
    }
}
