//! Client facade.
//!
//! [`RealtimeClient`] is the public entry point. It validates requests,
//! captures authorization at subscribe time and forwards everything to the
//! connection actor; it never touches connection state directly.

use crate::actor::Actor;
use crate::config::ClientConfig;
use crate::connection::{ConnectionState, ConnectionStatus, Input, Machine};
use crate::error::{RealtimeError, RealtimeResult};
use crate::message::{StartPayload, SubscriptionRequest};
use crate::subscription::{EventSink, SubscriptionEvent, SubscriptionHandle};
use rtsub_core::{AuthPayload, CredentialsProvider, Endpoint};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument, Span};

/// Real-time subscription client.
///
/// Many subscriptions share one multiplexed connection, which is reopened and
/// re-subscribed transparently after failures. Dropping the client stops the
/// connection actor.
pub struct RealtimeClient {
    commands: mpsc::Sender<Input>,
    status: watch::Receiver<ConnectionStatus>,
    endpoint: Endpoint,
    credentials: Arc<dyn CredentialsProvider>,
    sink_capacity: usize,
    shutdown: CancellationToken,
}

impl RealtimeClient {
    /// Create the client and start connecting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> RealtimeResult<Self> {
        Self::with_span(config, credentials, tracing::info_span!("rtsub"))
    }

    /// Like [`RealtimeClient::new`], with the connection actor instrumented by `span`.
    pub fn with_span(
        config: ClientConfig,
        credentials: Arc<dyn CredentialsProvider>,
        span: Span,
    ) -> RealtimeResult<Self> {
        let machine = Machine::new(config.clone(), Arc::clone(&credentials))?;
        let endpoint = machine.endpoint().clone();

        let (commands, inputs) = mpsc::channel(config.command_buffer);
        let (status_tx, status) = watch::channel(machine.status());
        let shutdown = CancellationToken::new();

        commands
            .try_send(Input::Open)
            .map_err(|_| RealtimeError::ConnectionClosed)?;

        let actor = Actor::new(machine, inputs, commands.clone(), status_tx, shutdown.clone());
        tokio::spawn(actor.run().instrument(span));

        info!(endpoint = %endpoint, "Real-time client created");

        Ok(Self {
            commands,
            status,
            endpoint,
            credentials,
            sink_capacity: config.sink_capacity,
            shutdown,
        })
    }

    /// Open a subscription whose events are delivered to `sink`.
    ///
    /// Authorization is captured now and reused for every replay of this
    /// subscription. Up to `sink_capacity` events are held for a subscriber
    /// that falls behind; past that the subscription ends with
    /// [`SubscriptionError::Overflow`](crate::SubscriptionError::Overflow).
    pub async fn subscribe(
        &self,
        request: SubscriptionRequest,
        sink: mpsc::Sender<SubscriptionEvent>,
    ) -> RealtimeResult<SubscriptionHandle> {
        if request.query.trim().is_empty() {
            return Err(RealtimeError::InvalidArgument(
                "query must not be empty".to_string(),
            ));
        }
        if sink.is_closed() {
            return Err(RealtimeError::InvalidArgument(
                "event sink is closed".to_string(),
            ));
        }

        let material = self.credentials.current()?;
        let auth = AuthPayload::from_material(self.endpoint.host(), &material);
        let payload = StartPayload::new(&request, &auth)?;

        let (reply, response) = oneshot::channel();
        self.send(Input::Subscribe {
            payload,
            sink: EventSink::relay_to(sink, self.sink_capacity),
            reply,
        })
        .await?;

        let key = response
            .await
            .map_err(|_| RealtimeError::ConnectionClosed)??;
        debug!(%key, "Subscribed");
        Ok(SubscriptionHandle::new(key))
    }

    /// Open a subscription with a bounded channel of `sink_capacity` events.
    pub async fn subscribe_channel(
        &self,
        request: SubscriptionRequest,
    ) -> RealtimeResult<(SubscriptionHandle, mpsc::Receiver<SubscriptionEvent>)> {
        let (tx, rx) = mpsc::channel(self.sink_capacity);
        let handle = self.subscribe(request, tx).await?;
        Ok((handle, rx))
    }

    /// Stop a subscription and wait until the server confirms it (bounded by
    /// the stop timeout). Unknown handles succeed immediately.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> RealtimeResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Input::Unsubscribe {
            key: handle.key(),
            reply,
        })
        .await?;
        response.await.map_err(|_| RealtimeError::ConnectionClosed)?
    }

    /// Connection status stream.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Fetch fresh credentials and reconnect immediately if the connection was
    /// parked by an authorization failure or is waiting to retry.
    pub async fn refresh_credentials(&self) -> RealtimeResult<()> {
        self.credentials.fetch().await?;
        self.send(Input::Reopen).await
    }

    /// Close the connection. Every subscription receives one terminal error.
    pub async fn close(&self) -> RealtimeResult<()> {
        let (reply, done) = oneshot::channel();
        if self
            .commands
            .send(Input::Close { reply: Some(reply) })
            .await
            .is_ok()
        {
            let _ = done.await;
        }
        self.shutdown.cancel();

        let mut status = self.status.clone();
        let _ = status
            .wait_for(|status| status.state == ConnectionState::Closed)
            .await;
        Ok(())
    }

    async fn send(&self, input: Input) -> RealtimeResult<()> {
        self.commands
            .send(input)
            .await
            .map_err(|_| RealtimeError::ConnectionClosed)
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}
