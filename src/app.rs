//! Application runner.
//!
//! [`initialize`] performs the one-time start-up sequence; [`Collector`]
//! wires the result into the scheduler and the sink and runs until
//! shutdown.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::auth::{Session, TanConfirmation, TokenManager};
use crate::collector::{AccountPoller, DepotPoller, QuotePoller, QuoteSource};
use crate::config::Settings;
use crate::context::AppContext;
use crate::scheduler::{exclusive, Scheduler};
use crate::sink::SinkWorker;
use crate::Result;

/// Capacity of the point channel between pollers and the sink.
pub const POINT_BUFFER: usize = 1024;

/// Connect, run the session handshake and exchange for the session-scoped
/// token.
///
/// Every error returned here is fatal; a new attempt needs a new TAN.
pub async fn initialize(
    tokens: &TokenManager,
    confirmation: &TanConfirmation,
    tan_timeout: Duration,
) -> Result<AppContext> {
    let client = tokens.connect().await?;

    let session = Session::new();
    session.init(&client, confirmation, tan_timeout).await?;

    let client = tokens.secondary_exchange(&client).await?;
    Ok(AppContext::new(client, session))
}

/// Token refresh job: runs alone and under the write side of the
/// context's refresh guard, so no poll cycle overlaps it.
pub fn refresh_task(
    tokens: Arc<TokenManager>,
    ctx: AppContext,
) -> impl Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static {
    exclusive(move || {
        let tokens = tokens.clone();
        let ctx = ctx.clone();
        async move {
            let _guard = ctx.refresh_guard().refresh().await;
            tokens.refresh(ctx.client()).await?;
            Ok(())
        }
    })
}

/// The long-running collector process.
#[derive(Debug)]
pub struct Collector {
    settings: Settings,
}

impl Collector {
    /// Create a collector from validated settings.
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Returns early with an error if start-up fails. Cancelling during
    /// start-up returns `Ok` without starting any task.
    pub async fn run(self, confirmation: TanConfirmation, shutdown: CancellationToken) -> Result<()> {
        let schedule = &self.settings.schedule;
        let tokens = Arc::new(TokenManager::new(
            self.settings.client_config()?,
            self.settings.client_credentials(),
            self.settings.credentials(),
        )?);

        info!(tan_timeout_secs = schedule.tan_timeout, "waiting for session activation");
        let ctx = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("shutdown requested during start-up");
                return Ok(());
            }
            ctx = initialize(&tokens, &confirmation, schedule.tan_timeout()) => ctx?,
        };
        if let Some(session_id) = ctx.session().session_id().await {
            info!(session_id = %session_id, "session activated");
        }

        let (points, worker) = SinkWorker::channel(POINT_BUFFER, self.settings.point_writer()?);
        let depot = DepotPoller::discover(ctx.clone(), points.clone()).await?;
        let quotes = match self.settings.quotes.as_ref().filter(|q| !q.targets.is_empty()) {
            Some(quotes) => {
                let source = QuoteSource::new(
                    quotes.url.clone(),
                    quotes.api_key.clone(),
                    Duration::from_secs(self.settings.http.timeout),
                )?;
                Some((quotes, Arc::new(source)))
            }
            None => None,
        };

        let sink_shutdown = CancellationToken::new();
        let sink = tokio::spawn(worker.run(sink_shutdown.clone()));

        let mut scheduler = Scheduler::with_token(shutdown.child_token());

        scheduler.schedule_fixed_rate(
            "token-refresh",
            schedule.refresh_rate(),
            schedule.refresh_initial_delay(),
            refresh_task(tokens.clone(), ctx.clone()),
        );

        let accounts = AccountPoller::new(ctx.clone(), points.clone());
        scheduler.schedule_fixed_delay(
            "account-poll",
            schedule.account_period(),
            schedule.account_initial_delay(),
            move || {
                let poller = accounts.clone();
                async move { poller.poll().await.map(|_| ()) }
            },
        );

        if let Some(depot) = depot {
            scheduler.schedule_fixed_delay(
                "depot-poll",
                schedule.depot_period(),
                schedule.depot_initial_delay(),
                move || {
                    let poller = depot.clone();
                    async move { poller.poll().await.map(|_| ()) }
                },
            );
        }

        if let Some((quotes, source)) = quotes {
            let poller = QuotePoller::new(source, quotes.targets.clone(), points.clone());
            scheduler.schedule_fixed_delay(
                "quote-poll",
                quotes.period(),
                quotes.initial_delay(),
                move || {
                    let poller = poller.clone();
                    async move { poller.poll().await.map(|_| ()) }
                },
            );
        }
        // the scheduled closures hold the remaining senders
        drop(points);

        info!(schedules = scheduler.len(), "collector running");
        shutdown.cancelled().await;

        let grace = schedule.shutdown_grace();
        info!(grace_secs = grace.as_secs(), "stopping schedules");
        if !scheduler.shutdown(grace).await {
            warn!("some tasks did not finish within the grace period");
        }

        sink_shutdown.cancel();
        match tokio::time::timeout(grace, sink).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(error = %err, "sink worker failed"),
            Err(_) => warn!("sink did not flush within the grace period"),
        }
        info!("collector stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ClientCredentials, Credentials, SessionState};
    use crate::test_support::config_for;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_body(access: &str) -> serde_json::Value {
        serde_json::json!({
            "access_token": access,
            "token_type": "bearer",
            "refresh_token": "refresh",
            "expires_in": 599
        })
    }

    async fn refresh_requests(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| String::from_utf8_lossy(&r.body).contains("grant_type=refresh_token"))
            .count()
    }

    #[tokio::test]
    async fn test_refresh_waits_for_running_poll() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("first")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("second")))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = Arc::new(
            TokenManager::new(
                config_for(&server),
                ClientCredentials::new("id", "secret"),
                Credentials::new("user", "pin"),
            )
            .unwrap(),
        );
        let client = tokens.connect().await.unwrap();
        let ctx = AppContext::new(client, Session::with_state("S1", SessionState::Activated));
        let generation = tokens.store().generation().await;

        let poll = ctx.refresh_guard().poll().await;
        let refresh = tokio::spawn(refresh_task(tokens.clone(), ctx.clone())());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!refresh.is_finished());
        assert_eq!(refresh_requests(&server).await, 0);
        assert_eq!(tokens.store().generation().await, generation);

        drop(poll);
        refresh.await.unwrap().unwrap();
        assert_eq!(refresh_requests(&server).await, 1);
        assert!(tokens.store().generation().await > generation);
    }
}
