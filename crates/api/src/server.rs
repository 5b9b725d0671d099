use anyhow::Context;
use axum::{
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use taodiv_chain::{DividendAggregator, MemoryChain, RpcGateway, StakeOperator, StorageReader};
use taodiv_core::{Hotkey, HotkeyDividend, Netuid, NetuidDividend, NetuidGroup};
use taodiv_sentiment::{ChutesClient, DaturaClient, RetryPolicy, SentimentPipeline};
use taodiv_staker::{
    AnalyzeAndStake, Ledger, QueueError, StakeAdjuster, StakeQueue, StakeSettings, WorkItem,
    WorkerPool,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    cache::{CacheBackend, RedisCache},
    config::{Config, MEMORY_CHAIN_URL},
    resolver::{DividendResolver, ResolveError},
};

/// Length of an SS58 hotkey string.
const HOTKEY_LEN: usize = 48;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    resolver: DividendResolver,
    queue: Option<StakeQueue>,
    auth_token: Arc<str>,
}

impl AppState {
    /// State for [`router`]. Without a queue, `trade=true` requests are refused.
    pub fn new(
        resolver: DividendResolver,
        queue: Option<StakeQueue>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            queue,
            auth_token: Arc::from(auth_token.into()),
        }
    }
}

/// HTTP routes. `/health` is open; everything under `/api` requires the token.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/v1/tao_dividends", get(get_tao_dividends))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A built service: routes plus the resources to release on shutdown.
pub struct App {
    /// Request router.
    pub router: Router,
    /// Stake workers, when trading is enabled.
    pub workers: Option<WorkerPool>,
    /// Ledger database.
    pub ledger: Ledger,
}

impl App {
    /// Drain the stake workers, then close the ledger.
    pub async fn shutdown(self) {
        if let Some(workers) = self.workers {
            workers.shutdown().await;
        }
        self.ledger.close().await;
    }
}

/// Wire every component from `config`.
pub async fn build_app(config: &Config) -> anyhow::Result<App> {
    let coldkey = config.coldkey()?;

    let (reader, operator): (Arc<dyn StorageReader>, Arc<dyn StakeOperator>) =
        if config.chain.rpc_url == MEMORY_CHAIN_URL {
            warn!("Using an empty in-process chain");
            let chain = Arc::new(MemoryChain::new());
            chain.set_wallet(&coldkey);
            (chain.clone(), chain)
        } else {
            let gateway = Arc::new(RpcGateway::new(
                &config.chain.rpc_url,
                Duration::from_secs(config.chain.timeout_secs),
            )?);
            (gateway.clone(), gateway)
        };

    let cache = connect_cache(config).await;
    let resolver = DividendResolver::new(
        cache,
        DividendAggregator::new(reader),
        config.cache_ttl(),
    );

    let ledger = connect_ledger(config).await?;

    let workers = if config.staker.enabled {
        let sentiment = &config.sentiment;
        let source = DaturaClient::new(
            &sentiment.tweet_url,
            &sentiment.tweet_api_key,
            sentiment.tweet_count,
            Duration::from_secs(sentiment.tweet_timeout_secs),
        )?;
        let scorer = ChutesClient::new(
            &sentiment.scoring_url,
            &sentiment.scoring_api_key,
            &sentiment.model,
            Duration::from_secs(sentiment.scoring_timeout_secs),
        )?;
        let pipeline = SentimentPipeline::new(
            Arc::new(source),
            Arc::new(scorer),
            RetryPolicy::new(sentiment.max_attempts, Duration::from_secs(sentiment.wait_secs)),
        );
        let adjuster = StakeAdjuster::new(
            operator,
            Arc::new(ledger.clone()),
            coldkey,
            StakeSettings {
                tao_per_point: config.staker.tao_per_point,
                registration_attempts: config.staker.registration_attempts,
                registration_delay: Duration::from_secs(config.staker.registration_delay_secs),
            },
        );
        Some(WorkerPool::start(
            Arc::new(AnalyzeAndStake::new(pipeline, adjuster)),
            config.staker.workers,
            config.staker.queue_capacity,
        ))
    } else {
        info!("Stake trading disabled");
        None
    };

    let (queue, workers) = match workers {
        Some((queue, pool)) => (Some(queue), Some(pool)),
        None => (None, None),
    };

    Ok(App {
        router: router(AppState::new(resolver, queue, &config.server.auth_token)),
        workers,
        ledger,
    })
}

/// A cache that cannot be reached at startup is skipped, not fatal.
async fn connect_cache(config: &Config) -> Option<Arc<dyn CacheBackend>> {
    let url = config.cache.redis_url.as_deref()?;
    match RedisCache::connect(url).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!("Cache unavailable, serving without it: {}", e);
            None
        }
    }
}

/// Open the ledger and apply migrations, retrying per the chain retry settings.
pub async fn connect_ledger(config: &Config) -> anyhow::Result<Ledger> {
    let attempts = config.chain.max_retries.max(1);
    let delay = Duration::from_secs(config.chain.retry_timeout_secs);
    let mut attempt = 1;

    loop {
        let result = async {
            let ledger = Ledger::connect(
                &config.database.url,
                config.database.max_connections,
                config.database.min_connections,
            )
            .await?;
            ledger.run_migrations().await?;
            anyhow::Ok(ledger)
        }
        .await;

        match result {
            Ok(ledger) => return Ok(ledger),
            Err(e) if attempt < attempts => {
                warn!(attempt, attempts, "Ledger initialization failed: {:#}", e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Ledger initialization failed after {} attempts", attempts)
                })
            }
        }
    }
}

/// Serve until Ctrl+C or SIGTERM, then drain workers and close the ledger.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let app = build_app(&config).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("TAO dividend API listening on {}", addr);

    let router = app.router.clone();
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    app.shutdown().await;
    served?;
    info!("TAO dividend API shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

const ERROR_CODE_INVALID_REQUEST: &str = "invalid_request";
const ERROR_CODE_UNAUTHORIZED: &str = "unauthorized";
const ERROR_CODE_MISSING_TOKEN: &str = "missing_token";
const ERROR_CODE_DIVIDEND_UNAVAILABLE: &str = "dividend_unavailable";
const ERROR_CODE_QUEUE_UNAVAILABLE: &str = "queue_unavailable";

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: ErrorInfo {
                code,
                message: message.into(),
            },
        }),
    )
}

fn bad_request(msg: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, ERROR_CODE_INVALID_REQUEST, msg)
}

fn unprocessable(msg: impl Into<String>) -> ApiError {
    api_error(StatusCode::UNPROCESSABLE_ENTITY, ERROR_CODE_INVALID_REQUEST, msg)
}

fn queue_unavailable(msg: impl Into<String>) -> ApiError {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        ERROR_CODE_QUEUE_UNAVAILABLE,
        msg,
    )
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(header) = request.headers().get(AUTHORIZATION) else {
        return api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            ERROR_CODE_MISSING_TOKEN,
            "Authorization header is required",
        )
        .into_response();
    };

    // Exact match: no scheme prefix is stripped.
    if header.as_bytes() != state.auth_token.as_bytes() {
        return api_error(StatusCode::UNAUTHORIZED, ERROR_CODE_UNAUTHORIZED, "Invalid token")
            .into_response();
    }

    next.run(request).await
}

#[derive(Debug, Deserialize)]
struct DividendQuery {
    netuid: Option<String>,
    hotkey: Option<String>,
    trade: Option<String>,
}

fn parse_netuid(raw: &str) -> Result<Netuid, ApiError> {
    raw.trim()
        .parse::<Netuid>()
        .map_err(|_| bad_request(format!("netuid must be a non-negative integer, got '{}'", raw)))
}

fn parse_hotkey(raw: &str) -> Result<Hotkey, ApiError> {
    if raw.chars().count() != HOTKEY_LEN {
        return Err(unprocessable(format!(
            "hotkey must be exactly {} characters",
            HOTKEY_LEN
        )));
    }
    Hotkey::parse(raw).map_err(|e| unprocessable(format!("Invalid hotkey: {}", e)))
}

fn parse_trade(raw: &str) -> Result<bool, ApiError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        _ => Err(unprocessable(format!("trade must be a boolean, got '{}'", raw))),
    }
}

#[derive(Serialize)]
struct AllResponse {
    results: Vec<NetuidGroup>,
    cached: bool,
}

#[derive(Serialize)]
struct NetuidResponse {
    netuid: Netuid,
    hotkeys: Vec<HotkeyDividend>,
    cached: bool,
}

#[derive(Serialize)]
struct HotkeyResponse {
    hotkey: Hotkey,
    netuids: Vec<NetuidDividend>,
    cached: bool,
}

#[derive(Serialize)]
struct PairResponse {
    netuid: Netuid,
    hotkey: Hotkey,
    dividend: f64,
    cached: bool,
    stake_tx_triggered: bool,
}

async fn get_tao_dividends(
    State(state): State<AppState>,
    query: Result<Query<DividendQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    let netuid = query.netuid.as_deref().map(parse_netuid).transpose()?;
    let hotkey = query.hotkey.as_deref().map(parse_hotkey).transpose()?;
    let trade = query
        .trade
        .as_deref()
        .map(parse_trade)
        .transpose()?
        .unwrap_or(false);

    let response = match (netuid, hotkey) {
        (Some(netuid), Some(hotkey)) => {
            let stake_tx_triggered = trade;
            if trade {
                dispatch_trade(&state, netuid, &hotkey)?;
            }

            let resolved = state
                .resolver
                .resolve_pair(netuid, &hotkey)
                .await
                .map_err(|e| match e {
                    ResolveError::DividendUnavailable => api_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ERROR_CODE_DIVIDEND_UNAVAILABLE,
                        e.to_string(),
                    ),
                })?;

            Json(PairResponse {
                netuid,
                hotkey,
                dividend: resolved.value,
                cached: resolved.cached,
                stake_tx_triggered,
            })
            .into_response()
        }
        (Some(netuid), None) => {
            let resolved = state.resolver.resolve_netuid(netuid).await;
            Json(NetuidResponse {
                netuid,
                hotkeys: resolved.value,
                cached: resolved.cached,
            })
            .into_response()
        }
        (None, Some(hotkey)) => {
            let resolved = state.resolver.resolve_hotkey_across_netuids(&hotkey).await;
            Json(HotkeyResponse {
                hotkey,
                netuids: resolved.value,
                cached: resolved.cached,
            })
            .into_response()
        }
        (None, None) => {
            let resolved = state.resolver.resolve_all().await;
            Json(AllResponse {
                results: resolved.value,
                cached: resolved.cached,
            })
            .into_response()
        }
    };

    Ok(response)
}

fn dispatch_trade(state: &AppState, netuid: Netuid, hotkey: &Hotkey) -> Result<(), ApiError> {
    let Some(queue) = state.queue.as_ref() else {
        return Err(queue_unavailable("Stake trading is disabled"));
    };

    let item = WorkItem {
        netuid,
        hotkey: hotkey.clone(),
    };
    match queue.submit(item) {
        Ok(()) => {
            info!(netuid, hotkey = %hotkey, "Queued stake adjustment");
            Ok(())
        }
        Err(e @ (QueueError::Full | QueueError::Closed)) => {
            warn!(netuid, hotkey = %hotkey, "Stake adjustment rejected: {}", e);
            Err(queue_unavailable(format!("Unable to queue stake adjustment: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use async_trait::async_trait;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use taodiv_staker::ItemProcessor;
    use tower::ServiceExt;

    const TOKEN: &str = "test-token";

    #[derive(Default)]
    struct Recorder {
        items: Mutex<Vec<WorkItem>>,
    }

    #[async_trait]
    impl ItemProcessor for Recorder {
        async fn process(&self, item: WorkItem) {
            self.items.lock().unwrap().push(item);
        }
    }

    fn key(byte: u8) -> Hotkey {
        Hotkey::from_account([byte; 32])
    }

    fn resolver(chain: &Arc<MemoryChain>) -> DividendResolver {
        DividendResolver::new(
            Some(Arc::new(MemoryCache::new())),
            DividendAggregator::new(chain.clone()),
            Duration::from_secs(120),
        )
    }

    fn setup(queue: Option<StakeQueue>) -> (Arc<MemoryChain>, Router) {
        let chain = Arc::new(MemoryChain::new());
        let app = router(AppState::new(resolver(&chain), queue, TOKEN));
        (chain, app)
    }

    async fn send(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = axum::http::Request::builder().uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, token);
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let (_chain, app) = setup(None);
        let (status, body) = send(&app, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let (chain, app) = setup(None);
        let (status, body) = send(&app, "/api/v1/tao_dividends", None).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "missing_token");
        assert_eq!(chain.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_wrong_token_checked_before_validation() {
        let (chain, app) = setup(None);

        let (status, body) = send(&app, "/api/v1/tao_dividends", Some("Bearer test-token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Invalid token");

        let (status, _) = send(&app, "/api/v1/tao_dividends?netuid=abc", Some("nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(chain.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_invalid_netuid() {
        let (_chain, app) = setup(None);

        for netuid in ["abc", "-1", "70000", "1.5"] {
            let uri = format!("/api/v1/tao_dividends?netuid={}", netuid);
            let (status, body) = send(&app, &uri, Some(TOKEN)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "netuid={}", netuid);
            assert_eq!(body["error"]["code"], "invalid_request");
        }
    }

    #[tokio::test]
    async fn test_invalid_hotkey() {
        let (chain, app) = setup(None);

        let (status, body) =
            send(&app, "/api/v1/tao_dividends?hotkey=5Grwva", Some(TOKEN)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "invalid_request");

        let mut bad_checksum = key(1).to_string();
        let last = if bad_checksum.ends_with('Z') { "Y" } else { "Z" };
        bad_checksum.replace_range(HOTKEY_LEN - 1.., last);
        let uri = format!("/api/v1/tao_dividends?hotkey={}", bad_checksum);
        let (status, _) = send(&app, &uri, Some(TOKEN)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        assert_eq!(chain.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_malformed_query_uses_error_envelope() {
        let (chain, app) = setup(None);

        let (status, body) =
            send(&app, "/api/v1/tao_dividends?netuid=1&netuid=2", Some(TOKEN)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "invalid_request");
        assert!(body["error"]["message"].is_string());
        assert_eq!(chain.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_invalid_trade_flag() {
        let (_chain, app) = setup(None);
        let uri = format!("/api/v1/tao_dividends?netuid=1&hotkey={}&trade=maybe", key(1));
        let (status, _) = send(&app, &uri, Some(TOKEN)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_pair_lookup() {
        let (chain, app) = setup(None);
        chain.insert_dividend(18, &key(1), 42.0);
        let uri = format!("/api/v1/tao_dividends?netuid=18&hotkey={}", key(1));

        let (status, body) = send(&app, &uri, Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "netuid": 18,
                "hotkey": key(1).as_str(),
                "dividend": 42.0,
                "cached": false,
                "stake_tx_triggered": false,
            })
        );

        let (_, body) = send(&app, &uri, Some(TOKEN)).await;
        assert_eq!(body["cached"], true);
    }

    #[tokio::test]
    async fn test_pair_unavailable() {
        let (_chain, app) = setup(None);
        let uri = format!("/api/v1/tao_dividends?netuid=2&hotkey={}", key(1));

        let (status, body) = send(&app, &uri, Some(TOKEN)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "dividend_unavailable");
        assert_eq!(body["error"]["message"], "Unable to fetch dividend");
    }

    #[tokio::test]
    async fn test_netuid_lookup() {
        let (chain, app) = setup(None);
        chain.insert_dividend(7, &key(1), 1.5);
        chain.insert_dividend(7, &key(2), 2.5);

        let (status, body) = send(&app, "/api/v1/tao_dividends?netuid=7", Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "netuid": 7,
                "hotkeys": [
                    {"hotkey": key(1).as_str(), "dividend": 1.5},
                    {"hotkey": key(2).as_str(), "dividend": 2.5},
                ],
                "cached": false,
            })
        );
    }

    #[tokio::test]
    async fn test_hotkey_lookup() {
        let (chain, app) = setup(None);
        chain.insert_dividend(1, &key(1), 1.0);
        chain.insert_dividend(2, &key(2), 2.0);
        chain.insert_dividend(3, &key(1), 3.0);

        let uri = format!("/api/v1/tao_dividends?hotkey={}", key(1));
        let (status, body) = send(&app, &uri, Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "hotkey": key(1).as_str(),
                "netuids": [
                    {"netuid": 1, "dividend": 1.0},
                    {"netuid": 3, "dividend": 3.0},
                ],
                "cached": false,
            })
        );
    }

    #[tokio::test]
    async fn test_all_lookup() {
        let (chain, app) = setup(None);
        chain.insert_dividend(1, &key(1), 1.0);
        chain.insert_dividend(2, &key(2), 2.0);

        let (status, body) = send(&app, "/api/v1/tao_dividends", Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "results": [
                    {"netuid": 1, "hotkeys": [{"hotkey": key(1).as_str(), "dividend": 1.0}]},
                    {"netuid": 2, "hotkeys": [{"hotkey": key(2).as_str(), "dividend": 2.0}]},
                ],
                "cached": false,
            })
        );

        let (_, body) = send(&app, "/api/v1/tao_dividends", Some(TOKEN)).await;
        assert_eq!(body["cached"], true);
    }

    #[tokio::test]
    async fn test_trade_queues_work_item() {
        let recorder = Arc::new(Recorder::default());
        let (queue, pool) = WorkerPool::start(recorder.clone(), 1, 4);
        let (chain, app) = setup(Some(queue));
        chain.insert_dividend(5, &key(3), 8.0);

        let uri = format!("/api/v1/tao_dividends?netuid=5&hotkey={}&trade=true", key(3));
        let (status, body) = send(&app, &uri, Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stake_tx_triggered"], true);
        assert_eq!(body["dividend"], 8.0);

        drop(app);
        pool.shutdown().await;
        assert_eq!(
            *recorder.items.lock().unwrap(),
            vec![WorkItem {
                netuid: 5,
                hotkey: key(3)
            }]
        );
    }

    #[tokio::test]
    async fn test_trade_dispatched_before_lookup() {
        let recorder = Arc::new(Recorder::default());
        let (queue, pool) = WorkerPool::start(recorder.clone(), 1, 4);
        let (_chain, app) = setup(Some(queue));

        let uri = format!("/api/v1/tao_dividends?netuid=5&hotkey={}&trade=1", key(3));
        let (status, _) = send(&app, &uri, Some(TOKEN)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        drop(app);
        pool.shutdown().await;
        assert_eq!(recorder.items.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_trade_ignored_without_both_filters() {
        let recorder = Arc::new(Recorder::default());
        let (queue, pool) = WorkerPool::start(recorder.clone(), 1, 4);
        let (chain, app) = setup(Some(queue));
        chain.insert_dividend(5, &key(3), 8.0);

        let (status, body) =
            send(&app, "/api/v1/tao_dividends?netuid=5&trade=true", Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("stake_tx_triggered").is_none());

        drop(app);
        pool.shutdown().await;
        assert!(recorder.items.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trade_without_queue_is_unavailable() {
        let (chain, app) = setup(None);
        chain.insert_dividend(5, &key(3), 8.0);

        let uri = format!("/api/v1/tao_dividends?netuid=5&hotkey={}&trade=true", key(3));
        let (status, body) = send(&app, &uri, Some(TOKEN)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "queue_unavailable");
        assert_eq!(chain.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_build_app_from_test_config() {
        let coldkey = key(9);
        let mut config = Config::for_test(TOKEN, &coldkey);
        config.staker.enabled = false;

        let app = build_app(&config).await.unwrap();
        let (status, _) = send(&app.router, "/health", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app.router, "/api/v1/tao_dividends", Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"results": [], "cached": false}));

        app.shutdown().await;
    }
}
