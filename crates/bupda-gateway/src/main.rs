mod caller;
mod error;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result as AnyResult;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use bupda_core::{
    AccountBalance, Arrear, BillItem, Mutation, Order, OrderStatus, PaylaterLimit, ServiceError,
    SettlementQuote,
};
use bupda_ledger::GraphqlLedger;
use bupda_paylater::{
    AccountService, ChannelQuote, CheckoutRequest, OrderService, PaylaterMonth, PaylaterService,
    PaymentChannelPresenter,
};
use bupda_platform::{
    AccountNumberResponse, ApiEnvelope, ChannelQuery, DebitRequest, HealthResponse,
    IndexDateQuery, MonthQuery, MutationQuery, OrderListQuery, PgOrderStore, PgUserStore,
    ServiceConfig, VirtualAccountResponse, connect_database,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::caller::Caller;
use crate::error::ApiError;

type ApiResult<T> = Result<Json<ApiEnvelope<T>>, ApiError>;

#[derive(Clone)]
struct AppState {
    paylater: PaylaterService,
    presenter: PaymentChannelPresenter,
    accounts: AccountService,
    orders: OrderService,
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "bupda_gateway=info,tower_http=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8080")?;
    let policy = config.policy()?;
    let pool = connect_database(&config.database_url).await?;

    let orders = Arc::new(PgOrderStore::new(pool.clone()));
    let users = Arc::new(PgUserStore::new(pool));
    let ledger = Arc::new(GraphqlLedger::new(
        &config.ledger_base_url,
        config.ledger_timeout,
    )?);

    let state = AppState {
        paylater: PaylaterService::new(
            orders.clone(),
            users.clone(),
            ledger.clone(),
            policy.clone(),
        ),
        presenter: PaymentChannelPresenter::new(
            orders.clone(),
            users.clone(),
            users.clone(),
            policy.clone(),
        ),
        accounts: AccountService::new(users, ledger),
        orders: OrderService::new(orders, policy),
    };
    let router = build_router(state, config.request_timeout);

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/payment-channels", get(list_payment_channels))
        .route("/paylater/checkout", post(paylater_checkout))
        .route("/paylater/bill", get(outstanding_bill))
        .route("/paylater/bill/pay", post(pay_paylater_bill))
        .route("/paylater/bill/settlement", get(settlement_quotes))
        .route("/paylater/debet", post(debet_per_transaksi))
        .route("/paylater/limit", get(paylater_limit))
        .route("/paylater/arrears", get(paylater_arrears))
        .route("/paylater/orders", get(paylater_orders_by_month))
        .route("/paylater/history", get(paylater_history))
        .route("/paylater/bill/payments", get(bill_payments))
        .route("/accounts/activate", post(activate_member))
        .route("/accounts/bima/number", get(account_number))
        .route("/accounts/bima/va", get(virtual_account))
        .route("/accounts/savings/balance", get(special_savings_balance))
        .route("/accounts/bima/balance", get(bima_balance))
        .route("/accounts/bima/mutations", get(bima_mutations))
        .route("/orders", get(list_orders))
        .route("/orders/{order_id}", get(get_order))
        .route("/orders/{order_id}/cancel", post(cancel_order))
        .route("/orders/{order_id}/complete", post(complete_order))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "bupda-gateway".to_string(),
    })
}

async fn list_payment_channels(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Query(query): Query<ChannelQuery>,
) -> ApiResult<Vec<ChannelQuote>> {
    let channels = state.presenter.list_channels(&ctx, query.total_bill).await?;
    Ok(Json(ApiEnvelope::ok(channels)))
}

async fn paylater_checkout(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Json(payload): Json<CheckoutRequest>,
) -> ApiResult<Order> {
    let order = state.paylater.checkout(&ctx, &payload).await?;
    Ok(Json(ApiEnvelope::ok(order)))
}

async fn outstanding_bill(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> ApiResult<Vec<BillItem>> {
    let bill = state.accounts.outstanding_bill(&ctx).await?;
    Ok(Json(ApiEnvelope::ok(bill)))
}

async fn pay_paylater_bill(State(state): State<AppState>, Caller(ctx): Caller) -> ApiResult<Order> {
    let settlement = state.paylater.pay_paylater_bill(&ctx).await?;
    Ok(Json(ApiEnvelope::ok(settlement)))
}

async fn settlement_quotes(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> ApiResult<Vec<SettlementQuote>> {
    let quotes = state.accounts.settlement_quotes(&ctx).await?;
    Ok(Json(ApiEnvelope::ok(quotes)))
}

async fn debet_per_transaksi(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Json(payload): Json<DebitRequest>,
) -> ApiResult<Order> {
    let order = state
        .paylater
        .debet_per_transaksi(&ctx, &payload.loan_id)
        .await?;
    Ok(Json(ApiEnvelope::ok(order)))
}

async fn paylater_limit(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> ApiResult<PaylaterLimit> {
    let limit = state.accounts.paylater_limit(&ctx).await?;
    Ok(Json(ApiEnvelope::ok(limit)))
}

async fn paylater_arrears(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> ApiResult<Vec<Arrear>> {
    let arrears = state.accounts.arrears(&ctx).await?;
    Ok(Json(ApiEnvelope::ok(arrears)))
}

async fn paylater_orders_by_month(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Query(query): Query<MonthQuery>,
) -> ApiResult<Vec<Order>> {
    let orders = state
        .orders
        .paylater_orders_by_month(&ctx, query.month)
        .await?;
    Ok(Json(ApiEnvelope::ok(orders)))
}

async fn paylater_history(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> ApiResult<Vec<PaylaterMonth>> {
    let history = state.orders.paylater_history(&ctx).await?;
    Ok(Json(ApiEnvelope::ok(history)))
}

async fn bill_payments(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Query(query): Query<IndexDateQuery>,
) -> ApiResult<Vec<Order>> {
    let payments = state.orders.bill_payments(&ctx, query.index_date).await?;
    Ok(Json(ApiEnvelope::ok(payments)))
}

async fn activate_member(State(state): State<AppState>, Caller(ctx): Caller) -> ApiResult<String> {
    state.accounts.activate_member(&ctx).await?;
    Ok(Json(ApiEnvelope::ok("success".to_string())))
}

async fn account_number(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> ApiResult<AccountNumberResponse> {
    let no_rekening = state.accounts.account_number(&ctx).await?;
    Ok(Json(ApiEnvelope::ok(AccountNumberResponse { no_rekening })))
}

async fn virtual_account(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> ApiResult<VirtualAccountResponse> {
    let va_number = state.accounts.virtual_account(&ctx).await?;
    Ok(Json(ApiEnvelope::ok(VirtualAccountResponse { va_number })))
}

async fn special_savings_balance(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> ApiResult<AccountBalance> {
    let balance = state.accounts.special_savings_balance(&ctx).await?;
    Ok(Json(ApiEnvelope::ok(balance)))
}

async fn bima_balance(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> ApiResult<AccountBalance> {
    let balance = state.accounts.bima_balance(&ctx).await?;
    Ok(Json(ApiEnvelope::ok(balance)))
}

async fn bima_mutations(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Query(query): Query<MutationQuery>,
) -> ApiResult<Vec<Mutation>> {
    let mutations = state
        .accounts
        .bima_mutations(&ctx, query.start_date, query.end_date)
        .await?;
    Ok(Json(ApiEnvelope::ok(mutations)))
}

async fn list_orders(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<Vec<Order>> {
    let status = query
        .status
        .map(|code| {
            OrderStatus::from_code(code)
                .ok_or_else(|| ServiceError::bad_request(format!("unknown order status {code}")))
        })
        .transpose()?;

    let orders = state.orders.list(&ctx, status).await?;
    Ok(Json(ApiEnvelope::ok(orders)))
}

async fn get_order(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Order> {
    let order = state.orders.get(&ctx, order_id).await?;
    Ok(Json(ApiEnvelope::ok(order)))
}

async fn cancel_order(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Order> {
    let order = state.orders.cancel(&ctx, order_id).await?;
    Ok(Json(ApiEnvelope::ok(order)))
}

async fn complete_order(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Order> {
    let order = state.orders.complete(&ctx, order_id).await?;
    Ok(Json(ApiEnvelope::ok(order)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use bupda_core::{
        AccountKind, AccountType, DesaContext, PaylaterPolicy, PaymentChannel, PaymentMethod,
        User, UserAccount,
    };
    use bupda_memstore::{InMemoryOrderStore, InMemoryUserStore, LedgerScript, SimulatedLedger};
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        user_id: Uuid,
        orders: Arc<InMemoryOrderStore>,
    }

    async fn test_app(script: LedgerScript) -> TestApp {
        let desa = DesaContext {
            id_desa: Uuid::new_v4(),
            group_id_bupda: "GRP-9".to_string(),
            no_rekening: "900100".to_string(),
        };
        let user = User {
            id: Uuid::new_v4(),
            id_desa: Some(desa.id_desa),
            phone: "0813".to_string(),
            full_name: "Wayan".to_string(),
            email: "wayan@example.com".to_string(),
            nik: "5171020202850002".to_string(),
            address: "Br. Kelod, Gianyar".to_string(),
            account_type: AccountType::Normal,
            ledger_member_id: Some("MBR-9".to_string()),
            ledger_access_token: Some("tok-9".to_string()),
            is_paylater: true,
            paylater_approved: true,
        };

        let orders = Arc::new(InMemoryOrderStore::new());
        let users = Arc::new(InMemoryUserStore::new());
        users.insert_user(user.clone()).await;
        users.insert_desa(desa).await;
        users
            .insert_account(UserAccount {
                id: Uuid::new_v4(),
                id_user: user.id,
                kind: AccountKind::Paylater,
                id_account: "ACC-PL-9".to_string(),
                code: "201-9".to_string(),
                bin: "977".to_string(),
            })
            .await;
        users
            .insert_account(UserAccount {
                id: Uuid::new_v4(),
                id_user: user.id,
                kind: AccountKind::TabunganBima,
                id_account: "ACC-TB-9".to_string(),
                code: "101-9".to_string(),
                bin: "988".to_string(),
            })
            .await;
        users
            .insert_channel(PaymentChannel {
                code: "paylater".to_string(),
                name: "Paylater".to_string(),
                method: PaymentMethod::Paylater,
                fee: Decimal::ZERO,
                active: true,
            })
            .await;
        let ledger = Arc::new(SimulatedLedger::new(script));
        let policy = PaylaterPolicy::default();

        let state = AppState {
            paylater: PaylaterService::new(
                orders.clone(),
                users.clone(),
                ledger.clone(),
                policy.clone(),
            ),
            presenter: PaymentChannelPresenter::new(
                orders.clone(),
                users.clone(),
                users.clone(),
                policy.clone(),
            ),
            accounts: AccountService::new(users, ledger),
            orders: OrderService::new(orders.clone(), policy),
        };

        TestApp {
            router: build_router(state, Duration::from_secs(5)),
            user_id: user.id,
            orders,
        }
    }

    fn request(method: &str, uri: &str, user_id: Option<Uuid>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-request-id", "req-gw-test");
        if let Some(user_id) = user_id {
            builder = builder.header("x-user-id", user_id.to_string());
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn healthz_needs_no_caller() {
        let app = test_app(LedgerScript::default()).await;
        let (status, body) = send(&app.router, request("GET", "/healthz", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn missing_caller_is_unauthorized() {
        let app = test_app(LedgerScript::default()).await;
        let (status, body) =
            send(&app.router, request("GET", "/paylater/limit", None, None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], 401);
        assert_eq!(body["message"], "unauthorized");
    }

    #[tokio::test]
    async fn checkout_returns_the_stored_order() {
        let app = test_app(LedgerScript::default()).await;
        let (status, body) = send(
            &app.router,
            request(
                "POST",
                "/paylater/checkout",
                Some(app.user_id),
                Some(json!({ "sub_total": "75000", "shipping_cost": "5000" })),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 200);
        assert_eq!(body["data"]["payment_method"], "paylater");
        assert_eq!(body["data"]["total_bill"], "82500");
        assert_eq!(app.orders.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_pool_maps_to_service_unavailable() {
        let app = test_app(LedgerScript {
            group_balance: Ok(Decimal::ZERO),
            ..LedgerScript::default()
        })
        .await;
        let (status, body) = send(
            &app.router,
            request(
                "POST",
                "/paylater/checkout",
                Some(app.user_id),
                Some(json!({ "sub_total": "75000" })),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body["errors"][0],
            "Mohon maaf transaksi belum bisa dilakukan"
        );
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn missing_bill_maps_to_not_found() {
        let app = test_app(LedgerScript::default()).await;
        let (status, body) = send(
            &app.router,
            request("POST", "/paylater/bill/pay", Some(app.user_id), None),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"][0], "TAGIHAN NOT FOUND");
    }

    #[tokio::test]
    async fn channel_list_carries_the_surcharge() {
        let app = test_app(LedgerScript::default()).await;
        let (status, body) = send(
            &app.router,
            request(
                "GET",
                "/payment-channels?total_bill=40000",
                Some(app.user_id),
                None,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["fee"], "2500");
        assert_eq!(body["data"][0]["available"], true);
    }

    #[tokio::test]
    async fn unknown_status_filter_is_a_bad_request() {
        let app = test_app(LedgerScript::default()).await;
        let (status, _) = send(
            &app.router,
            request("GET", "/orders?status=4", Some(app.user_id), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn foreign_orders_are_not_found() {
        let app = test_app(LedgerScript::default()).await;
        let uri = format!("/orders/{}", Uuid::new_v4());
        let (status, body) = send(&app.router, request("GET", &uri, Some(app.user_id), None)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "not_found");
    }

    #[tokio::test]
    async fn upstream_failures_hide_nothing_but_the_prefix() {
        let app = test_app(LedgerScript {
            paylater_limit: Err(bupda_core::LedgerError::Rejected(
                "graphql: member suspended".to_string(),
            )),
            ..LedgerScript::default()
        })
        .await;
        let (status, body) = send(
            &app.router,
            request("GET", "/paylater/limit", Some(app.user_id), None),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["errors"][0], "member suspended");
    }

    #[tokio::test]
    async fn ledger_transport_detail_never_reaches_the_caller() {
        let app = test_app(LedgerScript {
            paylater_limit: Err(bupda_core::LedgerError::Transport(
                "error sending request for url (http://10.0.3.7:9000/graphql)".to_string(),
            )),
            ..LedgerScript::default()
        })
        .await;
        let (status, body) = send(
            &app.router,
            request("GET", "/paylater/limit", Some(app.user_id), None),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["errors"][0], bupda_core::LEDGER_UNAVAILABLE_MESSAGE);
        assert!(!body.to_string().contains("10.0.3.7"));
    }

    #[tokio::test]
    async fn activated_member_cannot_register_twice() {
        let app = test_app(LedgerScript::default()).await;
        let (status, body) = send(
            &app.router,
            request("POST", "/accounts/activate", Some(app.user_id), None),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0], "user already activated");
    }

    #[tokio::test]
    async fn account_lookups_read_the_savings_account() {
        let app = test_app(LedgerScript::default()).await;
        let (status, body) = send(
            &app.router,
            request("GET", "/accounts/bima/number", Some(app.user_id), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["no_rekening"], "101-9");

        let (status, body) = send(
            &app.router,
            request("GET", "/accounts/bima/va", Some(app.user_id), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["va_number"], "988013");
    }

    #[tokio::test]
    async fn paylater_history_routes_answer_for_a_new_user() {
        let app = test_app(LedgerScript::default()).await;
        for uri in [
            "/paylater/history",
            "/paylater/orders?month=3",
            "/paylater/bill/payments?index_date=2024-03-01",
        ] {
            let (status, body) = send(&app.router, request("GET", uri, Some(app.user_id), None)).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body["data"], json!([]), "{uri}");
        }

        let (status, _) = send(
            &app.router,
            request("GET", "/paylater/orders?month=13", Some(app.user_id), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
