use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};
use uuid::Uuid;

pub const CODE_UNAUTHORIZED: i64 = 7225;
pub const CODE_MISSING_PLATFORM: i64 = 7227;
pub const CODE_INVALID_BODY: i64 = 7102;
pub const CODE_INVALID_DURATION: i64 = 7104;
pub const CODE_INVALID_NETWORK: i64 = 7105;
pub const CODE_SUBSCRIBER_NOT_FOUND: i64 = 7259;
pub const CODE_SUBSCRIPTION_NOT_FOUND: i64 = 7260;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscriber {
    pub original_app_user_id: String,
    pub original_application_version: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub entitlements: HashMap<String, Entitlement>,
    pub subscriptions: HashMap<String, Subscription>,
    pub non_subscriptions: HashMap<String, Vec<serde_json::Value>>,
    pub subscriber_attributes: HashMap<String, Attribute>,
}

impl Subscriber {
    fn new(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            original_app_user_id: user_id.to_string(),
            original_application_version: None,
            first_seen: now,
            last_seen: now,
            entitlements: HashMap::new(),
            subscriptions: HashMap::new(),
            non_subscriptions: HashMap::new(),
            subscriber_attributes: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entitlement {
    pub expires_date: Option<DateTime<Utc>>,
    pub grace_period_expires_date: Option<DateTime<Utc>>,
    pub purchase_date: DateTime<Utc>,
    pub product_identifier: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    pub expires_date: Option<DateTime<Utc>>,
    pub purchase_date: DateTime<Utc>,
    pub original_purchase_date: DateTime<Utc>,
    pub period_type: String,
    pub store: String,
    pub is_sandbox: bool,
    pub unsubscribe_detected_at: Option<DateTime<Utc>>,
    pub billing_issues_detected_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub ownership_type: String,
    pub store_transaction_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at_ms: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub subscriber: Subscriber,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: i64,
    pub message: String,
}

#[derive(Deserialize)]
pub struct CreatePurchase {
    pub app_user_id: String,
    pub fetch_token: String,
    pub product_id: Option<String>,
    #[serde(default)]
    pub is_restore: bool,
    #[serde(default)]
    pub attributes: HashMap<String, Attribute>,
}

#[derive(Deserialize)]
pub struct UpdateAttributes {
    pub attributes: HashMap<String, Attribute>,
}

#[derive(Deserialize)]
pub struct AddAttribution {
    pub data: serde_json::Value,
    pub network: u8,
}

#[derive(Deserialize)]
pub struct GrantPromotional {
    pub duration: String,
    pub start_time_ms: Option<i64>,
}

#[derive(Deserialize)]
pub struct DeferSubscription {
    pub expiry_time_ms: i64,
}

/// Error response in the API's `{code, message}` shape.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: i64,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn subscriber_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, CODE_SUBSCRIBER_NOT_FOUND, "Subscriber not found.")
    }

    fn invalid_body(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, CODE_INVALID_BODY, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Default)]
pub struct Store {
    subscribers: HashMap<String, Subscriber>,
    offering_overrides: HashMap<String, String>,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    let api = Router::new()
        .route("/receipts", post(create_purchase))
        .route("/subscribers/{user_id}", get(get_subscriber).delete(delete_subscriber))
        .route("/subscribers/{user_id}/attributes", post(update_attributes))
        .route("/subscribers/{user_id}/attribution", post(add_attribution))
        .route(
            "/subscribers/{user_id}/entitlements/{entitlement_id}/promotional",
            post(grant_promotional),
        )
        .route(
            "/subscribers/{user_id}/entitlements/{entitlement_id}/revoke_promotionals",
            post(revoke_promotionals),
        )
        .route(
            "/subscribers/{user_id}/offerings/{offering_id}/override",
            post(override_offering),
        )
        .route(
            "/subscribers/{user_id}/offerings/override",
            delete(delete_offering_override),
        )
        .route(
            "/subscribers/{user_id}/subscriptions/{product_id}/revoke",
            post(refund_subscription),
        )
        .route(
            "/subscribers/{user_id}/subscriptions/{product_id}/defer",
            post(defer_subscription),
        )
        .layer(middleware::from_fn(require_api_key))
        .with_state(db);
    Router::new().nest("/v1", api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock subscriber API listening");
    }
    axum::serve(listener, app()).await
}

async fn require_api_key(request: Request, next: Next) -> Result<Response, ApiError> {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|key| !key.trim().is_empty());
    if !authorized {
        warn!(uri = %request.uri(), "rejected request without API key");
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            CODE_UNAUTHORIZED,
            "Invalid API Key.",
        ));
    }
    Ok(next.run(request).await)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

fn store_for_platform(platform: &str) -> Option<&'static str> {
    match platform {
        "ios" => Some("app_store"),
        "macos" => Some("mac_app_store"),
        "android" => Some("play_store"),
        "stripe" => Some("stripe"),
        _ => None,
    }
}

fn promotional_expiry(duration: &str, start: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ApiError> {
    let months = |n| start.checked_add_months(Months::new(n));
    let expiry = match duration {
        "daily" => Some(start + TimeDelta::days(1)),
        "weekly" => Some(start + TimeDelta::days(7)),
        "monthly" => months(1),
        "two_month" => months(2),
        "three_month" => months(3),
        "six_month" => months(6),
        "yearly" => months(12),
        "lifetime" => return Ok(None),
        other => {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                CODE_INVALID_DURATION,
                format!("Invalid duration: {other}"),
            ))
        }
    };
    Ok(expiry)
}

fn promo_product(entitlement_id: &str) -> String {
    format!("rc_promo_{entitlement_id}")
}

async fn get_subscriber(
    State(db): State<Db>,
    Path(user_id): Path<String>,
) -> Json<Envelope> {
    let mut store = db.write().await;
    let subscriber = store
        .subscribers
        .entry(user_id.clone())
        .or_insert_with(|| Subscriber::new(&user_id));
    subscriber.last_seen = Utc::now();
    Json(Envelope {
        subscriber: subscriber.clone(),
    })
}

async fn delete_subscriber(
    State(db): State<Db>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut store = db.write().await;
    store.offering_overrides.remove(&user_id);
    store
        .subscribers
        .remove(&user_id)
        .map(|_| Json(serde_json::json!({ "app_user_id": user_id })))
        .ok_or_else(ApiError::subscriber_not_found)
}

async fn update_attributes(
    State(db): State<Db>,
    Path(user_id): Path<String>,
    payload: Result<Json<UpdateAttributes>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(input) = payload.map_err(ApiError::invalid_body)?;
    let mut store = db.write().await;
    let subscriber = store
        .subscribers
        .entry(user_id.clone())
        .or_insert_with(|| Subscriber::new(&user_id));
    subscriber.subscriber_attributes.extend(input.attributes);
    Ok(Json(serde_json::json!({})))
}

async fn add_attribution(
    State(db): State<Db>,
    Path(user_id): Path<String>,
    payload: Result<Json<AddAttribution>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(input) = payload.map_err(ApiError::invalid_body)?;
    if input.network > 5 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            CODE_INVALID_NETWORK,
            format!("Unknown attribution network {}", input.network),
        ));
    }
    if !db.read().await.subscribers.contains_key(&user_id) {
        return Err(ApiError::subscriber_not_found());
    }
    info!(%user_id, network = input.network, data = %input.data, "attribution recorded");
    Ok(Json(serde_json::json!({})))
}

async fn create_purchase(
    State(db): State<Db>,
    headers: HeaderMap,
    payload: Result<Json<CreatePurchase>, JsonRejection>,
) -> Result<Json<Envelope>, ApiError> {
    let Json(input) = payload.map_err(ApiError::invalid_body)?;
    let platform = header_str(&headers, "x-platform").ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            CODE_MISSING_PLATFORM,
            "X-Platform header is required.",
        )
    })?;
    let store_name = store_for_platform(platform).ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            CODE_MISSING_PLATFORM,
            format!("Unsupported platform: {platform}"),
        )
    })?;
    if input.fetch_token.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            CODE_INVALID_BODY,
            "fetch_token must not be empty.",
        ));
    }
    let is_sandbox = header_str(&headers, "x-is-sandbox") == Some("true");

    let now = Utc::now();
    let product_id = input.product_id.unwrap_or_else(|| "unknown_product".to_string());
    let mut store = db.write().await;
    let subscriber = store
        .subscribers
        .entry(input.app_user_id.clone())
        .or_insert_with(|| Subscriber::new(&input.app_user_id));
    let original_purchase_date = subscriber
        .subscriptions
        .get(&product_id)
        .filter(|_| input.is_restore)
        .map_or(now, |existing| existing.original_purchase_date);
    subscriber.subscriptions.insert(
        product_id,
        Subscription {
            expires_date: now.checked_add_months(Months::new(1)),
            purchase_date: now,
            original_purchase_date,
            period_type: "normal".to_string(),
            store: store_name.to_string(),
            is_sandbox,
            unsubscribe_detected_at: None,
            billing_issues_detected_at: None,
            refunded_at: None,
            ownership_type: "PURCHASED".to_string(),
            store_transaction_id: Uuid::new_v4().to_string(),
        },
    );
    subscriber.subscriber_attributes.extend(input.attributes);
    subscriber.last_seen = now;
    Ok(Json(Envelope {
        subscriber: subscriber.clone(),
    }))
}

async fn grant_promotional(
    State(db): State<Db>,
    Path((user_id, entitlement_id)): Path<(String, String)>,
    payload: Result<Json<GrantPromotional>, JsonRejection>,
) -> Result<Json<Envelope>, ApiError> {
    let Json(input) = payload.map_err(ApiError::invalid_body)?;
    let start = match input.start_time_ms {
        Some(ms) => DateTime::from_timestamp_millis(ms).ok_or_else(|| {
            ApiError::new(StatusCode::BAD_REQUEST, CODE_INVALID_BODY, "start_time_ms out of range.")
        })?,
        None => Utc::now(),
    };
    let expires_date = promotional_expiry(&input.duration, start)?;

    let mut store = db.write().await;
    let subscriber = store
        .subscribers
        .entry(user_id.clone())
        .or_insert_with(|| Subscriber::new(&user_id));
    let product = promo_product(&entitlement_id);
    subscriber.entitlements.insert(
        entitlement_id,
        Entitlement {
            expires_date,
            grace_period_expires_date: None,
            purchase_date: start,
            product_identifier: product.clone(),
        },
    );
    subscriber.subscriptions.insert(
        product,
        Subscription {
            expires_date,
            purchase_date: start,
            original_purchase_date: start,
            period_type: "normal".to_string(),
            store: "promotional".to_string(),
            is_sandbox: false,
            unsubscribe_detected_at: None,
            billing_issues_detected_at: None,
            refunded_at: None,
            ownership_type: "PURCHASED".to_string(),
            store_transaction_id: Uuid::new_v4().to_string(),
        },
    );
    Ok(Json(Envelope {
        subscriber: subscriber.clone(),
    }))
}

async fn revoke_promotionals(
    State(db): State<Db>,
    Path((user_id, entitlement_id)): Path<(String, String)>,
) -> Result<Json<Envelope>, ApiError> {
    let mut store = db.write().await;
    let subscriber = store
        .subscribers
        .get_mut(&user_id)
        .ok_or_else(ApiError::subscriber_not_found)?;
    let product = promo_product(&entitlement_id);
    if subscriber
        .entitlements
        .get(&entitlement_id)
        .is_some_and(|e| e.product_identifier == product)
    {
        subscriber.entitlements.remove(&entitlement_id);
    }
    subscriber.subscriptions.remove(&product);
    Ok(Json(Envelope {
        subscriber: subscriber.clone(),
    }))
}

async fn override_offering(
    State(db): State<Db>,
    Path((user_id, offering_id)): Path<(String, String)>,
) -> Result<Json<Envelope>, ApiError> {
    let mut store = db.write().await;
    let subscriber = store
        .subscribers
        .get(&user_id)
        .cloned()
        .ok_or_else(ApiError::subscriber_not_found)?;
    store.offering_overrides.insert(user_id, offering_id);
    Ok(Json(Envelope { subscriber }))
}

async fn delete_offering_override(
    State(db): State<Db>,
    Path(user_id): Path<String>,
) -> Result<Json<Envelope>, ApiError> {
    let mut store = db.write().await;
    let subscriber = store
        .subscribers
        .get(&user_id)
        .cloned()
        .ok_or_else(ApiError::subscriber_not_found)?;
    store.offering_overrides.remove(&user_id);
    Ok(Json(Envelope { subscriber }))
}

/// Look up a Play Store subscription for the Google-only endpoints.
fn play_subscription<'a>(
    store: &'a mut Store,
    user_id: &str,
    product_id: &str,
) -> Result<&'a mut Subscriber, ApiError> {
    let subscriber = store
        .subscribers
        .get_mut(user_id)
        .ok_or_else(ApiError::subscriber_not_found)?;
    let is_play = subscriber
        .subscriptions
        .get(product_id)
        .is_some_and(|sub| sub.store == "play_store");
    if !is_play {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            CODE_SUBSCRIPTION_NOT_FOUND,
            format!("No Play Store subscription {product_id}."),
        ));
    }
    Ok(subscriber)
}

async fn refund_subscription(
    State(db): State<Db>,
    Path((user_id, product_id)): Path<(String, String)>,
) -> Result<Json<Envelope>, ApiError> {
    let mut store = db.write().await;
    let subscriber = play_subscription(&mut store, &user_id, &product_id)?;
    let now = Utc::now();
    if let Some(sub) = subscriber.subscriptions.get_mut(&product_id) {
        sub.refunded_at = Some(now);
        sub.expires_date = Some(now);
    }
    Ok(Json(Envelope {
        subscriber: subscriber.clone(),
    }))
}

async fn defer_subscription(
    State(db): State<Db>,
    Path((user_id, product_id)): Path<(String, String)>,
    payload: Result<Json<DeferSubscription>, JsonRejection>,
) -> Result<Json<Envelope>, ApiError> {
    let Json(input) = payload.map_err(ApiError::invalid_body)?;
    let expiry = DateTime::from_timestamp_millis(input.expiry_time_ms).ok_or_else(|| {
        ApiError::new(StatusCode::BAD_REQUEST, CODE_INVALID_BODY, "expiry_time_ms out of range.")
    })?;
    let mut store = db.write().await;
    let subscriber = play_subscription(&mut store, &user_id, &product_id)?;
    if let Some(sub) = subscriber.subscriptions.get_mut(&product_id) {
        sub.expires_date = Some(expiry);
    }
    Ok(Json(Envelope {
        subscriber: subscriber.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_omits_missing_timestamp() {
        let attr = Attribute {
            value: "bar".to_string(),
            updated_at_ms: None,
        };
        assert_eq!(serde_json::to_string(&attr).unwrap(), r#"{"value":"bar"}"#);
    }

    #[test]
    fn create_purchase_defaults_optional_fields() {
        let input: CreatePurchase =
            serde_json::from_str(r#"{"app_user_id":"123","fetch_token":"receipt"}"#).unwrap();
        assert!(input.product_id.is_none());
        assert!(!input.is_restore);
        assert!(input.attributes.is_empty());
    }

    #[test]
    fn create_purchase_rejects_missing_token() {
        let result: Result<CreatePurchase, _> = serde_json::from_str(r#"{"app_user_id":"123"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn promotional_expiry_by_duration() {
        let start = DateTime::from_timestamp(1_579_132_457, 0).unwrap();
        assert_eq!(
            promotional_expiry("weekly", start).unwrap(),
            Some(start + TimeDelta::days(7))
        );
        assert_eq!(
            promotional_expiry("three_month", start).unwrap(),
            start.checked_add_months(Months::new(3))
        );
        assert_eq!(promotional_expiry("lifetime", start).unwrap(), None);
        assert!(promotional_expiry("fortnight", start).is_err());
    }

    #[test]
    fn platforms_map_to_stores() {
        assert_eq!(store_for_platform("ios"), Some("app_store"));
        assert_eq!(store_for_platform("android"), Some("play_store"));
        assert_eq!(store_for_platform("stripe"), Some("stripe"));
        assert_eq!(store_for_platform("windows"), None);
    }
}
