//! The /api surface: chat, checkout, persona, credits, history, reset.
//!
//! Every stateful route resolves its principal from the `x-account-id`
//! (durable SQLite) or `x-device-id` (session memory) header. `/api/chat`
//! additionally accepts requests with neither header: the stateless mode
//! where the client sends its whole history and the server keeps nothing.
//!
//! Error taxonomy on the wire: 400 invalid input, 402 exhausted credits,
//! 403 locked personality, 500 configuration/storage/upstream failures.
//! Upstream detail is logged for operators, never surfaced verbatim.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use warmline_billing::CheckoutMode;
use warmline_core::{
    CREDITS_100_PACK, ChatError, ChatMessage, CompanionModel, ConversationLog, ConversationTurn,
    CreditOutcome, EntitlementRecord, EntitlementStore, PersonaConfig, PersonaStore,
    PersonaUpdate, Principal, Role, StoreError,
};
use warmline_engine::{ChatEngine, FALLBACK_REPLY, PersonaConfigurator, stateless_reply};
use warmline_store::{SessionStore, SqliteStore};

use crate::SharedState;

/// Default number of turns returned by GET /api/history.
const DEFAULT_HISTORY_PAGE: usize = 50;

pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/checkout", post(checkout_handler))
        .route("/api/persona", get(persona_get).put(persona_put))
        .route("/api/persona/personality", post(personality_select))
        .route("/api/credits", get(credits_get))
        .route("/api/credits/grant", post(credits_grant))
        .route("/api/credits/unlimited", post(credits_unlimited))
        .route(
            "/api/history",
            get(history_get).delete(history_delete),
        )
        .route("/api/reset", post(reset_handler))
        .with_state(state)
}

// ── Principal resolution ──────────────────────────────────────────────────

/// Which store backend a request's principal lives in.
enum Backend {
    Session(Arc<SessionStore>),
    Durable(Arc<SqliteStore>),
}

/// Resolve the caller's principal from headers. `None` means anonymous —
/// only `/api/chat` accepts that, in its stateless mode.
fn resolve(
    state: &SharedState,
    headers: &HeaderMap,
) -> Result<Option<(Principal, Backend)>, ApiError> {
    if let Some(value) = headers.get("x-account-id") {
        let raw = value
            .to_str()
            .map_err(|_| bad_request("x-account-id header is not valid text"))?;
        let id: Uuid = raw
            .parse()
            .map_err(|_| bad_request("x-account-id must be a UUID"))?;
        return Ok(Some((
            Principal::Account(id),
            Backend::Durable(state.durable.clone()),
        )));
    }
    if let Some(value) = headers.get("x-device-id") {
        let raw = value
            .to_str()
            .map_err(|_| bad_request("x-device-id header is not valid text"))?;
        return Ok(Some((
            Principal::Device(raw.to_string()),
            Backend::Session(state.session.clone()),
        )));
    }
    Ok(None)
}

fn require_principal(
    state: &SharedState,
    headers: &HeaderMap,
) -> Result<(Principal, Backend), ApiError> {
    resolve(state, headers)?
        .ok_or_else(|| bad_request("x-device-id or x-account-id header required"))
}

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

/// Chat request body. Field names match the original client contract.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    #[serde(default)]
    messages: Vec<WireMessage>,
    #[serde(default)]
    gf_name: Option<String>,
    #[serde(default)]
    your_name: Option<String>,
    #[serde(default)]
    personality: Option<String>,
    #[serde(default)]
    backstory: Option<String>,
    #[serde(default)]
    style: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    message: String,
    /// Post-send balance. Absent in stateless mode, where the client owns
    /// its own credit state.
    #[serde(skip_serializing_if = "Option::is_none")]
    credits: Option<CreditOutcome>,
}

#[derive(Deserialize)]
struct CheckoutRequest {
    #[serde(rename = "priceId", default)]
    price_id: Option<String>,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Serialize)]
struct CheckoutResponse {
    url: String,
}

#[derive(Serialize)]
struct PersonaSavedResponse {
    persona: PersonaConfig,
    /// The re-seeded greeting when the save reset the conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    greeting: Option<ConversationTurn>,
}

#[derive(Deserialize)]
struct PersonalityRequest {
    personality: String,
}

#[derive(Deserialize)]
struct GrantRequest {
    #[serde(default)]
    amount: Option<u32>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    /// Locally-generated apology the UI can show in place of a reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
            fallback: None,
        }),
    )
}

fn internal(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: message.into(),
            fallback: None,
        }),
    )
}

/// Map the engine's error/business-state channel onto HTTP.
fn chat_error(e: ChatError) -> ApiError {
    match e {
        ChatError::InvalidInput => bad_request("Message is empty"),
        ChatError::Exhausted => (
            StatusCode::PAYMENT_REQUIRED,
            Json(ErrorResponse {
                error: "No message credits remaining".into(),
                fallback: None,
            }),
        ),
        ChatError::Locked(_) => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: e.to_string(),
                fallback: None,
            }),
        ),
        ChatError::UnknownPersonality(_) => bad_request(&e.to_string()),
        ChatError::Upstream(ref cause) => {
            error!(error = %cause, "Model call failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to generate response".into(),
                    fallback: Some(FALLBACK_REPLY.into()),
                }),
            )
        }
        ChatError::Store(ref cause) => {
            error!(error = %cause, "Store operation failed");
            internal("Storage failure")
        }
    }
}

fn store_error(e: StoreError) -> ApiError {
    chat_error(ChatError::Store(e))
}

// ── Chat ──────────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Some((last, history)) = payload.messages.split_last() else {
        return Err(bad_request("Messages array is required"));
    };

    let model = state.model.clone().ok_or_else(|| {
        error!("Chat request received but no model API key is configured");
        internal("Service is not configured")
    })?;

    let text = last.content.trim();
    if text.is_empty() {
        return Err(bad_request("Message is empty"));
    }

    match resolve(&state, &headers)? {
        Some((principal, Backend::Session(store))) => {
            stateful_chat(store, model, &principal, text).await
        }
        Some((principal, Backend::Durable(store))) => {
            stateful_chat(store, model, &principal, text).await
        }
        None => {
            // Stateless mode: the persona and the transcript both arrive
            // with the request, and nothing is persisted.
            let mut persona = PersonaConfig::default();
            if let Some(name) = payload.gf_name {
                persona.companion_name = name;
            }
            if let Some(alias) = payload.your_name {
                persona.user_alias = alias;
            }
            if let Some(personality) = payload.personality {
                persona.personality = personality;
            }
            if let Some(backstory) = payload.backstory {
                persona.backstory = backstory;
            }
            if let Some(style) = payload.style {
                persona.texting_style = style;
            }

            let context: Vec<ChatMessage> = history
                .iter()
                .map(|m| ChatMessage {
                    role: Role::parse(&m.role),
                    content: m.content.clone(),
                })
                .collect();

            let message = stateless_reply(model.as_ref(), &persona, &context, text)
                .await
                .map_err(chat_error)?;
            Ok(Json(ChatResponse {
                message,
                credits: None,
            }))
        }
    }
}

async fn stateful_chat<S>(
    store: Arc<S>,
    model: Arc<dyn CompanionModel>,
    principal: &Principal,
    text: &str,
) -> Result<Json<ChatResponse>, ApiError>
where
    S: EntitlementStore + ConversationLog + PersonaStore,
{
    let engine = ChatEngine::new(store, model);
    let reply = engine.send(principal, text).await.map_err(chat_error)?;
    Ok(Json(ChatResponse {
        message: reply.reply.content,
        credits: Some(reply.balance),
    }))
}

// ── Checkout ──────────────────────────────────────────────────────────────

async fn checkout_handler(
    State(state): State<SharedState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let price_id = match payload.price_id.as_deref() {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => return Err(bad_request("Price ID is required")),
    };

    let checkout = state.checkout.as_ref().ok_or_else(|| {
        error!("Checkout request received but no payment secret key is configured");
        internal("Payments are not configured")
    })?;

    let mode = CheckoutMode::parse(payload.mode.as_deref().unwrap_or("payment"));
    let session = checkout
        .create_session(&price_id, mode)
        .await
        .map_err(|e| {
            error!(error = %e, "Checkout session creation failed");
            internal("Failed to create checkout session")
        })?;

    info!(mode = mode.as_str(), "Checkout session created");
    Ok(Json(CheckoutResponse { url: session.url }))
}

// ── Persona ───────────────────────────────────────────────────────────────

async fn persona_get(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<PersonaConfig>, ApiError> {
    let (principal, backend) = require_principal(&state, &headers)?;
    let persona = match backend {
        Backend::Session(s) => PersonaConfigurator::new(s).persona(&principal).await,
        Backend::Durable(s) => PersonaConfigurator::new(s).persona(&principal).await,
    }
    .map_err(chat_error)?;
    Ok(Json(persona))
}

async fn persona_put(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(update): Json<PersonaUpdate>,
) -> Result<Json<PersonaSavedResponse>, ApiError> {
    let (principal, backend) = require_principal(&state, &headers)?;
    let saved = match backend {
        Backend::Session(s) => PersonaConfigurator::new(s).update(&principal, update).await,
        Backend::Durable(s) => PersonaConfigurator::new(s).update(&principal, update).await,
    }
    .map_err(chat_error)?;
    Ok(Json(PersonaSavedResponse {
        persona: saved.persona,
        greeting: saved.greeting,
    }))
}

async fn personality_select(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<PersonalityRequest>,
) -> Result<Json<PersonaSavedResponse>, ApiError> {
    let (principal, backend) = require_principal(&state, &headers)?;
    let saved = match backend {
        Backend::Session(s) => {
            PersonaConfigurator::new(s)
                .select_personality(&principal, &payload.personality)
                .await
        }
        Backend::Durable(s) => {
            PersonaConfigurator::new(s)
                .select_personality(&principal, &payload.personality)
                .await
        }
    }
    .map_err(chat_error)?;
    Ok(Json(PersonaSavedResponse {
        persona: saved.persona,
        greeting: saved.greeting,
    }))
}

// ── Credits ───────────────────────────────────────────────────────────────

async fn credits_get(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<EntitlementRecord>, ApiError> {
    let (principal, backend) = require_principal(&state, &headers)?;
    let record = match backend {
        Backend::Session(s) => s.entitlement(&principal).await,
        Backend::Durable(s) => s.entitlement(&principal).await,
    }
    .map_err(store_error)?;
    Ok(Json(record))
}

async fn credits_grant(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<GrantRequest>,
) -> Result<Json<CreditOutcome>, ApiError> {
    let (principal, backend) = require_principal(&state, &headers)?;
    let amount = payload.amount.unwrap_or(CREDITS_100_PACK);
    let outcome = match backend {
        Backend::Session(s) => s.grant_credits(&principal, amount).await,
        Backend::Durable(s) => s.grant_credits(&principal, amount).await,
    }
    .map_err(store_error)?;
    info!(%principal, amount, "Credits granted");
    Ok(Json(outcome))
}

async fn credits_unlimited(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<EntitlementRecord>, ApiError> {
    let (principal, backend) = require_principal(&state, &headers)?;
    let record = match backend {
        Backend::Session(s) => unlimited_inner(s, &principal).await,
        Backend::Durable(s) => unlimited_inner(s, &principal).await,
    }
    .map_err(store_error)?;
    info!(%principal, "Unlimited access granted");
    Ok(Json(record))
}

async fn unlimited_inner<S: EntitlementStore>(
    store: Arc<S>,
    principal: &Principal,
) -> Result<EntitlementRecord, StoreError> {
    store.grant_unlimited(principal).await?;
    store.entitlement(principal).await
}

// ── History ───────────────────────────────────────────────────────────────

async fn history_get(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ConversationTurn>>, ApiError> {
    let (principal, backend) = require_principal(&state, &headers)?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_PAGE);
    let turns = match backend {
        Backend::Session(s) => history_inner(s, &principal, limit).await,
        Backend::Durable(s) => history_inner(s, &principal, limit).await,
    }
    .map_err(chat_error)?;
    Ok(Json(turns))
}

/// First render of an empty conversation seeds the greeting turn.
async fn history_inner<S>(
    store: Arc<S>,
    principal: &Principal,
    limit: usize,
) -> Result<Vec<ConversationTurn>, ChatError>
where
    S: EntitlementStore + ConversationLog + PersonaStore,
{
    let configurator = PersonaConfigurator::new(store.clone());
    configurator.ensure_greeting(principal).await?;
    Ok(store.recent_turns(principal, limit).await?)
}

async fn history_delete(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let (principal, backend) = require_principal(&state, &headers)?;
    match backend {
        Backend::Session(s) => s.clear(&principal).await,
        Backend::Durable(s) => s.clear(&principal).await,
    }
    .map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let (principal, backend) = require_principal(&state, &headers)?;
    match backend {
        Backend::Session(s) => PersonaConfigurator::new(s).reset_all(&principal).await,
        Backend::Durable(s) => PersonaConfigurator::new(s).reset_all(&principal).await,
    }
    .map_err(chat_error)?;
    Ok(StatusCode::NO_CONTENT)
}
