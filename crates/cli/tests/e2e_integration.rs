//! End-to-end integration tests for the Warmline companion chat service.
//!
//! These tests exercise full user journeys across crate boundaries: persona
//! setup, credit spend and top-up, the premium personality gate, and the
//! HTTP gateway surface, against both store backends.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use warmline_core::{
    CREDITS_100_PACK, ChatError, ChatMessage, CompanionModel, ConversationLog, CreditOutcome,
    EntitlementStore, INITIAL_CREDITS, PersonaStore, PersonaUpdate, Principal, ProviderError, Role,
};
use warmline_engine::{ChatEngine, FALLBACK_REPLY, PersonaConfigurator};
use warmline_store::{SessionStore, SqliteStore};

// ── Mock Model ───────────────────────────────────────────────────────────

/// A scripted model that replays canned replies and records every request
/// context it was handed.
struct ScriptedModel {
    replies: Mutex<Vec<String>>,
    contexts: Mutex<Vec<Vec<ChatMessage>>>,
    failure: Option<ProviderError>,
}

impl ScriptedModel {
    fn replying(texts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(texts.iter().rev().map(|t| t.to_string()).collect()),
            contexts: Mutex::new(Vec::new()),
            failure: None,
        })
    }

    fn failing(error: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
            failure: Some(error),
        })
    }

    fn calls(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    fn last_context(&self) -> Vec<ChatMessage> {
        self.contexts.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl CompanionModel for ScriptedModel {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn reply(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.contexts.lock().unwrap().push(messages.to_vec());
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let mut replies = self.replies.lock().unwrap();
        Ok(replies.pop().unwrap_or_else(|| "mmhm, tell me more".into()))
    }
}

fn device(id: &str) -> Principal {
    Principal::Device(id.into())
}

// ── Conversation lifecycle ───────────────────────────────────────────────

#[tokio::test]
async fn e2e_first_render_greeting_then_first_send() {
    let store = Arc::new(SessionStore::new());
    let model = ScriptedModel::replying(&["aww, I missed you 💕"]);
    let configurator = PersonaConfigurator::new(store.clone());
    let engine = ChatEngine::new(store.clone(), model.clone());
    let p = device("d-1");

    // First render seeds the greeting without touching the balance.
    let greeting = configurator.ensure_greeting(&p).await.unwrap().unwrap();
    assert_eq!(greeting.role, Role::Assistant);
    assert_eq!(store.entitlement(&p).await.unwrap().credits, INITIAL_CREDITS);

    let reply = engine.send(&p, "hi luna!").await.unwrap();
    assert_eq!(reply.reply.content, "aww, I missed you 💕");
    assert_eq!(reply.balance, CreditOutcome::Remaining(INITIAL_CREDITS - 1));

    // Greeting, user turn, assistant turn, in order.
    let turns = store.recent_turns(&p, 10).await.unwrap();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].id, greeting.id);
    assert_eq!(turns[1].content, "hi luna!");
    assert_eq!(turns[2].content, "aww, I missed you 💕");

    // The model saw the seeded greeting as history, after the system turn.
    let context = model.last_context();
    assert_eq!(context[0].role, Role::System);
    assert_eq!(context[1].content, greeting.content);
}

#[tokio::test]
async fn e2e_credit_exhaustion_then_pack_topup() {
    let store = Arc::new(SessionStore::new());
    let model = ScriptedModel::replying(&[]);
    let engine = ChatEngine::new(store.clone(), model.clone());
    let p = device("d-2");

    for i in 0..INITIAL_CREDITS {
        engine.send(&p, &format!("msg {i}")).await.unwrap();
    }
    let err = engine.send(&p, "still there?").await.unwrap_err();
    assert!(matches!(err, ChatError::Exhausted));
    assert_eq!(model.calls(), INITIAL_CREDITS as usize);

    // Buying the pack resumes the conversation where it left off.
    let outcome = store.grant_credits(&p, CREDITS_100_PACK).await.unwrap();
    assert_eq!(outcome, CreditOutcome::Remaining(CREDITS_100_PACK));
    let reply = engine.send(&p, "I'm back").await.unwrap();
    assert_eq!(reply.balance, CreditOutcome::Remaining(CREDITS_100_PACK - 1));
    assert!(store.entitlement(&p).await.unwrap().has_purchased);
}

#[tokio::test]
async fn e2e_premium_personality_unlocked_by_purchase() {
    let store = Arc::new(SessionStore::new());
    let model = ScriptedModel::replying(&["hmph. hi, I guess."]);
    let configurator = PersonaConfigurator::new(store.clone());
    let engine = ChatEngine::new(store.clone(), model.clone());
    let p = device("d-3");

    let err = configurator
        .select_personality(&p, "tsundere")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Locked(_)));

    store.grant_credits(&p, CREDITS_100_PACK).await.unwrap();
    let saved = configurator.select_personality(&p, "tsundere").await.unwrap();
    assert_eq!(saved.persona.personality, "tsundere");

    // The next send is prompted with the new register.
    engine.send(&p, "hey").await.unwrap();
    let system = &model.last_context()[0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.contains("tsundere"));
}

#[tokio::test]
async fn e2e_rename_starts_a_fresh_conversation() {
    let store = Arc::new(SessionStore::new());
    let model = ScriptedModel::replying(&["first reply", "second reply"]);
    let configurator = PersonaConfigurator::new(store.clone());
    let engine = ChatEngine::new(store.clone(), model.clone());
    let p = device("d-4");

    engine.send(&p, "remember this").await.unwrap();
    assert_eq!(store.recent_turns(&p, 10).await.unwrap().len(), 2);

    let saved = configurator
        .update(
            &p,
            PersonaUpdate {
                companion_name: Some("Aria".into()),
                ..PersonaUpdate::default()
            },
        )
        .await
        .unwrap();
    let greeting = saved.greeting.unwrap();

    // Old transcript is gone; the model never sees "remember this" again.
    let turns = store.recent_turns(&p, 10).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].id, greeting.id);

    engine.send(&p, "who are you?").await.unwrap();
    let context = model.last_context();
    assert!(context.iter().all(|m| m.content != "remember this"));
    assert!(context[0].content.contains("Aria"));
}

#[tokio::test]
async fn e2e_upstream_outage_leaves_state_untouched() {
    let store = Arc::new(SessionStore::new());
    let model = ScriptedModel::failing(ProviderError::Timeout("read timed out".into()));
    let engine = ChatEngine::new(store.clone(), model);
    let p = device("d-5");

    let err = engine.send(&p, "you there?").await.unwrap_err();
    assert!(matches!(err, ChatError::Upstream(_)));
    assert_eq!(store.entitlement(&p).await.unwrap().credits, INITIAL_CREDITS);
    // The apology shown for this case is display-only and never persisted.
    let turns = store.recent_turns(&p, 10).await.unwrap();
    assert!(turns.iter().all(|t| t.content != FALLBACK_REPLY));
}

#[tokio::test]
async fn e2e_reset_returns_principal_to_day_one() {
    let store = Arc::new(SessionStore::new());
    let configurator = PersonaConfigurator::new(store.clone());
    let p = device("d-6");

    store.grant_unlimited(&p).await.unwrap();
    store.append(&p, Role::User, "hello").await.unwrap();
    store
        .save(&p, PersonaUpdate::personality("clingy"))
        .await
        .unwrap();

    configurator.reset_all(&p).await.unwrap();

    let record = store.entitlement(&p).await.unwrap();
    assert_eq!(record.credits, INITIAL_CREDITS);
    assert!(!record.is_unlimited);
    assert!(!record.has_purchased);
    assert!(store.recent_turns(&p, 10).await.unwrap().is_empty());
    assert_eq!(store.persona(&p).await.unwrap().personality, "sweet");
}

// ── Durable backend ──────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_sqlite_account_full_lifecycle() {
    let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
    let model = ScriptedModel::replying(&["hey you 💕", "of course!"]);
    let configurator = PersonaConfigurator::new(store.clone());
    let engine = ChatEngine::new(store.clone(), model);
    let p = Principal::Account(uuid::Uuid::new_v4());

    configurator.ensure_greeting(&p).await.unwrap();
    engine.send(&p, "good morning").await.unwrap();
    engine.send(&p, "coffee later?").await.unwrap();

    let turns = store.recent_turns(&p, 10).await.unwrap();
    assert_eq!(turns.len(), 5);
    assert_eq!(
        store.entitlement(&p).await.unwrap().credits,
        INITIAL_CREDITS - 2
    );

    // A different account is fully isolated.
    let q = Principal::Account(uuid::Uuid::new_v4());
    assert!(store.recent_turns(&q, 10).await.unwrap().is_empty());
    assert_eq!(store.entitlement(&q).await.unwrap().credits, INITIAL_CREDITS);
}

// ── Gateway surface ──────────────────────────────────────────────────────

mod gateway {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use warmline_config::AppConfig;
    use warmline_gateway::{GatewayState, SharedState, build_router};

    async fn router_with(model: Arc<ScriptedModel>) -> axum::Router {
        let state: SharedState = Arc::new(GatewayState {
            config: AppConfig::default(),
            model: Some(model as Arc<dyn CompanionModel>),
            checkout: None,
            session: Arc::new(SessionStore::new()),
            durable: Arc::new(SqliteStore::new(":memory:").await.unwrap()),
        });
        build_router(state)
    }

    fn post_chat(device: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json");
        if let Some(id) = device {
            builder = builder.header("x-device-id", id);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, device: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-device-id", device)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn e2e_gateway_device_chat_roundtrip() {
        let model = ScriptedModel::replying(&["hi babe!"]);
        let app = router_with(model).await;

        let body = serde_json::json!({
            "messages": [{"role": "user", "content": "hey luna"}]
        });
        let response = app
            .clone()
            .oneshot(post_chat(Some("dev-e2e"), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["message"], "hi babe!");
        assert_eq!(json["credits"]["state"], "remaining");
        assert_eq!(json["credits"]["credits"], INITIAL_CREDITS - 1);

        // The send is visible in the principal's history.
        let response = app.oneshot(get("/api/history", "dev-e2e")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let turns = json.as_array().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1]["content"], "hi babe!");
    }

    #[tokio::test]
    async fn e2e_gateway_stateless_chat_with_persona_overrides() {
        let model = ScriptedModel::replying(&["*smiles* hello~"]);
        let app = router_with(model.clone()).await;

        let body = serde_json::json!({
            "gfName": "Mika",
            "yourName": "Sam",
            "style": "cute",
            "messages": [
                {"role": "assistant", "content": "hiii"},
                {"role": "user", "content": "what's my name?"}
            ]
        });
        let response = app.oneshot(post_chat(None, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["message"], "*smiles* hello~");
        assert!(json.get("credits").is_none());

        // The overrides reached the system prompt; the client-held history
        // reached the context.
        let context = model.last_context();
        assert!(context[0].content.contains("Mika"));
        assert!(context[0].content.contains("Sam"));
        assert_eq!(context[1].content, "hiii");
    }

    #[tokio::test]
    async fn e2e_gateway_outage_returns_fallback_without_charging() {
        let model = ScriptedModel::failing(ProviderError::Api {
            status_code: 503,
            message: "overloaded".into(),
        });
        let app = router_with(model).await;

        let body = serde_json::json!({
            "messages": [{"role": "user", "content": "hello?"}]
        });
        let response = app
            .clone()
            .oneshot(post_chat(Some("dev-out"), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["fallback"], FALLBACK_REPLY);

        let response = app.oneshot(get("/api/credits", "dev-out")).await.unwrap();
        let json = json_body(response).await;
        assert_eq!(json["credits"], INITIAL_CREDITS);
    }
}

// ── Configuration ────────────────────────────────────────────────────────

#[test]
fn e2e_config_defaults_match_the_service_contract() {
    let config = warmline_config::AppConfig::default();
    assert_eq!(config.gateway.port, 8787);
    assert!(!config.has_model_key());
    assert!(!config.has_billing_key());
}
