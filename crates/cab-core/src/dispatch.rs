use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, warn};

use crate::{
    budget::BudgetLedger,
    domain::{ChatId, ImageNote, Role, Turn},
    errors::Error,
    history::ConversationStore,
    keyring::KeyRing,
    model::{ChatMessage, CompletionRequest, MessageRole, ModelClient},
    Result,
};

/// Fixed ceiling on concurrently in-flight model calls.
///
/// `acquire` suspends the caller until a slot frees; backpressure is
/// waiting, never rejection. The returned slot is an RAII guard, so the
/// slot is given back on every exit path, including errors and task
/// cancellation.
#[derive(Clone)]
pub struct AdmissionGate {
    slots: Arc<Semaphore>,
}

pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    pub fn new(ceiling: usize) -> Result<Self> {
        if ceiling == 0 {
            return Err(Error::Config(
                "admission ceiling must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            slots: Arc::new(Semaphore::new(ceiling)),
        })
    }

    pub async fn acquire(&self) -> AdmissionSlot {
        // The semaphore is never closed, so acquire cannot fail.
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore closed");
        AdmissionSlot { _permit: permit }
    }
}

/// One inbound user message, as handed over by the transport adapter.
#[derive(Clone, Debug)]
pub struct Prompt {
    pub text: String,
    pub image: Option<ImageNote>,
    /// Extra system message for command modes (`/code`, `/student`).
    pub extra_system: Option<String>,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
            extra_system: None,
        }
    }
}

/// The dispatcher's answer, with enough accounting detail for the
/// transport to render the credit footer and the budget-cap warning.
#[derive(Clone, Debug)]
pub struct Reply {
    pub text: String,
    pub spent_this_call_nanos: u64,
    pub remaining_usd: f64,
    pub exhausted: bool,
}

/// Orchestrates one request: admission, budget check, history append, key
/// rotation, the model call, charging, and the reply append.
///
/// The dispatcher owns no per-request state; everything mutable lives in
/// the injected singletons, each behind its own atomic or minimal lock.
/// Per request it walks: acquire slot, refuse if the ledger is exhausted,
/// append the user turn, rotate a key, call the gateway, charge the
/// reported tokens, append the reply. A failed call retracts the user
/// turn and charges nothing.
pub struct Dispatcher {
    keys: Arc<KeyRing>,
    ledger: Arc<BudgetLedger>,
    store: Arc<ConversationStore>,
    gate: AdmissionGate,
    model: Arc<dyn ModelClient>,
    model_name: String,
    system_prompt: String,
}

impl Dispatcher {
    pub fn new(
        keys: Arc<KeyRing>,
        ledger: Arc<BudgetLedger>,
        store: Arc<ConversationStore>,
        gate: AdmissionGate,
        model: Arc<dyn ModelClient>,
        model_name: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            keys,
            ledger,
            store,
            gate,
            model,
            model_name: model_name.into(),
            system_prompt: system_prompt.into(),
        }
    }

    pub async fn handle(&self, chat: ChatId, prompt: Prompt) -> Result<Reply> {
        let _slot = self.gate.acquire().await;

        if !self.ledger.can_spend() {
            info!(chat = chat.0, "refusing request: budget exhausted");
            return Err(Error::BudgetExhausted);
        }

        // Append under the store lock so turns land in arrival order, then
        // snapshot the window that includes the new turn.
        let seq = self
            .store
            .append(chat, Role::User, prompt.text, prompt.image);
        let history = self.store.snapshot(chat);
        let key = self.keys.next();

        let req = CompletionRequest {
            model: self.model_name.clone(),
            messages: self.build_messages(&history, prompt.extra_system.as_deref()),
        };

        let completion = match self.model.complete(&key, req).await {
            Ok(c) => c,
            Err(e) => {
                // Roll back the provisional user turn: a failed call must
                // not leave an orphaned user message in the context.
                self.store.retract(chat, seq);
                warn!(chat = chat.0, key = key.index, error = %e, "model call failed");
                return Err(e);
            }
        };

        let spent = self
            .ledger
            .charge(completion.input_tokens, completion.output_tokens);
        self.store
            .append(chat, Role::Assistant, completion.text.clone(), None);

        info!(
            chat = chat.0,
            key = key.index,
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            spent_nanos = spent,
            "dispatched"
        );

        Ok(Reply {
            text: completion.text,
            spent_this_call_nanos: spent,
            remaining_usd: self.ledger.remaining_usd(),
            exhausted: self.ledger.exhausted(),
        })
    }

    /// Drop a conversation's history (transport `/reset`).
    pub fn reset(&self, chat: ChatId) {
        self.store.reset(chat);
    }

    fn build_messages(&self, history: &[Turn], extra_system: Option<&str>) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::new(
            MessageRole::System,
            self.system_prompt.clone(),
        ));
        if let Some(extra) = extra_system {
            messages.push(ChatMessage::new(MessageRole::System, extra));
        }
        for turn in history {
            let role = match turn.role {
                Role::User => MessageRole::User,
                Role::Assistant => MessageRole::Assistant,
            };
            let content = match &turn.image {
                Some(img) => format!(
                    "{}\n[photo: {}]",
                    turn.text,
                    img.caption.as_deref().unwrap_or("no caption")
                ),
                None => turn.text.clone(),
            };
            messages.push(ChatMessage::new(role, content));
        }
        messages
    }
}
