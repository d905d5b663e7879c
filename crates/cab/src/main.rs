use std::sync::Arc;

use tracing::info;

use cab_core::{
    budget::BudgetLedger,
    config::Config,
    dispatch::{AdmissionGate, Dispatcher},
    history::ConversationStore,
    keyring::KeyRing,
};
use cab_gateway::GatewayClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Arc::new(Config::load()?);
    cab_core::logging::init("cab");

    let keys = Arc::new(KeyRing::new(cfg.api_keys.clone())?);
    let ledger = Arc::new(BudgetLedger::new(cfg.budget_limit_nanos, cfg.cost_rate)?);
    let store = Arc::new(ConversationStore::new());
    let gate = AdmissionGate::new(cfg.max_concurrent_requests)?;
    let model = Arc::new(GatewayClient::new(
        cfg.gateway_base_url.clone(),
        cfg.request_timeout,
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        keys.clone(),
        ledger,
        store,
        gate,
        model,
        cfg.gateway_model.clone(),
        cfg.system_prompt.clone(),
    ));

    info!(
        keys = keys.size(),
        budget_usd = cfg.budget_limit_usd(),
        ceiling = cfg.max_concurrent_requests,
        model = %cfg.gateway_model,
        max_context_tokens = cfg.cost_rate.max_context_tokens,
        "starting bot"
    );

    cab_telegram::router::run_polling(cfg, dispatcher).await?;

    Ok(())
}
