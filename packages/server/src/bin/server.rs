//! hiroba event server.
//!
//! Streams room/user events over SSE and serializes AI generation requests per provider.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-server
//! cargo run --bin hiroba-server -- --port 3000 --provider openai=https://api.openai.com/v1
//! ```

use std::sync::Arc;

use clap::Parser;
use hiroba_server::{
    config::{ServerArgs, ServerConfig},
    infrastructure::{provider::OpenAiCompatibleExecutor, registry::ConnectionRegistry},
    ui::{AppState, Server},
    usecase::{BroadcastRouter, QueueManager, RoomNotifier},
};
use hiroba_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let config = ServerConfig::from(ServerArgs::parse());

    // Initialize dependencies in order:
    // 1. ConnectionRegistry
    // 2. HTTP client and provider executors
    // 3. QueueManager
    // 4. AppState
    // 5. Server

    // 1. Create ConnectionRegistry (in-memory)
    let registry = ConnectionRegistry::new(config.registry.clone());

    // 2. Create the shared HTTP client
    let http_client = match reqwest::Client::builder()
        .timeout(config.queue.request_timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    // 3. Create QueueManager with one queue per provider
    let mut queue_manager = QueueManager::new(config.queue.clone());
    for provider in &config.providers {
        tracing::info!("Provider '{}' -> {}", provider.name, provider.base_url);
        queue_manager.register_provider(
            provider.name.clone(),
            Arc::new(OpenAiCompatibleExecutor::new(
                http_client.clone(),
                provider.base_url.clone(),
            )),
        );
    }

    let provider_names: Vec<String> = queue_manager
        .providers()
        .iter()
        .map(ToString::to_string)
        .collect();
    tracing::info!("Queues ready for providers: {}", provider_names.join(", "));

    // 4. Create AppState
    let notifier = Arc::new(RoomNotifier::new(Arc::new(BroadcastRouter::new(
        registry.clone(),
    ))));
    let state = AppState::new(registry, Arc::new(queue_manager), notifier);

    // 5. Run the server
    if let Err(e) = Server::new(state).run(&config.bind_addr()).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
