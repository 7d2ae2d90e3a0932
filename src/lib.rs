pub mod models;
pub mod parser;
pub mod conversation;
pub mod render;
pub mod server;
pub mod config;
pub mod llm;
pub mod cli;

use cli::Args;
use config::prompt::load_system_prompt;
use conversation::{ ConversationConfig, ConversationStore };
use log::info;
use render::SectionColorPolicy;
use server::api::AppState;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let llm_config = args.llm_config();

    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("HTTP Port: {}", args.http_port);
    info!("Chat LLM Type: {}", llm_config.llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("(provider default)"));
    info!("Request Shape: {}", args.request_shape);
    info!("Request Timeout: {:?}", args.request_timeout());
    info!("Prompt Path: {}", args.prompt_path.as_deref().unwrap_or("(bundled)"));
    info!("Max Conversations: {}", args.max_conversations);
    info!("API Key Required: {}", args.api_key().is_some());
    info!("-------------------------");

    let client = llm::chat::new_client(&llm_config)?;
    let system_prompt = load_system_prompt(args.prompt_path.as_deref())?;
    let config = ConversationConfig {
        system_prompt,
        request_shape: args.request_shape,
        request_timeout: args.request_timeout(),
    };

    let state = AppState {
        store: Arc::new(ConversationStore::new(client, config, args.max_conversations)),
        policy: Arc::new(SectionColorPolicy::default()),
        api_key: args.api_key().map(Arc::from),
    };

    info!("Starting server on: {}", args.server_addr);
    let server = Server::new(args.server_addr.clone(), args.http_port, state);
    server.run().await?;

    Ok(())
}
