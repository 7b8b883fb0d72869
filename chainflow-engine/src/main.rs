use chainflow_engine::functions::hello_world;
use chainflow_engine::{logging, serve, Client, DurableResult, EngineConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    logging::init_from_env();

    if let Err(e) = run().await {
        error!(error = %e, "Engine stopped");
        std::process::exit(1);
    }
}

async fn run() -> DurableResult<()> {
    info!("Starting chainflow engine...");

    let config = EngineConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    let mut client = Client::new(config.client_opts()).map_err(|e| {
        error!(error = %e, "Failed to create client");
        e
    })?;

    info!("Registering function...");
    let function = hello_world::register(&mut client, &config.trigger_event).map_err(|e| {
        error!(error = %e, "Failed to create function");
        e
    })?;
    info!(
        id = function.id(),
        name = function.name(),
        trigger = %function.trigger(),
        "Function created"
    );

    info!(
        base_url = %config.base_url,
        register_url = %config.register_url(),
        function_url = %config.function_url,
        dev = config.dev,
        app_id = %config.app_id,
        "Configuration"
    );

    let listener = serve::bind(config.listen_addr).await?;

    info!("Starting HTTP server on {}...", config.listen_addr);
    info!("Server will handle:");
    info!("  - Function invocations: POST {}", config.function_url);
    info!("  - Function registration: PUT {} (from the orchestrator)", config.function_url);
    info!("  - Function inspection: GET {}", config.function_url);
    info!(
        "Waiting for the orchestrator at {} to discover and invoke functions...",
        config.base_url
    );

    serve::serve(listener, client.serve()).await
}
