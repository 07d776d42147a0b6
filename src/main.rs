use inferd::cli::{parse_args, ParseOutcome, HELP_TEXT};
use inferd::config::ServerConfig;
use inferd::server::Server;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut config = ServerConfig::from_env();
    match parse_args(&mut config, std::env::args()) {
        Ok(ParseOutcome::Help) => {
            print!("{HELP_TEXT}");
            std::process::exit(0);
        }
        Ok(ParseOutcome::Run) => {}
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    }
    if let Err(e) = config.validate() {
        log::error!("invalid configuration: {e}");
        std::process::exit(1);
    }

    log::info!(
        "starting inferd: repository={}, workers={}, http={}, grpc={}",
        config.model_repository.display(),
        config.worker_library_dir.display(),
        config.http_port,
        config.grpc_port
    );

    let server = Server::new(config, tokio::runtime::Handle::current());

    match server.load_repository() {
        Ok(endpoints) => log::info!("loaded {} endpoint(s): {:?}", endpoints.len(), endpoints),
        Err(e) => log::warn!("failed to load model repository: {e}"),
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {e}");
    }
    log::info!("shutting down");
}
