use std::sync::Arc;

use clap::Parser;

use snippetd::config::{CliArgs, Config};
use snippetd::dispatch::Dispatcher;
use snippetd::judge::JudgeClient;
use snippetd::sandbox::LocalRunner;
use snippetd::web_server::build_server;
use snippetd::workspace::WorkspaceRegistry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let Config {
        server: server_config,
        judge: judge_config,
        limits,
        languages,
    } = cli.to_config().expect("Failed to load configuration");

    let local = Arc::new(LocalRunner::new());
    let judge = Arc::new(JudgeClient::new(&judge_config).expect("Failed to build judge client"));
    let dispatcher = Dispatcher::new(languages, local, judge, limits);
    let registry = WorkspaceRegistry::new(Arc::new(dispatcher));

    let server = build_server(server_config, registry).expect("Failed to build server");

    log::info!("snippetd accepting runs");
    server.await?;

    log::info!("Shutdown complete");
    Ok(())
}
