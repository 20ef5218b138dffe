use clap::Parser;

use coderun::config::CliArgs;
use coderun::web_server::build_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config()?;

    let workspace_root = config.workspace_root();
    if !workspace_root.is_dir() {
        log::error!("Workspace root {} is not a directory", workspace_root.display());
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("workspace root {} does not exist", workspace_root.display()),
        ));
    }

    log::info!(
        "Serving languages: {}",
        config.languages.supported().join(", ")
    );
    for (language, program) in config.languages.missing_toolchains() {
        log::warn!("{program} not found on PATH, {language} submissions will fail");
    }

    // ======= PREPARATION END, EXECUTION START =======

    let server = build_server(config)?;
    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Ctrl-c received, shutting down...");
        }
        res_server = server_task => {
            log::error!("Server terminated unexpectedly: {:?}", res_server);
        }
    }

    server_handle.stop(true).await;

    log::info!("Shutdown complete");
    Ok(())
}
