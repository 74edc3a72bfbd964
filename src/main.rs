use boxfit::api::{self, ApiState};
use boxfit::config::AppConfig;
use log::{error, info, warn};

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    let state = ApiState {
        planner: app_config.planner,
        corners: app_config.corners,
        depth: app_config.depth,
    };

    info!("boxfit {} starting", env!("CARGO_PKG_VERSION"));
    if let Err(err) = api::start_api_server(app_config.api, state).await {
        error!("API server terminated with an error: {}", err);
        std::process::exit(1);
    }
}
