use env_logger::Env;
use gradeboard::{app, config::ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // HOST, PORT, SESSION_TTL_SECS, MAX_UPLOAD_MB, STATIC_DIR
    let config = ServerConfig::from_env()?;

    app::run(config).await?;

    Ok(())
}
