use anyhow::Result;
use env_logger::Env;
use nbp_rates::config::Config;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    log::debug!("Loaded config: {config:#?}");

    if let Err(e) = nbp_rates::server::run(config).await {
        log::error!("Application failed: {e:#}");
        return Err(e);
    }

    Ok(())
}
