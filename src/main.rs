use sso_web::{Config, FluentRouter, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let env = std::env::var("RUST_ENV").unwrap_or_default();
    if matches!(env.as_str(), "" | "dev" | "development") {
        // A missing .env is fine.
        let _ = dotenvy::dotenv();
    }

    let config = Config::from_rust_env()?;
    config.setup_tracing();

    FluentRouter::new(config)?
        .setup_pipeline()?
        .setup_default_routes()
        .start()
        .await
}
