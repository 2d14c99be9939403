use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("oxford_server=info,tower_http=info")),
        )
        .init();
    let config = oxford_server::config::Config::from_env()?;
    oxford_server::web::start_web_server(config).await
}
