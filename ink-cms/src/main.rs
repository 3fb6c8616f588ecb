use anyhow::Result;
use ink_cms::config::CmsConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,ink_cms=debug")),
        )
        .init();

    let config = CmsConfig::from_env()?;
    let addr = config.bind_addr();
    tracing::info!(env = config.env.as_str(), main_domain = %config.main_domain, "starting inkwell");

    let inkwell = ink_cms::build(config).await?;
    inkwell.ax.listen(addr).await?;

    Ok(())
}
