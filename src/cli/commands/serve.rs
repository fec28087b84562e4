use crate::app;
use crate::config::AppConfig;

pub async fn handle() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    app::serve(config).await
}
