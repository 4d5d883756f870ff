use catalog_indexer::{logging, Dependencies, IndexingError, Settings};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    dotenv::dotenv().ok();

    let settings = Settings::from_env()?;
    logging::init(settings.log_format);

    if let Err(e) = run(&settings).await {
        error!(error = %e, "Catalog indexer stopped");
        return Err(e);
    }
    Ok(())
}

async fn run(settings: &Settings) -> Result<(), IndexingError> {
    let dependencies = Dependencies::new(settings).await?;

    dependencies
        .orchestrator
        .ensure_indexes(&dependencies.indexes)
        .await?;
    info!("Indexes ready");

    dependencies.orchestrator.run().await?;
    Ok(())
}
