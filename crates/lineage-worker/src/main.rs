//! Lineage headless worker
//!
//! Opens the project named by `LINEAGE_PROJECT_ROOT`, reconciles the whole
//! tree with disk and reports which work version each scene file given on
//! the command line belongs to.

use lineage_registry::{LocalFileSystem, Registry, RegistryConfig, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "lineage_worker=info,lineage_registry=info".to_string()),
        )
        .init();

    info!("Using lineage version: {}", lineage::version());
    let config = RegistryConfig::from_env()?;
    let registry = Registry::open(LocalFileSystem::new(), config).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling scan");
            on_signal.cancel();
        }
    });

    let report = match registry.scan_tree(&cancel).await {
        Ok(report) => report,
        Err(err) => {
            error!("Scan failed: {}", err);
            return Err(err);
        }
    };
    if report.partial {
        for path in &report.skipped {
            warn!(path = %path.display(), "Skipped during scan");
        }
    }
    info!(
        added = report.added_versions,
        missing = report.flagged_missing,
        "Scan complete"
    );

    for scene in std::env::args().skip(1) {
        match registry.find_work_by_absolute_path(&scene) {
            Some((work, version)) => info!(
                scene = %scene,
                work = work.path(),
                version = version.number,
                user = %version.user,
                "Resolved scene"
            ),
            None => warn!(scene = %scene, "Scene is not a registered work version"),
        }
    }

    Ok(())
}
