use std::path::Path;
use std::sync::Arc;

use upserve::config::{AppState, Config, SiteConfig};
use upserve::{logger, server, Router};

/// Used when no config path is given; the extension is resolved by `config`
const DEFAULT_CONFIG_PATH: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg.logging)?;

    // Worker threads default to the number of CPU cores
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers.filter(|&w| w > 0) {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    let router = build_router(&cfg.site);
    let state = Arc::new(AppState::new(cfg, router));
    runtime.block_on(server::run(state))
}

fn build_router(site: &SiteConfig) -> Router {
    let mut router = Router::new();

    if let Some(index) = &site.index_file {
        router.serve_index(index.as_str());
    }
    for file in &site.files {
        router.serve_file(file);
    }
    for dir in &site.dirs {
        router.serve_dir(dir);
    }
    for upload in &site.uploads {
        if !Path::new(&upload.storage_dir).is_dir() {
            logger::log_warning(&format!(
                "Upload directory '{}' does not exist, uploads to {} will fail",
                upload.storage_dir, upload.path
            ));
        }
        router.allow_upload(
            &upload.path,
            &upload.form_key,
            upload.storage_dir.as_str(),
            |stored: &Path, original: &str| {
                logger::log_debug(&format!(
                    "Upload callback: '{original}' -> {}",
                    stored.display()
                ));
            },
        );
    }

    router
}
