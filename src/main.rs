use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use trend_pipeline::{
    app::{ComponentRegistry, build_router},
    config::Config,
};

/// Health check against the local HTTP server, used as the container's
/// `HEALTHCHECK` command instead of shelling out to `curl`.
/// Returns exit code 0 on success, 1 on failure.
async fn run_healthcheck() -> i32 {
    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let url = format!("http://127.0.0.1:{port}/health/live");

    let client = match reqwest::Client::builder().timeout(Duration::from_secs(5)).build() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("healthcheck failed: failed to create client: {e}");
            return 1;
        }
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => 0,
        Ok(resp) => {
            eprintln!("healthcheck failed: status {}", resp.status());
            1
        }
        Err(e) => {
            eprintln!("healthcheck failed: {e}");
            1
        }
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                column = location.column(),
                message,
                "panic occurred"
            );
        } else {
            error!(thread = thread_name, message, "panic occurred without location information");
        }
    }));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() > 1 && args[1] == "healthcheck" {
        std::process::exit(run_healthcheck().await);
    }

    install_panic_hook();

    // Tracing initialization happens inside `Telemetry::new`, called from
    // `ComponentRegistry::build`.
    let config = Config::from_env().context("failed to load configuration")?;
    let bind_addr = config.http_bind();

    let registry = Arc::new(
        ComponentRegistry::build(config)
            .await
            .context("failed to build component registry")?,
    );
    let schedulers = registry.spawn_schedulers();

    let router = build_router(Arc::clone(&registry));

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {bind_addr}"))?;

    info!(%bind_addr, "listening");

    if let Err(error) = axum::serve(listener, router).await {
        warn!(error = %error, "server exited with error");
    }

    for handle in schedulers {
        handle.abort();
    }
    registry.shutdown().await;

    Ok(())
}
