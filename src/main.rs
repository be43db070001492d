use audit_grid::audit::checks::CheckRegistry;
use audit_grid::audit::engine::AuditEngine;
use audit_grid::config::Cli;
use audit_grid::coordinator::{Collaborators, Coordinator};
use audit_grid::crawl::spider::HttpSpider;
use audit_grid::membership::broker::{Broker, HttpBroker};
use audit_grid::rpc::client::HttpInstanceClient;
use audit_grid::rpc::handlers::router;
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config = cli.node_config()?;

    let broker = config
        .grid
        .broker
        .clone()
        .filter(|_| config.grid.enabled)
        .map(|url| Arc::new(HttpBroker::new(url)) as Arc<dyn Broker>);

    let coordinator = Coordinator::new(
        config,
        Collaborators {
            client: Arc::new(HttpInstanceClient::new()),
            spider: Arc::new(HttpSpider::new()),
            auditor: AuditEngine::new(
                CheckRegistry::with_builtin_checks(),
                cli.audit_concurrency,
            ),
            broker,
        },
    );

    // 1. HTTP server:
    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    tracing::info!(
        "Node listening on {} (reachable as {})",
        cli.bind,
        coordinator.self_url()
    );
    if cli.instance_token.is_none() {
        tracing::info!("Instance token: {}", coordinator.instance_token());
    }

    let app = router(coordinator.clone());
    let server = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal(coordinator))
                .await
        })
    };

    // 2. Master scan, when a target is given:
    if cli.target.is_some() {
        let mut handles = Vec::new();
        for offer in cli.workers.clone() {
            handles.push(coordinator.enslave(offer).await?);
        }
        for handle in handles {
            if !handle.wait().await {
                tracing::warn!("A directly listed worker could not be enrolled");
            }
        }

        let report = coordinator.run().await?;

        println!(
            "Scan finished: {} workers, {} URLs, {} elements, {} issues",
            report.workers,
            report.urls,
            report.elements,
            report.issues.len()
        );
        for issue in &report.issues {
            println!(
                "[{:?}] {} {} ({}): {}",
                issue.severity, issue.check, issue.url, issue.element, issue.description
            );
        }

        coordinator.request_shutdown();
    } else {
        if !cli.workers.is_empty() {
            tracing::warn!("--worker is ignored without --target");
        }
        tracing::info!("Waiting to be enrolled by a master");
        tracing::info!("Press Ctrl+C to shutdown");
    }

    server.await??;

    Ok(())
}

async fn shutdown_signal(coordinator: Arc<Coordinator>) {
    let mut requested = coordinator.subscribe_shutdown();

    tokio::select! {
        _ = async { requested.wait_for(|stop| *stop).await.is_ok() } => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    tracing::info!("Shutting down");
}
