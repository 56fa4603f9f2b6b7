use clap::Parser;
use proxy::config::Config;
use proxy::listener::{Protocol, ProxyInstance};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug, Clone)]
#[command(name = "dbrwproxy")]
struct ProxyArgs {
    /// Path to the YAML config file describing every proxy instance.
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,
}

/// Waits for any of the termination signals the original proxy responded
/// to (interrupt, terminate, hangup, quit) and returns once one arrives.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut hangup = signal(SignalKind::hangup()).expect("install SIGHUP handler");
    let mut quit = signal(SignalKind::quit()).expect("install SIGQUIT handler");

    tokio::select! {
        _ = interrupt.recv() => info!("received SIGINT"),
        _ = terminate.recv() => info!("received SIGTERM"),
        _ = hangup.recv() => info!("received SIGHUP"),
        _ = quit.recv() => info!("received SIGQUIT"),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ProxyArgs::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("DEBUG"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_line_number(true)
        .init();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, path = %args.config.display(), "failed to load config");
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("dbrwproxy")
        .build()?;

    runtime.block_on(async move {
        let mut instances = Vec::new();
        for proxy in &config.postgres_proxies {
            match ProxyInstance::bind(Protocol::Postgres, proxy).await {
                Ok(instance) => instances.push(instance),
                Err(e) => error!(proxy = %proxy.name, error = %e, "failed to start postgres proxy instance"),
            }
        }
        for proxy in &config.mysql_proxies {
            match ProxyInstance::bind(Protocol::MySql, proxy).await {
                Ok(instance) => instances.push(instance),
                Err(e) => error!(proxy = %proxy.name, error = %e, "failed to start mysql proxy instance"),
            }
        }

        for instance in &instances {
            info!(instance = %instance.name, "proxy instance listening");
        }

        let serving = futures::future::join_all(instances.iter().map(|i| i.serve()));
        tokio::select! {
            _ = serving => {}
            _ = shutdown_signal() => {
                info!("shutting down, closing all replica pools");
                for instance in &instances {
                    instance.close().await;
                }
            }
        }
    });

    // the original proxy this replaces always exits with status 1, even on
    // a clean shutdown; that behavior is kept deliberately (see DESIGN.md)
    std::process::exit(1);
}
