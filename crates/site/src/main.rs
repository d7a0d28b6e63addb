//! MSPSRpi catalog site
//!
//! JSON API over the programme's pulsar and publication catalogs, plus a
//! small CLI for inspecting them without starting the server.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use clap::{Parser, Subcommand};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mspsrpi_site::catalog::params;
use mspsrpi_site::config::Config;
use mspsrpi_site::routes;
use mspsrpi_site::state::AppState;

#[derive(Parser)]
#[command(name = "mspsrpi", version, about = "MSPSRpi catalog site")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Load every catalog and print a summary.
    Catalogs,

    /// Run one query against a catalog and print the page as JSON.
    Query {
        /// Catalog id.
        catalog: String,

        /// Case-insensitive search text.
        #[arg(long)]
        search: Option<String>,

        /// Field to sort by.
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending.
        #[arg(long)]
        desc: bool,

        /// Set-membership filter, `field=a|b`. Repeatable.
        #[arg(long = "filter", value_name = "FIELD=VALUES")]
        filters: Vec<String>,

        /// Page number (1-based).
        #[arg(long)]
        page: Option<u32>,

        /// Records per page.
        #[arg(long)]
        per_page: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();

    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Catalogs => {
            let state = AppState::new(&config).await?;
            print_json(&state.catalogs().list())
        }
        Command::Query {
            catalog,
            search,
            sort,
            desc,
            filters,
            page,
            per_page,
        } => {
            let state = AppState::new(&config).await?;
            let definition = state
                .catalogs()
                .get(&catalog)
                .with_context(|| format!("unknown catalog: {catalog}"))?;

            let mut pairs: Vec<(String, String)> = Vec::new();
            if let Some(search) = search {
                pairs.push(("q".into(), search));
            }
            if let Some(sort) = sort {
                pairs.push(("sort".into(), sort));
                let dir = if desc { "desc" } else { "asc" };
                pairs.push(("dir".into(), dir.into()));
            }
            for filter in filters {
                let (field, values) = filter
                    .split_once('=')
                    .with_context(|| format!("filter '{filter}' must look like field=a|b"))?;
                pairs.push((format!("filter.{field}"), values.to_string()));
            }
            if let Some(page) = page {
                pairs.push(("page".into(), page.to_string()));
            }
            if let Some(per_page) = per_page {
                pairs.push(("per_page".into(), per_page.to_string()));
            }

            let query = params::parse(&pairs, definition.page_size)?
                .into_query(definition.default_sort.as_ref());
            let result = state.catalogs().query(&catalog, query)?;
            print_json(&result)
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting MSPSRpi catalog site");
    info!(port = config.port, "Configuration loaded");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let cors = build_cors_layer(&config);

    // TraceLayer wraps CORS so preflight requests are traced too.
    let app = routes::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
