//! Demo server exercising the Raygun middleware against a few failing routes.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::io;
use std::net::SocketAddr;

use actix_raygun::domain::ApiKey;
use actix_raygun::middleware::{Notify, Recover, ReportContextExt};
use actix_raygun::{Manager, RaygunTransportSettings, ReporterOptions};
use actix_web::error::{ErrorInternalServerError, ErrorNotFound};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use clap::Parser;
use reqwest::Url;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const SILENT_PLACEHOLDER_KEY: &str = "silent";

/// `demo-server` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "demo-server",
    about = "Serve routes that fail in different ways and report them to Raygun",
    version
)]
struct CliArgs {
    /// Raygun application API key. Reports are printed instead of sent when omitted.
    #[arg(long = "api-key", value_name = "key")]
    api_key: Option<String>,
    /// Address to listen on.
    #[arg(long = "bind", value_name = "addr", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,
    /// Application version attached to every report.
    #[arg(long = "app-version", value_name = "version")]
    app_version: Option<String>,
    /// Override the Raygun entries endpoint.
    #[arg(long = "endpoint", value_name = "url")]
    endpoint: Option<Url>,
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let manager = build_manager(&args)?;
    info!(bind = %args.bind, silent = manager.options().is_silent(), "starting demo server");

    HttpServer::new(move || {
        App::new()
            .wrap(Recover::new())
            .wrap(Notify::new(manager.clone()))
            .route("/ok", web::get().to(ok))
            .route("/missing", web::get().to(missing))
            .route("/fail", web::get().to(fail))
            .route("/panic", web::get().to(panicking))
    })
    .bind(args.bind)?
    .run()
    .await
}

fn build_manager(args: &CliArgs) -> io::Result<Manager> {
    let silent = args.api_key.is_none();
    let raw_key = args.api_key.as_deref().unwrap_or(SILENT_PLACEHOLDER_KEY);
    let api_key = ApiKey::try_new(raw_key)
        .map_err(|error| io::Error::other(format!("invalid API key: {error}")))?;

    let mut builder = ReporterOptions::builder().silent(silent);
    if let Some(version) = &args.app_version {
        builder = builder.version(version.as_str());
    }
    let settings = args
        .endpoint
        .clone()
        .map_or_else(RaygunTransportSettings::default, RaygunTransportSettings::with_endpoint);

    Manager::raygun(api_key, builder.build(), settings)
        .map_err(|error| io::Error::other(format!("create Raygun transport: {error}")))
}

async fn ok() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn missing() -> actix_web::Result<HttpResponse> {
    Err(ErrorNotFound("no such resource"))
}

async fn fail(req: HttpRequest) -> actix_web::Result<HttpResponse> {
    req.report_tag("demo");
    req.report_custom_data(json!({ "route": "/fail" }));
    Err(ErrorInternalServerError("simulated outage"))
}

async fn panicking() -> HttpResponse {
    panic!("demo handler panicked")
}
