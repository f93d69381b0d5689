//! Raygun crash reporting for actix-web applications.
//!
//! Two middleware factories do the work. [`middleware::Recover`] turns a
//! panicking handler into a 500 response and keeps the panic-site stack
//! trace. [`middleware::Notify`] watches every response and hands server
//! faults to a [`Manager`], which builds a report and submits it through a
//! [`domain::ports::ReportTransport`].
//!
//! ```no_run
//! use actix_raygun::domain::ApiKey;
//! use actix_raygun::middleware::{Notify, Recover};
//! use actix_raygun::{Manager, RaygunTransportSettings, ReporterOptions};
//! use actix_web::{App, HttpServer};
//!
//! # async fn run() -> std::io::Result<()> {
//! let manager = Manager::raygun(
//!     ApiKey::try_new("my-api-key").unwrap(),
//!     ReporterOptions::builder().version("1.0.0").build(),
//!     RaygunTransportSettings::default(),
//! )
//! .unwrap();
//!
//! HttpServer::new(move || {
//!     App::new()
//!         .wrap(Recover::new())
//!         .wrap(Notify::new(manager.clone()))
//! })
//! .bind(("127.0.0.1", 8080))?
//! .run()
//! .await
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod manager;
pub mod middleware;
pub mod outbound;
pub mod skip;

pub use config::{ReporterOptions, ReporterOptionsBuilder, UserResolver};
pub use manager::{Manager, ReportOutcome};
pub use outbound::raygun::RaygunTransportSettings;
pub use skip::SkipPolicy;
