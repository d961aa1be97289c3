//! gitops-promote: record configuration changes in GitOps environment repositories
//!
//! A promotion clones (or forks) an environment repository, applies a
//! caller supplied change, opens or updates one pull request for it and
//! waits for that pull request to merge.
//!
//! ```no_run
//! use gitops_promote::config::load_default_config;
//! use gitops_promote::context::PromotionContext;
//! use std::path::Path;
//!
//! # async fn run() -> gitops_promote::error::Result<()> {
//! let url = "https://github.com/acme/environment-staging.git";
//! let ctx = PromotionContext::connect(url, load_default_config()?).await?;
//! let request = ctx.request(
//!     Path::new("/tmp/env-staging"),
//!     url,
//!     "delete-myapp",
//!     "Delete myapp",
//!     "Removes myapp from staging",
//! );
//! let remove = |dir: &Path| -> gitops_promote::error::Result<()> {
//!     std::fs::remove_file(dir.join("apps/myapp.yaml"))?;
//!     Ok(())
//! };
//! ctx.promote(&request, &remove).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Promotions against one environment must be serialized by the caller; two
//! concurrent runs with the same title race on the same pull request.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod git;
pub mod platform;
pub mod promote;
pub mod types;
