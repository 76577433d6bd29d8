pub mod api;
pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod model;
pub mod page;
pub mod render;
pub mod wire;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli = cli::GlobalCli::parse_from(
    raw_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskdesk"
  );
  debug!(overrides = cli.rc_overrides.len(), "parsed command line");

  let mut cfg = config::Config::load(
    cli.taskdeskrc.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let renderer =
    render::Renderer::new(&cfg)?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(
    commands::dispatch(
      &store,
      &cfg,
      &renderer,
      cli.command
    )
  )?;

  info!("done");
  Ok(())
}
