pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod create_view;
pub mod datetime;
pub mod edit;
pub mod filter;
pub mod list_view;
pub mod platform;
pub mod render;
pub mod search;

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
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskdesk CLI"
  );
  debug!(?cli.overrides, "rc overrides from command line");

  let mut cfg = config::Config::load(
    cli.rc_file.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );

  let settings =
    api::ApiSettings::from_config(&cfg)
      .context(
        "invalid api settings"
      )?;
  let client =
    api::HttpTaskApi::new(&settings)?;
  info!(base = %settings.base_url, "task api configured");

  let mut renderer =
    render::Renderer::new(&cfg)?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(commands::dispatch(
    client,
    &mut renderer,
    cli.command
  ))?;

  info!("done");
  Ok(())
}
