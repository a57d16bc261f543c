mod cli;

use std::{error::Error, time::Duration};

use clap::Parser;
use vulkano_materials::{
  MaterialOrganizer,
  ResourcePaths,
  render::{backend::VulkanoBackend, init::initialize_headless},
};

use crate::cli::CliArgs;

fn main() -> Result<(), Box<dyn Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let args = CliArgs::parse();
  let paths = ResourcePaths::rooted_at(&args.root);
  tracing::info!("Resource root: {:?}", args.root);

  let backend = VulkanoBackend::new(initialize_headless()?)?;
  let mut organizer = MaterialOrganizer::new(backend, paths);

  let loaded = organizer.load_directory();
  let cooked = organizer.cook_all();
  // Nothing is in flight without a renderer.
  organizer.backend_mut().flush_deletion_queue();

  if !args.watch {
    if loaded.failed + cooked.failed > 0 {
      return Err(
        format!(
          "{} material files failed to load, {} bases failed to cook",
          loaded.failed, cooked.failed
        )
        .into(),
      );
    }
    return Ok(());
  }

  tracing::info!("Watching for changes every {} ms", args.poll_interval_ms);
  let interval = Duration::from_millis(args.poll_interval_ms);
  loop {
    std::thread::sleep(interval);
    if organizer.poll_reloads().is_some() {
      organizer.backend_mut().flush_deletion_queue();
    }
  }
}
