use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "material-cooker", version, about = "Cooks .humba/.hderriere materials into GPU pipelines")]
pub struct CliArgs {
  /// Resource root containing res/materials, shader and res/texture_cooked
  #[arg(long, default_value = ".")]
  pub root: PathBuf,

  /// Keep running and recook whenever a material file or dependency changes
  #[arg(long)]
  pub watch: bool,

  /// How often to check for changes in watch mode
  #[arg(long, default_value_t = 500)]
  pub poll_interval_ms: u64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let args = CliArgs::parse_from(["material-cooker"]);
    assert_eq!(args.root, PathBuf::from("."));
    assert!(!args.watch);
    assert_eq!(args.poll_interval_ms, 500);
  }

  #[test]
  fn test_watch_flags() {
    let args = CliArgs::parse_from([
      "material-cooker",
      "--root",
      "game",
      "--watch",
      "--poll-interval-ms",
      "100",
    ]);
    assert_eq!(args.root, PathBuf::from("game"));
    assert!(args.watch);
    assert_eq!(args.poll_interval_ms, 100);
  }
}
