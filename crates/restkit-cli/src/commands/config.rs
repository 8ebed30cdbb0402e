//! `restkit config` command implementation.

use anyhow::{Context, Result};
use clap::Args;
use console::style;

use crate::settings::LoadedConfig;

/// Arguments for the `config` command.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Print only the source path of the resolved config.
    #[arg(long)]
    pub path: bool,
}

pub fn run(args: &ConfigArgs, loaded: &LoadedConfig) -> Result<()> {
    let source = match &loaded.source {
        Some(path) => path.display().to_string(),
        None => "<defaults>".to_string(),
    };

    if args.path {
        println!("{source}");
        return Ok(());
    }

    eprintln!("{} Config source: {}", style("→").cyan(), style(&source).bold());
    println!("{}", render(loaded)?);
    Ok(())
}

fn render(loaded: &LoadedConfig) -> Result<String> {
    toml::to_string_pretty(&loaded.config).context("failed to render config")
}

#[cfg(test)]
mod tests {
    use restkit_core::Config;

    use super::*;

    #[test]
    fn test_render_round_trips_defaults() {
        let loaded = LoadedConfig {
            config: Config::default(),
            source: None,
        };

        let rendered = render(&loaded).unwrap();

        assert!(rendered.contains("[batch]"));
        assert!(rendered.contains("max_concurrent_requests = 5"));
        assert_eq!(Config::from_toml(&rendered).unwrap(), loaded.config);
    }
}
