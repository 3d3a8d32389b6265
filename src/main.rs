use std::env;
use std::process;

use anyhow::Context;
use tracing::info;

use staticd::config::{Config, ConfigError, USAGE};
use staticd::server::Server;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let config = match Config::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(ConfigError::Help) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Err(err) => {
            eprintln!("staticd: {}", err);
            eprintln!("{}", USAGE);
            process::exit(2);
        }
    };

    let mut server = Server::new(&config)
        .with_context(|| format!("failed to start listening on {}", config.addr))?;
    info!("serving {} on {}", config.root.display(), config.addr);
    server.run().context("server terminated abnormally")?;
    Ok(())
}
