//! Layered application configuration example.
//!
//! Reads a small application config from the command line, the `FOO_*`
//! environment variables, a `.env` file in the working directory and
//! `~/.config/foo/config.toml`, in that order of priority.
//!
//! # Usage
//!
//! ```bash
//! echo 'FOO_DB_PASSWORD=secr3t' > .env
//! mkdir -p ~/.config/foo && printf '[cfg.db]\nport = 9999\n' > ~/.config/foo/config.toml
//! FOO_VERBOSE=1 cargo run -p cligram-sources --example appconfig -- cfg --debug db --host myhost.com
//! ```

use std::path::PathBuf;

use cligram_core::{CommandSchema, ParamSchema, ValueType};
use cligram_sources::Layered;

fn schema() -> CommandSchema {
    CommandSchema::new("cfg")
        .with_description("Example application configuration")
        .with_param(ParamSchema::switch(["--debug"]).with_description("Debug mode"))
        .with_param(ParamSchema::switch(["--verbose", "-v"]).with_description("Verbose output?"))
        .with_subcommand(
            CommandSchema::new("db")
                .with_param(ParamSchema::option(["--host"]).with_default("localhost"))
                .with_param(ParamSchema::option(["--port"]).with_type(ValueType::Integer).with_default(5432))
                .with_param(ParamSchema::option(["--password"])),
        )
}

fn config_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".config/foo/config.toml")
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut builder = Layered::builder();
    if !args.is_empty() {
        builder = builder.with_cli(args);
    }
    let layered = builder
        .with_env("foo")
        .with_env_file(".env", "foo")
        .with_toml(config_path())
        .build(&schema());

    let resolution = match layered.and_then(|layered| layered.read()) {
        Ok(resolution) => resolution,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    println!("Resolved configuration:");
    for (path, origin) in &resolution.origins {
        let value = resolution
            .value
            .get_path(path)
            .map(|value| format!("{value:?}"))
            .unwrap_or_default();
        println!("  {path:<12} = {value:<28} (from {})", origin.source);
    }
}
