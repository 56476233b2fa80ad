use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};

mod cli;
mod util;
mod cmd_append;
mod cmd_page;
mod cmd_populate;
mod cmd_get;
mod cmd_status;
mod cmd_metrics;

fn init_logger() {
    // RUST_LOG wins; default is info. Example: RUST_LOG=debug pagemark page ...
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Append { path, text, contributor, strategy, json } =>
            cmd_append::exec(path, text, contributor, strategy, json),

        cli::Cmd::Page { path, bookmark, page_size, strategy, json } =>
            cmd_page::exec(path, bookmark, page_size, strategy, json),

        cli::Cmd::Populate { path, count, contributor, strategy, same_instant } =>
            cmd_populate::exec(path, count, contributor, strategy, same_instant),

        cli::Cmd::Get { path, id, json } =>
            cmd_get::exec(path, id, json),

        cli::Cmd::Status { path, json } =>
            cmd_status::exec(path, json),

        cli::Cmd::Metrics { path, json } =>
            cmd_metrics::exec(path, json),
    }
}
