use colored::Colorize;
use harvester::commands::command_argument_builder;
use harvester::handlers::{
    handle_extract, handle_platforms, handle_serve, init_tracing, load_config,
};
use harvester::print_banner;
use tracing::error;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if let Some(("platforms", _)) = chosen_command.subcommand() {
        handle_platforms();
        return;
    }

    init_tracing();

    let config = match load_config(chosen_command.get_one::<String>("env-file")) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            eprintln!("{} {} ({})", "✗".red().bold(), e, e.kind());
            std::process::exit(1);
        }
    };

    let outcome = match chosen_command.subcommand() {
        Some(("extract", primary_command)) => handle_extract(primary_command, &config).await,
        Some(("serve", primary_command)) => handle_serve(Some(primary_command), &config)
            .await
            .map(|_| 0),
        None => handle_serve(None, &config).await.map(|_| 0),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    match outcome {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}
