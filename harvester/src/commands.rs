use crate::CLAP_STYLING;
use clap::{arg, command};

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("harvester")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("harvester")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(--"env-file" <PATH>)
                .required(false)
                .global(true)
                .help("Load environment variables from this file before reading configuration"),
        )
        .subcommand_required(false)
        .subcommand(
            command!("serve")
                .about("Run the extraction HTTP API (default when no command is given)")
                .arg(
                    arg!(--"host" <HOST>)
                        .required(false)
                        .help("Address to bind (overrides HARVESTER_HOST)"),
                )
                .arg(
                    arg!(-p --"port" <PORT>)
                        .required(false)
                        .help("Port to listen on (overrides PORT)")
                        .value_parser(clap::value_parser!(u16)),
                ),
        )
        .subcommand(
            command!("extract")
                .about(
                    "Run a single extraction in-process: navigate the target page, collect its \
                documents and store them under the bucket prefix.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The solicitation page to extract documents from"),
                )
                .arg(
                    arg!(-b --"bucket" <BUCKET>)
                        .required(true)
                        .help("Destination bucket"),
                )
                .arg(
                    arg!(-p --"prefix" <PREFIX>)
                        .required(true)
                        .help("Destination key prefix"),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the result as JSON instead of a summary")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(command!("platforms").about("List the known platform host patterns"))
}
