use colored::Colorize;

pub mod commands;
pub mod handlers;

pub use handlers::{build_request, exit_code_for, render_platforms, render_result};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn print_banner() {
    eprintln!(
        "{}",
        r#"
  _                             _
 | |__   __ _ _ ____   _____  __| |_ ___ _ __
 | '_ \ / _` | '__\ \ / / _ \/ __| __/ _ \ '__|
 | | | | (_| | |   \ V /  __/\__ \ ||  __/ |
 |_| |_|\__,_|_|    \_/ \___||___/\__\___|_|
"#
        .bright_green()
    );
    eprintln!(
        "  {} v{}\n",
        "document extraction".bright_black(),
        env!("CARGO_PKG_VERSION")
    );
}
