use colored::Colorize;
use trawler::commands::command_argument_builder;
use trawler::handlers::{handle_crawl, init_logging};

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    init_logging(verbose, quiet);

    match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => match handle_crawl(primary_command, quiet).await {
            Ok(true) => {}
            Ok(false) => std::process::exit(1),
            Err(e) => {
                eprintln!("{} {:#}", "✗".red().bold(), e);
                std::process::exit(1);
            }
        },
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
