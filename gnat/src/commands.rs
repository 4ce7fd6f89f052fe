use crate::CLAP_STYLING;
use clap::{ArgAction, arg, command};
use gnat_core::config::DEFAULT_CONFIG_PATH;
use std::path::PathBuf;
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("gnat")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("gnat")
        .about("A bounded crawler that maps injectable parameters for XSS testing")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log verbosity (-v info, -vv debug, -vvv trace)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Writes a default gnat config file")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location of the config file")
                        .default_value(DEFAULT_CONFIG_PATH),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing config file at the specified location.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a host or collection of hosts and report every parameter worth \
                injecting into.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The URL to crawl")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of URLs to crawl")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Config file to use (default: ~/.config/gnat/config.json if present)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("How many links deep to follow from the seed")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-w --"width" <BUDGET>)
                        .required(false)
                        .help("Stop after this many attack surfaces or parameter entries (0 = unbounded)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of concurrent fetches in the worker pool.")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"external")
                        .required(false)
                        .help("Follow links to other hosts (default: stay on the seed's host)")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    arg!(-b --"blacklist" <PATTERN>)
                        .required(false)
                        .help("Regex of URLs never to crawl; may be repeated")
                        .action(ArgAction::Append),
                )
                .arg(
                    arg!(--"blacklist-file" <PATH>)
                        .required(false)
                        .help("Newline-delimited file of blacklist patterns")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(["text", "json", "markdown"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"no-progress")
                        .required(false)
                        .help("Disable the progress spinner")
                        .action(ArgAction::SetTrue),
                ),
        )
}
