use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use lineaire_cli::{
    bracketed, load_config, load_poem, load_script, replay, select_stanzas, token_table,
    tokenize_poem,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("lineaire")
        .version(lineaire_core::VERSION)
        .about("Poem tokenization and annotation session tools")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("tokenize")
                .about("Split a poem into addressable word tokens")
                .arg(
                    Arg::new("poem")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Poem file, stanzas separated by blank lines"),
                )
                .arg(
                    Arg::new("quick")
                        .long("quick")
                        .num_args(0..=1)
                        .default_missing_value("0")
                        .value_parser(value_parser!(usize))
                        .help("Show only N random stanzas (config default when N is omitted)"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducible quick mode"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("table")
                        .value_parser(["table", "text", "json"])
                        .help("Output format"),
                ),
        )
        .subcommand(
            Command::new("replay")
                .about("Replay an editor command script on a poem and print the workspace")
                .arg(
                    Arg::new("poem")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Poem file"),
                )
                .arg(
                    Arg::new("script")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of editor commands"),
                ),
        )
        .subcommand(Command::new("show-config").about("Print the effective configuration"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;

    match matches.subcommand() {
        Some(("tokenize", args)) => {
            let path = args.get_one::<PathBuf>("poem").context("poem is required")?;
            let poem = load_poem(path)?;
            let quick = args
                .get_one::<usize>("quick")
                .map(|&n| if n == 0 { config.quick_mode_stanzas } else { n });
            let seed = args.get_one::<u64>("seed").copied();

            let selection = select_stanzas(poem.len(), quick, seed);
            tracing::info!(stanzas = poem.len(), ?selection, "tokenizing");
            let tokens = tokenize_poem(&poem, &selection);

            match args.get_one::<String>("format").map(String::as_str) {
                Some("json") => println!("{}", serde_json::to_string_pretty(&tokens)?),
                Some("text") => println!("{}", bracketed(&tokens)),
                _ => print!("{}", token_table(&tokens)),
            }
        }
        Some(("replay", args)) => {
            let poem = load_poem(args.get_one::<PathBuf>("poem").context("poem is required")?)?;
            let script =
                load_script(args.get_one::<PathBuf>("script").context("script is required")?)?;
            let tokens = tokenize_poem(&poem, &lineaire_text::StanzaSelection::All);

            let summary = replay(tokens, config.overlay.clone(), script);
            tracing::info!(
                applied = summary.applied,
                ignored = summary.ignored,
                "script replayed"
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Some(("show-config", _)) => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        _ => {}
    }
    Ok(())
}

fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    if let Err(e) = run(&matches) {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
