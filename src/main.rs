use clap::{Arg, Command};
use log::LevelFilter;
use phishgate::{server, Analyzer, Config, ParsedMessage};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let matches = Command::new("phishgate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Phishing verdicts from header, URL and body heuristics fused with ML and URL reputation")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("EML")
                .help("Analyze a raw RFC 822 message file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("text")
                .short('t')
                .long("text")
                .value_name("BODY")
                .help("Analyze a plain-text body")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("subject")
                .long("subject")
                .value_name("SUBJECT")
                .help("Subject used with --text")
                .default_value(""),
        )
        .arg(
            Arg::new("from-addr")
                .long("from-addr")
                .value_name("ADDRESS")
                .help("Sender address used with --text")
                .default_value(""),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/phishgate.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .value_name("FILE")
                .help("Text model JSON file (overrides classifier.model_path)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("serve")
                .long("serve")
                .value_name("ADDR")
                .help("Run the HTTP scan service on ADDR (e.g. 127.0.0.1:8000)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("no-reputation")
                .long("no-reputation")
                .help("Skip URL reputation lookups")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .target(env_logger::Target::Stderr)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map_or("/etc/phishgate.yaml", |s| s.as_str());
    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if let Some(model) = matches.get_one::<String>("model") {
        config.classifier.model_path = Some(model.clone());
    }
    if matches.get_flag("no-reputation") {
        config.reputation.enabled = false;
    }

    let analyzer = match Analyzer::from_config(&config) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("Error building analyzer: {e}");
            process::exit(1);
        }
    };

    if let Some(bind) = matches.get_one::<String>("serve") {
        if let Err(e) = server::serve(Arc::new(analyzer), bind).await {
            eprintln!("Scan service failed: {e}");
            process::exit(1);
        }
        return;
    }

    let message = match (
        matches.get_one::<String>("file"),
        matches.get_one::<String>("text"),
    ) {
        (Some(path), None) => match std::fs::read(path) {
            Ok(raw) => ParsedMessage::parse_eml_bytes(&raw),
            Err(e) => {
                eprintln!("Error reading message file {path}: {e}");
                process::exit(1);
            }
        },
        (None, Some(text)) => {
            let subject = matches.get_one::<String>("subject").map_or("", |s| s.as_str());
            let from_addr = matches.get_one::<String>("from-addr").map_or("", |s| s.as_str());
            ParsedMessage::from_text(subject, from_addr, text)
        }
        _ => {
            eprintln!("Provide exactly one of --file or --text");
            process::exit(2);
        }
    };

    let result = analyzer.analyze(&message).await;
    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing result: {e}");
            process::exit(1);
        }
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Set {} to enable URL reputation lookups.", config.reputation.api_key_env);
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
