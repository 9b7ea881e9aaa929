mod store_cmd;

use bridge_kit::{get_default_config_path, init_logging};
use clap::{Arg, ArgAction, Command};
use discord_bridge::BridgeConfig;
use log::*;
use std::path::PathBuf;
use store_cmd::*;

fn main() -> std::result::Result<(), String> {
    if let Err(err) = init_logging("bridge-cli", false) {
        eprintln!("init logging failed: {}", err);
    }

    let matches = Command::new("discord bridge control tool")
        .about("inspect the puppet and user store of a discord bridge")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("bridge config file, default <root>/etc/config.toml")
                .required(false),
        )
        .subcommand(
            Command::new("puppets").about("list puppets").arg(
                Arg::new("claimed")
                    .long("claimed")
                    .help("only puppets claimed by a local account")
                    .action(ArgAction::SetTrue),
            ),
        )
        .subcommand(
            Command::new("puppet")
                .about("show one puppet")
                .arg(Arg::new("id").help("remote user id").required(true)),
        )
        .subcommand(
            Command::new("parse-mxid")
                .about("print the remote id behind a ghost user id")
                .arg(Arg::new("mxid").help("matrix user id").required(true)),
        )
        .subcommand(Command::new("users").about("list logged in users"))
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(get_default_config_path);
    let config = BridgeConfig::load_from_file(&config_path).map_err(|err| {
        println!("load config {} failed! {}", config_path.display(), err);
        format!("load config failed: {}", err)
    })?;
    debug!("using config {}", config_path.display());

    match matches.subcommand() {
        Some(("puppets", matches)) => list_puppets(&config, matches.get_flag("claimed")),
        Some(("puppet", matches)) => {
            // required by clap
            let id = matches.get_one::<String>("id").cloned().unwrap_or_default();
            show_puppet(&config, &id)
        }
        Some(("parse-mxid", matches)) => {
            let mxid = matches.get_one::<String>("mxid").cloned().unwrap_or_default();
            parse_mxid(&config, &mxid)
        }
        Some(("users", _)) => list_users(&config),
        _ => Err("unknown command".to_string()),
    }
}
