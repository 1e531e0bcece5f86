use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use ollama_proxy_client::models::{ConversationTurn, GenerationOptions, Role};
use ollama_proxy_client::{init_logging, server, ClientConfig, GenerationResult, InferenceClient};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;

fn cli() -> Command {
    Command::new("ollama-proxy-client")
        .version("0.1.0")
        .about("Client and HTTP proxy for a local Ollama inference server")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON file with client configuration (defaults to OLLAMA_* environment variables)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .help("Inference server host")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .help("Inference server port")
                .value_parser(clap::value_parser!(u16))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .help("Default model")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .help("Generation timeout in milliseconds")
                .value_parser(clap::value_parser!(u64))
                .action(ArgAction::Set),
        )
        .subcommand(Command::new("health").about("Check whether the server answers"))
        .subcommand(Command::new("models").about("List installed models"))
        .subcommand(Command::new("status").about("Summarize server state"))
        .subcommand(
            Command::new("show")
                .about("Show the server's record for one model")
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate a completion for a prompt")
                .arg(Arg::new("prompt").required(true))
                .arg(
                    Arg::new("temperature")
                        .long("temperature")
                        .value_parser(clap::value_parser!(f64))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("max-tokens")
                        .long("max-tokens")
                        .value_parser(clap::value_parser!(u32))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("top-p")
                        .long("top-p")
                        .value_parser(clap::value_parser!(f64))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("stop")
                        .long("stop")
                        .help("Stop sequence (repeatable)")
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("chat")
                .about("Continue a conversation; messages alternate user/assistant, starting with user")
                .arg(
                    Arg::new("messages")
                        .required(true)
                        .num_args(1..)
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("serve").about("Run the HTTP proxy").arg(
                Arg::new("listen")
                    .long("listen")
                    .value_name("ADDR")
                    .default_value("0.0.0.0:3000")
                    .value_parser(clap::value_parser!(SocketAddr))
                    .action(ArgAction::Set),
            ),
        )
}

fn load_config(matches: &ArgMatches) -> Result<ClientConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?
        }
        None => ClientConfig::from_env()?,
    };
    if let Some(host) = matches.get_one::<String>("host") {
        config = config.with_host(host.clone());
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config = config.with_port(*port);
    }
    if let Some(model) = matches.get_one::<String>("model") {
        config = config.with_default_model(model.clone());
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout-ms") {
        config = config.with_timeout_ms(*timeout);
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn finish(result: GenerationResult) -> Result<()> {
    print_json(&result)?;
    if let GenerationResult::Failure(failure) = result {
        bail!(failure.message);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let matches = cli().get_matches();
    let client = InferenceClient::new(load_config(&matches)?)?;

    match matches.subcommand() {
        Some(("health", _)) => {
            let healthy = client.check_health().await;
            print_json(&json!({ "healthy": healthy, "url": client.base_url() }))?;
            if !healthy {
                bail!("inference server at {} is not reachable", client.base_url());
            }
        }
        Some(("models", _)) => {
            let models = client.list_models().await?;
            let listing: Vec<_> = models
                .iter()
                .map(|m| json!({ "name": m.name, "size": m.size_bytes, "size_display": m.display_size() }))
                .collect();
            print_json(&json!({ "count": listing.len(), "models": listing }))?;
        }
        Some(("status", _)) => print_json(&client.status().await)?,
        Some(("show", sub)) => {
            let name = sub.get_one::<String>("name").context("model name is required")?;
            print_json(&client.model_info(name).await?)?;
        }
        Some(("generate", sub)) => {
            let prompt = sub.get_one::<String>("prompt").context("prompt is required")?;
            let options = GenerationOptions {
                model: None,
                temperature: sub.get_one::<f64>("temperature").copied(),
                max_tokens: sub.get_one::<u32>("max-tokens").copied(),
                top_p: sub.get_one::<f64>("top-p").copied(),
                stop_sequences: sub
                    .get_many::<String>("stop")
                    .map(|values| values.cloned().collect()),
            };
            finish(client.generate(prompt, &options).await)?;
        }
        Some(("chat", sub)) => {
            let turns: Vec<ConversationTurn> = sub
                .get_many::<String>("messages")
                .context("at least one message is required")?
                .enumerate()
                .map(|(i, content)| {
                    let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                    ConversationTurn::new(role, content.clone())
                })
                .collect();
            finish(client.chat(&turns, None).await)?;
        }
        Some(("serve", sub)) => {
            let listen = *sub
                .get_one::<SocketAddr>("listen")
                .context("listen address is required")?;
            server::serve(Arc::new(client), listen).await?;
        }
        Some((other, _)) => bail!("unknown command: {}", other),
        None => bail!("no command given"),
    }

    Ok(())
}
