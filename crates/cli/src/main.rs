use clap::{Parser, Subcommand};
use lib::client::ProxyClient;
use lib::conversation::{ChatState, SummaryState};
use lib::export::{self, PageLayout};
use lib::render;

#[derive(Parser)]
#[command(name = "aircooled")]
#[command(
    about = "AIr-Cooled Answers: diagnostic chat for air-cooled Porsche owners",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config and both instruction files).
    Init {
        /// Config file path (default: AIRCOOLED_CONFIG_PATH or ~/.aircooled/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the chat proxy (`/api/chat`, `/api/summary`). Needs OPENAI_API_KEY or model.apiKey.
    Serve {
        /// Config file path (default: AIRCOOLED_CONFIG_PATH or ~/.aircooled/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 3001)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Chat with the assistant through a running proxy (interactive).
    Chat {
        /// Config file path (default: AIRCOOLED_CONFIG_PATH or ~/.aircooled/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Proxy address (default from config client.proxyUrl)
        #[arg(long, value_name = "URL")]
        proxy_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = match cli.command {
        Some(Commands::Serve { .. }) => "info",
        _ => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Some(Commands::Version) => {
            println!("aircooled {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("proxy failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, proxy_url }) => {
            if let Err(e) = run_chat(config, proxy_url).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!("starting proxy on {}:{}", config.server.bind, config.server.port);
    lib::proxy::run_proxy(config, path).await
}

const HELP: &str = "\
commands:
  /summary        generate a diagnostic report for this conversation
  /export [path]  write the last report to a paginated text file
  /new            save this conversation to history and start over
  /history        list saved conversations
  /load <n>       open saved conversation n
  /help           show this help
  /exit           quit";

fn print_banner(state: &ChatState) {
    println!("AIr-Cooled Answers");
    println!("{}", state.banner().text);
    println!("(type /help for commands)\n");
}

fn print_transcript(state: &ChatState) {
    for m in state.messages() {
        let text = render::to_plain_text(&render::render_message(m));
        match m.sender {
            lib::conversation::Sender::User => println!("> {}", text),
            _ => println!("< {}\n", text),
        }
    }
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    proxy_url: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, _) = lib::config::load_config(config_path)?;
    let client = ProxyClient::from_config(&config.client, proxy_url);
    let layout = PageLayout::from(&config.client);
    log::info!("chatting via {}", client.base_url());

    let mut state = ChatState::new();
    print_banner(&state);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let (command, arg) = match input.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (input, ""),
        };
        match command.to_ascii_lowercase().as_str() {
            "/exit" | "/quit" => break,
            "/help" => println!("{}", HELP),
            "/new" => {
                state.new_conversation();
                print_banner(&state);
            }
            "/history" => {
                if state.history().is_empty() {
                    println!("no saved conversations");
                }
                for (i, h) in state.history().iter().enumerate() {
                    println!("{:>3}. [{}] {}", i + 1, h.saved_at, h.title);
                }
            }
            "/load" => {
                let id = arg
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| state.history().get(i))
                    .map(|h| h.id.clone());
                match id {
                    Some(id) if state.load_history_entry(&id) => print_transcript(&state),
                    _ => eprintln!("no saved conversation {:?} (see /history)", arg),
                }
            }
            "/summary" => {
                let req = state.request_summary();
                println!("generating summary...");
                let result = client.summarize(&req.messages).await;
                state.receive_summary(req.generation, result);
                match state.summary() {
                    SummaryState::Ready(text) => {
                        let blocks = render::render_markdown(text);
                        println!("{}\n", render::to_plain_text(&blocks));
                        println!("(use /export [path] to save this report)");
                    }
                    SummaryState::Failed(msg) => eprintln!("{}", msg),
                    _ => {}
                }
            }
            "/export" => match state.export_document(&layout) {
                Some(doc) => {
                    let path = if arg.is_empty() {
                        std::path::PathBuf::from(export::default_file_name())
                    } else {
                        std::path::PathBuf::from(arg)
                    };
                    match doc.write_to(&path) {
                        Ok(()) => println!(
                            "saved {} page(s) to {}",
                            doc.pages().len(),
                            path.display()
                        ),
                        Err(e) => eprintln!("export failed: {:#}", e),
                    }
                }
                None => eprintln!("no report to export; run /summary first"),
            },
            c if c.starts_with('/') => eprintln!("unknown command {} (type /help)", c),
            _ => {
                state.input = input.to_string();
                let Some(req) = state.send_turn() else {
                    continue;
                };
                let result = client.submit_turn(&req.messages).await;
                state.receive_reply(req.generation, result);
                if let Some(err) = state.turn_error() {
                    eprintln!("{}", err);
                } else if let Some(reply) = state.messages().last() {
                    let blocks = render::render_message(reply);
                    println!("< {}\n", render::to_plain_text(&blocks));
                }
            }
        }
    }
    Ok(())
}
