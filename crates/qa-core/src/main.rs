use qa_core::config::{ChatMode, Config};
use qa_core::repl::{fresh_session_id, run_repl};
use qa_protocol::SessionContext;
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!("qachat — terminal client for the AI-QA chat backend");
    println!();
    println!("Usage:");
    println!("  qachat [options]");
    println!();
    println!("Options:");
    println!("  --agent           Agent mode: tool-using replies with a reasoning trace");
    println!("  --no-stream       Request complete replies instead of streaming (chat mode)");
    println!("  --server <url>    Backend base URL (overrides config)");
    println!("  --session <id>    Resume an existing conversation");
    println!("  --version         Print version");
    println!("  --help            Print this help");
    println!();
    println!("Set QACHAT_LOG=debug for stream diagnostics on stderr.");
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("qachat {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let filter = EnvFilter::try_from_env("QACHAT_LOG").unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load_or_default();
    let mut session_id: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--agent" => config.server.mode = ChatMode::Agent,
            "--no-stream" => config.server.stream = false,
            "--server" => {
                i += 1;
                match args.get(i) {
                    Some(url) => config.server.base_url = url.clone(),
                    None => {
                        eprintln!("error: --server requires a value");
                        std::process::exit(2);
                    }
                }
            }
            "--session" => {
                i += 1;
                match args.get(i) {
                    Some(id) => session_id = Some(id.clone()),
                    None => {
                        eprintln!("error: --session requires a value");
                        std::process::exit(2);
                    }
                }
            }
            other => {
                eprintln!("error: unknown option '{other}'");
                eprintln!("hint: see --help");
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let token = match config.auth.resolve_token() {
        Ok(token) => token,
        Err(e) => {
            eprintln!("warning: failed to resolve token: {e}");
            None
        }
    };

    let mut session = SessionContext::new(
        config.server.base_url.clone(),
        session_id.unwrap_or_else(fresh_session_id),
    );
    if let Some(token) = token {
        session = session.with_token(token);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_repl(&config, session)) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
