//! Purpose: `faaskit` CLI entry point; runs the demo function server.
//! Role: Binary crate root; parses args, builds the handler config, starts the runtime.
//! Invariants: Errors are emitted as JSON on stderr; exit code comes from `to_exit_code`.
//! Invariants: CLI flags override `ALLOWED_ORIGINS` / `MAX_BODY_BYTES` from the environment.
use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value, json};

use faaskit::{Error, ErrorKind, HandlerConfig, OriginAllowList, to_exit_code};

mod serve;

fn main() {
    let exit_code = match run() {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<(), Error> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            let config = serve_config_from_args(args)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))
        }
    }
}

#[derive(Parser)]
#[command(
    name = "faaskit",
    version,
    about = "Function handler helpers: strict JSON, CORS, secrets, background tasks",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the demo echo function over HTTP
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8080", help = "Bind address")]
    bind: String,
    #[arg(
        long = "cors-origin",
        value_name = "ORIGIN",
        help = "Allow browser requests from this origin (repeatable, exact match)"
    )]
    cors_origin: Vec<String>,
    #[arg(
        long,
        value_name = "BYTES",
        help = "Maximum request body size (default: 1048576)"
    )]
    max_body_bytes: Option<u64>,
}

fn serve_config_from_args(args: ServeArgs) -> Result<serve::ServeConfig, Error> {
    let bind: SocketAddr = args.bind.parse().map_err(|_| {
        Error::new(ErrorKind::Config)
            .with_message("invalid bind address")
            .with_hint("Use a host:port value like 127.0.0.1:8080.")
    })?;

    let mut handler = HandlerConfig::from_env()?;
    if !args.cors_origin.is_empty() {
        handler = handler.with_origins(OriginAllowList::new(args.cors_origin));
    }
    if let Some(max_body_bytes) = args.max_body_bytes {
        handler = handler.with_max_body_bytes(max_body_bytes);
    }
    handler.validate()?;

    Ok(serve::ServeConfig { bind, handler })
}

fn emit_error(err: &Error) {
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert(
        "message".to_string(),
        json!(err.message().unwrap_or("error")),
    );
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let mut causes = Vec::new();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}
