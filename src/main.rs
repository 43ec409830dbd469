//! Purpose: `regatta-client` CLI entry point.
//! Role: Binary crate root; parses args, builds per-invocation config, reports errors.
//! Invariants: Range results go to stdout in the selected format; diagnostics go to stderr.
//! Invariants: Errors are human text on a tty stderr and a JSON envelope otherwise.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use regatta_client::api::{
    ClientConfig, Error, ErrorKind, OutputFormat, RemoteClient, RenderOptions, StatusResponse,
    fetch, renderer, resolve, to_exit_code,
};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint(clap_error_hint(&err)),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    let config = client_config(&cli.connection).map_err(|err| (err, color_mode))?;

    command_dispatch::dispatch_command(cli.command, config, color_mode)
        .map_err(add_unavailable_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "regatta-client",
    version,
    about = "Client for the Regatta store",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Command-line tool wrapping API calls to Regatta.
Simplifies querying for data in the Regatta store and other operations.
"#,
    after_help = r#"EXAMPLES
  $ regatta-client table
  $ regatta-client range users                       # every key in the table
  $ regatta-client range users 'user/*' --limit 10   # prefix search
  $ regatta-client put users user/1 '{"name":"alice"}'
  $ regatta-client delete users 'user/*'

LEARN MORE
  $ regatta-client <command> --help"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize output and diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Clone, Debug)]
struct ConnectionArgs {
    #[arg(
        long,
        global = true,
        default_value = regatta_client::api::DEFAULT_ENDPOINT,
        help = "Regatta API endpoint (host:port or http(s)://host:port)"
    )]
    endpoint: String,
    #[arg(
        long,
        global = true,
        help = "Allow insecure connection; certificates are not validated"
    )]
    insecure: bool,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Regatta CA certificate (PEM)",
        value_hint = ValueHint::FilePath
    )]
    cert: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value = "10s",
        help = "Timeout for the whole Regatta operation (e.g. 500ms, 10s, 1m)"
    )]
    timeout: String,
    #[arg(
        long = "dial-timeout",
        global = true,
        default_value = "2s",
        help = "Timeout for establishing the connection to Regatta"
    )]
    dial_timeout: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormatCli {
    Plain,
    Json,
    Jsonl,
}

impl From<OutputFormatCli> for OutputFormat {
    fn from(value: OutputFormatCli) -> Self {
        match value {
            OutputFormatCli::Plain => OutputFormat::Plain,
            OutputFormatCli::Json => OutputFormat::Json,
            OutputFormatCli::Jsonl => OutputFormat::Jsonl,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Retrieve data from the Regatta store",
        long_about = r#"Retrieve data from the Regatta store with a Range query.

Retrieve every item in a table by providing no key, a single item by providing
its key, or all items sharing a prefix by appending an asterisk (*) to the
prefix. Providing a RANGE_END selects the half-open range [KEY, RANGE_END)."#,
        after_help = r#"EXAMPLES
  $ regatta-client range table
  $ regatta-client range table key
  $ regatta-client range table 'prefix*' --output jsonl
  $ regatta-client range table a m --limit 100 --output json

NOTES
  - `--output json` holds the whole result in memory and prints it at the end
  - `--limit 0` (default) means no limit
  - `--binary` prints keys and values as base64"#
    )]
    Range {
        #[arg(help = "Table name")]
        table: String,
        #[arg(help = "Key, or prefix ending in *; omit for every key")]
        key: Option<String>,
        #[arg(help = "Exclusive end of the key range (disables * handling)")]
        range_end: Option<String>,
        #[arg(
            long,
            default_value_t = 0,
            allow_negative_numbers = true,
            help = "Maximum number of items to print (0 = unlimited)"
        )]
        limit: i64,
        #[arg(
            short = 'o',
            long,
            default_value = "plain",
            value_enum,
            help = "Output format",
            long_help = r#"Output format

  plain  human readable `key: value` lines
  json   single JSON array of {"key", "value"} objects (buffered)
  jsonl  one JSON object per line (streamed)"#
        )]
        output: OutputFormatCli,
        #[arg(long = "values-only", help = "Print values only, without keys")]
        values_only: bool,
        #[arg(long, help = "Print keys and values as base64 (binary-safe)")]
        binary: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Put data into the Regatta store",
        after_help = r#"EXAMPLES
  $ regatta-client put table key value
  $ regatta-client put table key AAEC --binary"#
    )]
    Put {
        #[arg(help = "Table name")]
        table: String,
        #[arg(help = "Key")]
        key: String,
        #[arg(help = "Value")]
        value: String,
        #[arg(long, help = "VALUE is binary data encoded using base64")]
        binary: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Delete data from the Regatta store",
        long_about = r#"Delete data from the Regatta store with a DeleteRange query.

Delete a single item by providing its key, or every item sharing a prefix by
appending an asterisk (*) to the prefix. A bare * deletes the whole table."#,
        after_help = r#"EXAMPLES
  $ regatta-client delete table key
  $ regatta-client delete table 'prefix*'"#
    )]
    Delete {
        #[arg(help = "Table name")]
        table: String,
        #[arg(help = "Key, or prefix ending in *")]
        key: String,
    },
    #[command(about = "Print available tables")]
    Table,
    #[command(about = "Print client and server versions")]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completion scripts",
        after_help = r#"EXAMPLES
  $ regatta-client completion bash > /etc/bash_completion.d/regatta-client
  $ regatta-client completion zsh > ~/.zfunc/_regatta-client"#
    )]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn client_config(args: &ConnectionArgs) -> Result<ClientConfig, Error> {
    Ok(ClientConfig {
        endpoint: args.endpoint.clone(),
        insecure: args.insecure,
        cert: args.cert.clone(),
        timeout: parse_duration(&args.timeout)?,
        dial_timeout: parse_duration(&args.dial_timeout)?,
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn parse_duration(input: &str) -> Result<Duration, Error> {
    let trimmed = input.trim();
    let invalid = || {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid duration '{trimmed}'"))
            .with_hint("Use a number plus ms|s|m|h (e.g. 10s).")
    };
    let split = trimmed.char_indices().find(|(_, ch)| !ch.is_ascii_digit());
    let (num_str, unit) = match split {
        Some((idx, _)) => trimmed.split_at(idx),
        None => return Err(invalid()),
    };
    if num_str.is_empty() {
        return Err(invalid());
    }
    let value: u64 = num_str.parse().map_err(|_| invalid())?;
    let millis = match unit {
        "ms" => value,
        "s" => value.saturating_mul(1_000),
        "m" => value.saturating_mul(60_000),
        "h" => value.saturating_mul(3_600_000),
        _ => return Err(invalid()),
    };
    Ok(Duration::from_millis(millis))
}

fn add_unavailable_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Unavailable || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Check --endpoint and that Regatta is running; use --cert or --insecure for TLS failures.",
    )
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint("Unexpected internal failure. Retry with RUST_LOG=debug to see each request.")
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Green,
    Yellow,
    Blue,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Green => "32",
        AnsiColor::Yellow => "33",
        AnsiColor::Blue => "34",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn table_lines(status: &StatusResponse, use_color: bool) -> Vec<String> {
    status
        .tables
        .iter()
        .map(|name| colorize_label(name, use_color, AnsiColor::Green))
        .collect()
}

fn version_line(label: &str, version: &str, use_color: bool, color: AnsiColor) -> String {
    format!(
        "{}: {}",
        colorize_label(label, use_color, AnsiColor::Blue),
        colorize_label(version, use_color, color)
    )
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

/// User-facing sentence for an error, including the Regatta status mapping.
fn error_message(err: &Error) -> String {
    let message = err.message().unwrap_or_default();
    match err.kind() {
        ErrorKind::NotFound => format!("The requested resource was not found: {message}"),
        ErrorKind::Unavailable => format!("Regatta is not reachable: {message}"),
        ErrorKind::Rpc => format!(
            "Received RPC error from Regatta, code '{}' with message '{message}'",
            err.code().unwrap_or("Unknown")
        ),
        _ if !message.is_empty() => message.to_string(),
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    use std::error::Error as _;
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    if let Some(code) = err.code() {
        inner.insert("code".to_string(), json!(code));
    }
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];
    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);
    let Some(usage) = usage else {
        return "Try `regatta-client --help`.".to_string();
    };
    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "regatta-client") else {
        return "Try `regatta-client --help`.".to_string();
    };
    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect();
    if parts.is_empty() {
        return "Try `regatta-client --help`.".to_string();
    }
    format!("Try `regatta-client {} --help`.", parts.join(" "))
}
