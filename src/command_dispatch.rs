//! Purpose: Hold top-level CLI command dispatch for `regatta-client`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every command connects with the config built for this invocation only.
//! Invariants: Range output is streamed per page except for the buffered JSON array.

use super::*;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::io::Write;
use tracing::debug;

pub(super) fn dispatch_command(
    command: Command,
    config: ClientConfig,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "regatta-client", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Range {
            table,
            key,
            range_end,
            limit,
            output,
            values_only,
            binary,
        } => {
            let query = resolve(&table, key.as_deref(), range_end.as_deref(), limit);
            let client = RemoteClient::connect(&config)?;
            let options = RenderOptions {
                format: output.into(),
                values_only,
                binary,
            };
            let mut out = renderer(options, io::stdout().lock());
            let summary = fetch(&query, &client, |page| {
                out.consume(page)?;
                Ok(true)
            })?;
            out.finish()?;
            debug!(
                table = %query.table,
                exact = query.is_exact(),
                pages = summary.pages,
                emitted = summary.emitted,
                "range complete"
            );
            Ok(RunOutcome::ok())
        }
        Command::Put {
            table,
            key,
            value,
            binary,
        } => {
            let value = if binary {
                STANDARD.decode(value.as_bytes()).map_err(|err| {
                    Error::new(ErrorKind::Usage)
                        .with_message("There was an error while decoding parameters")
                        .with_hint("With --binary, VALUE must be standard base64.")
                        .with_source(err)
                })?
            } else {
                value.into_bytes()
            };
            let client = RemoteClient::connect(&config)?;
            client.put(&table, key.as_bytes(), &value)?;
            debug!(table = %table, key = %key, bytes = value.len(), "put complete");
            Ok(RunOutcome::ok())
        }
        Command::Delete { table, key } => {
            if key.is_empty() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("delete requires a non-empty key")
                    .with_hint("Use `*` to delete every key in the table."));
            }
            let query = resolve(&table, Some(&key), None, 0);
            let client = RemoteClient::connect(&config)?;
            let response = client.delete_range(&query.table, &query.start, query.end.as_deref())?;
            debug!(table = %query.table, deleted = response.deleted, "delete complete");
            Ok(RunOutcome::ok())
        }
        Command::Table => {
            let client = RemoteClient::connect(&config)?;
            let status = client.status()?;
            let stdout = io::stdout();
            let use_color = color_mode.use_color(stdout.is_terminal());
            write_lines(&table_lines(&status, use_color))?;
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            let use_color = color_mode.use_color(io::stdout().is_terminal());
            write_lines(&[version_line(
                "client version",
                CLIENT_VERSION,
                use_color,
                AnsiColor::Green,
            )])?;
            let server = RemoteClient::connect(&config)
                .and_then(|client| client.status());
            match server {
                Ok(status) => write_lines(&[version_line(
                    "server version",
                    &status.version,
                    use_color,
                    AnsiColor::Green,
                )])?,
                Err(err) => {
                    write_lines(&[version_line(
                        "server version",
                        "unknown",
                        use_color,
                        AnsiColor::Red,
                    )])?;
                    emit_error(&add_unavailable_hint(err), color_mode);
                }
            }
            Ok(RunOutcome::ok())
        }
    }
}

fn write_lines(lines: &[String]) -> Result<(), Error> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in lines {
        writeln!(out, "{line}").map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output")
                .with_source(err)
        })?;
    }
    out.flush().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to flush output")
            .with_source(err)
    })
}
