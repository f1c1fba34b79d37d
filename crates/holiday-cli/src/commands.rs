//! Lifecycle subcommands: argument parsing, dispatch and output.

use std::io::Write;

use tabwriter::TabWriter;

use crate::backend::{LifecycleBackend, StatusReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Install,
    Uninstall,
    Enable { surface: Option<String> },
    Disable,
    Update,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedArgs {
    json: bool,
    quiet: bool,
    command: Command,
}

/// True when `name` is a subcommand handled here.
pub fn is_command(name: &str) -> bool {
    matches!(
        name,
        "install" | "uninstall" | "enable" | "disable" | "update" | "status"
    )
}

pub fn run_for_test(args: &[&str], backend: &mut dyn LifecycleBackend) -> CommandOutput {
    let owned_args: Vec<String> = args.iter().map(|arg| (*arg).to_string()).collect();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit_code = run_with_backend(&owned_args, backend, &mut stdout, &mut stderr);
    CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code,
    }
}

pub fn run_with_backend(
    args: &[String],
    backend: &mut dyn LifecycleBackend,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    match execute(args, backend, stdout) {
        Ok(()) => 0,
        Err(message) => {
            let _ = writeln!(stderr, "{message}");
            1
        }
    }
}

fn execute(
    args: &[String],
    backend: &mut dyn LifecycleBackend,
    stdout: &mut dyn Write,
) -> Result<(), String> {
    let parsed = parse_args(args)?;
    match parsed.command {
        Command::Help => write_help(stdout).map_err(|err| err.to_string()),
        Command::Install => {
            backend
                .install()
                .map_err(|err| format!("install failed: {err}"))?;
            write_ack(stdout, &parsed, "install", "Plugin installed")
        }
        Command::Uninstall => {
            backend
                .uninstall()
                .map_err(|err| format!("uninstall failed: {err}"))?;
            write_ack(stdout, &parsed, "uninstall", "Plugin uninstalled")
        }
        Command::Enable { surface } => {
            let placement = backend
                .enable(surface.as_deref())
                .map_err(|err| format!("enable failed: {err}"))?;
            if parsed.json {
                return write_json(stdout, &placement);
            }
            if !parsed.quiet {
                writeln!(
                    stdout,
                    "Widget placed on {} (page {}, position {})",
                    placement.surface_id, placement.page_id, placement.order_index
                )
                .map_err(|err| err.to_string())?;
            }
            Ok(())
        }
        Command::Disable => {
            backend
                .disable()
                .map_err(|err| format!("disable failed: {err}"))?;
            write_ack(stdout, &parsed, "disable", "Widget removed")
        }
        Command::Update => {
            backend
                .update()
                .map_err(|err| format!("update failed: {err}"))?;
            write_ack(stdout, &parsed, "update", "Nothing to update")
        }
        Command::Status => {
            let report = backend
                .status()
                .map_err(|err| format!("failed to get status: {err}"))?;
            if parsed.json {
                return write_json(stdout, &report);
            }
            write_status(stdout, &report).map_err(|err| err.to_string())
        }
    }
}

fn write_ack(stdout: &mut dyn Write, parsed: &ParsedArgs, action: &str, message: &str) -> Result<(), String> {
    if parsed.json {
        return write_json(stdout, &serde_json::json!({ "action": action, "ok": true }));
    }
    if parsed.quiet {
        return Ok(());
    }
    writeln!(stdout, "{message}").map_err(|err| err.to_string())
}

fn write_json<T: serde::Serialize>(stdout: &mut dyn Write, value: &T) -> Result<(), String> {
    serde_json::to_writer_pretty(&mut *stdout, value).map_err(|err| err.to_string())?;
    writeln!(stdout).map_err(|err| err.to_string())
}

fn write_status(stdout: &mut dyn Write, report: &StatusReport) -> std::io::Result<()> {
    writeln!(stdout, "Plugin:          {}", report.plugin_code)?;
    writeln!(stdout, "Schema version:  {}", report.schema_version)?;
    writeln!(
        stdout,
        "Assets:          {}",
        if report.assets_installed { "installed" } else { "absent" }
    )?;
    match &report.widget {
        Some(widget) => writeln!(
            stdout,
            "Widget:          {} ({})",
            widget.name, widget.content_reference
        )?,
        None => writeln!(stdout, "Widget:          not registered")?,
    }

    writeln!(stdout)?;
    let mut tw = TabWriter::new(&mut *stdout).padding(2);
    writeln!(tw, "VERSION\tDESCRIPTION\tSTATUS\tAPPLIED AT")?;
    for row in &report.migrations {
        let status = if row.applied { "applied" } else { "pending" };
        let applied_at = if row.applied && !row.applied_at.is_empty() {
            row.applied_at.as_str()
        } else {
            "-"
        };
        writeln!(tw, "{}\t{}\t{}\t{}", row.version, row.description, status, applied_at)?;
    }
    tw.flush()?;

    if report.placements.is_empty() {
        return Ok(());
    }
    writeln!(stdout)?;
    let mut tw = TabWriter::new(&mut *stdout).padding(2);
    writeln!(tw, "PAGE\tSURFACE\tPOSITION\tVISIBLE")?;
    for placement in &report.placements {
        writeln!(
            tw,
            "{}\t{}\t{}\t{}",
            placement.page_id, placement.surface_id, placement.order_index, placement.visible
        )?;
    }
    tw.flush()
}

fn parse_args(args: &[String]) -> Result<ParsedArgs, String> {
    let mut json = false;
    let mut quiet = false;
    let mut command: Option<Command> = None;
    let mut surface: Option<String> = None;

    let mut index = 0usize;
    while let Some(token) = args.get(index) {
        match token.as_str() {
            "--json" => json = true,
            "--quiet" | "-q" => quiet = true,
            "--help" | "-h" | "help" => command = Some(Command::Help),
            "--surface" | "-s" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| format!("error: missing value for {token}"))?;
                if value.trim().is_empty() || value.starts_with('-') {
                    return Err(format!("error: invalid value '{value}' for {token}"));
                }
                surface = Some(value.clone());
                index += 1;
            }
            name if command.is_none() && is_command(name) => {
                command = Some(match name {
                    "install" => Command::Install,
                    "uninstall" => Command::Uninstall,
                    "enable" => Command::Enable { surface: None },
                    "disable" => Command::Disable,
                    "update" => Command::Update,
                    _ => Command::Status,
                });
            }
            unknown => {
                return Err(format!("error: unknown argument '{unknown}'"));
            }
        }
        index += 1;
    }

    let command = match (command, surface) {
        (Some(Command::Enable { .. }), surface) => Command::Enable { surface },
        (Some(Command::Help), _) => Command::Help,
        (Some(_), Some(_)) => {
            return Err("error: --surface is only valid for enable".to_string());
        }
        (Some(command), None) => command,
        (None, _) => Command::Help,
    };

    Ok(ParsedArgs {
        json,
        quiet,
        command,
    })
}

pub(crate) fn write_help(out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Closed-days calendar widget for the shop front.")?;
    writeln!(out)?;
    writeln!(out, "Usage:")?;
    writeln!(out, "  holiday [global flags] <command> [options]")?;
    writeln!(out)?;
    writeln!(out, "Commands:")?;
    writeln!(out, "  install     Create plugin tables and copy assets")?;
    writeln!(out, "  uninstall   Remove the widget, assets and plugin tables")?;
    writeln!(out, "  enable      Register the widget and place it on a surface")?;
    writeln!(out, "  disable     Remove the widget and its placements")?;
    writeln!(out, "  update      Apply changes between plugin releases")?;
    writeln!(out, "  status      Show schema, widget and placement state")?;
    writeln!(out, "  help        Show this help")?;
    writeln!(out)?;
    writeln!(out, "Options:")?;
    writeln!(out, "  -s, --surface string  surface to place the widget on (enable only)")?;
    writeln!(out)?;
    writeln!(out, "Global Flags:")?;
    writeln!(
        out,
        "      --config string   config file (default is $HOME/.config/holiday/config.yaml)"
    )?;
    writeln!(out, "      --json            output in JSON format")?;
    writeln!(out, "  -q, --quiet           suppress non-essential output")?;
    writeln!(out, "      --version         print version and exit")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ParsedArgs, String> {
        let owned: Vec<String> = args.iter().map(|arg| (*arg).to_string()).collect();
        parse_args(&owned)
    }

    #[test]
    fn empty_args_show_help() {
        assert!(matches!(parse(&[]), Ok(ParsedArgs { command: Command::Help, .. })));
    }

    #[test]
    fn enable_takes_surface_flag_anywhere() {
        match parse(&["--surface", "footer", "enable", "--json"]) {
            Ok(parsed) => {
                assert!(parsed.json);
                assert_eq!(
                    parsed.command,
                    Command::Enable {
                        surface: Some("footer".to_string())
                    }
                );
            }
            Err(err) => panic!("parse: {err}"),
        }
    }

    #[test]
    fn surface_flag_needs_a_value() {
        match parse(&["enable", "--surface"]) {
            Ok(parsed) => panic!("expected error, got {parsed:?}"),
            Err(err) => assert!(err.contains("missing value")),
        }
    }

    #[test]
    fn surface_flag_is_rejected_for_other_commands() {
        match parse(&["disable", "--surface", "footer"]) {
            Ok(parsed) => panic!("expected error, got {parsed:?}"),
            Err(err) => assert!(err.contains("only valid for enable")),
        }
    }

    #[test]
    fn unknown_argument_is_an_error() {
        match parse(&["install", "--force"]) {
            Ok(parsed) => panic!("expected error, got {parsed:?}"),
            Err(err) => assert!(err.contains("unknown argument '--force'")),
        }
    }

    #[test]
    fn second_command_is_unknown() {
        assert!(parse(&["install", "enable"]).is_err());
    }
}
