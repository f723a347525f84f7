use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use serde_json::json;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::cli::args::{CliArgs, Command, ShortcutCommand};
use crate::cli::validation;
use crate::client::{ApiClient, ClientOptions, DEFAULT_TABLE_LIMIT, MAX_TABLE_LIMIT};
use crate::config::{self, ConfigFile};
use crate::model::{self, CellValue, IndexStatus, Row, TableName};
use crate::output::{self, OutputFormat};
use crate::query::{self, QuerySession};
use crate::reindex::{self, WatchOptions};
use crate::shortcuts::ShortcutStore;

fn format_kv_line(label: &str, value: &str) {
    eprintln!(":: {:<10}: {}", label, value.bold().blue());
}

fn render_custom_help() -> String {
    let cmd = CliArgs::command();
    let mut out = String::new();

    out.push_str(cmd.get_name());
    if let Some(version) = cmd.get_version() {
        out.push(' ');
        out.push_str(version);
    }
    out.push('\n');

    if let Some(about) = cmd.get_about() {
        out.push_str(&about.to_string());
        out.push('\n');
    }

    if let Some(long_about) = cmd.get_long_about() {
        out.push('\n');
        out.push_str(&long_about.to_string());
        out.push('\n');
    }

    out.push('\n');
    out.push_str("Usage: ");
    out.push_str(cmd.get_name());
    out.push_str(" [OPTIONS] <COMMAND>\n\n");

    out.push_str("Commands:\n");
    let width = cmd
        .get_subcommands()
        .map(|sub| sub.get_name().len())
        .max()
        .unwrap_or(0);
    for sub in cmd.get_subcommands() {
        let about = sub.get_about().map(|a| a.to_string()).unwrap_or_default();
        out.push_str(&format!("  {:<width$}  {}\n", sub.get_name(), about.trim()));
    }
    out.push('\n');

    let mut sections: Vec<(String, Vec<&clap::Arg>)> = Vec::new();
    let mut section_idx: HashMap<String, usize> = HashMap::new();

    for arg in cmd.get_arguments() {
        if arg.is_hide_set() {
            continue;
        }

        let heading = arg.get_help_heading().unwrap_or("Options").to_string();

        let idx = match section_idx.get(&heading).copied() {
            Some(i) => i,
            None => {
                sections.push((heading.clone(), Vec::new()));
                let i = sections.len() - 1;
                section_idx.insert(heading, i);
                i
            }
        };

        sections[idx].1.push(arg);
    }

    for (heading, args) in sections {
        out.push_str(&heading);
        out.push_str(":\n");

        for arg in args {
            let mut parts: Vec<String> = Vec::new();

            if let Some(short) = arg.get_short() {
                parts.push(format!("-{short}"));
            }

            if let Some(long) = arg.get_long() {
                parts.push(format!("--{long}"));
            }

            if let Some(aliases) = arg.get_visible_aliases() {
                for alias in aliases {
                    let rendered = format!("--{alias}");
                    if !parts.iter().any(|p| p == &rendered) {
                        parts.push(rendered);
                    }
                }
            }

            let mut flags = parts.join(", ");

            if arg.get_action().takes_values() {
                let value_name = arg
                    .get_value_names()
                    .and_then(|names| names.first())
                    .map(|name| name.as_str())
                    .unwrap_or("VALUE");
                flags.push_str(&format!(" <{value_name}>"));
            }

            out.push_str("  ");
            out.push_str(&flags);
            out.push('\n');

            if let Some(help) = arg.get_help() {
                let help = help.to_string();
                if !help.trim().is_empty() {
                    out.push_str("          ");
                    out.push_str(help.trim());
                    out.push('\n');
                }
            }

            out.push('\n');
        }
    }

    out.push_str("Run 'freqctl <COMMAND> --help' for command options.\n");
    out
}

/// Whether the argument list names a subcommand before any `--help`.
fn names_subcommand(argv: &[OsString]) -> bool {
    let cmd = CliArgs::command();
    argv.iter().skip(1).any(|raw| {
        let raw = raw.to_string_lossy();
        cmd.get_subcommands().any(|sub| sub.get_name() == raw)
    })
}

#[derive(Clone, Debug)]
pub(crate) struct RunConfig {
    pub(crate) command: Command,
    pub(crate) verbose: u8,
    pub(crate) client: ClientOptions,
    pub(crate) output: Option<String>,
    pub(crate) output_format: OutputFormat,
    pub(crate) no_color: bool,
    pub(crate) auto_wildcard: bool,
    pub(crate) table_limit: usize,
    pub(crate) poll_interval: Duration,
    pub(crate) shortcuts_path: Option<PathBuf>,
    pub(crate) config_path: Option<PathBuf>,
}

pub(crate) fn build_run_config(
    args: CliArgs,
    cfg: ConfigFile,
    config_path: Option<PathBuf>,
) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    let defaults = ClientOptions::default();
    let base_url = args
        .base_url
        .or(cfg.base_url)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or(defaults.base_url);
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    if timeout == 0 {
        return Err("invalid timeout, expected positive integer".to_string());
    }
    let proxy = args
        .proxy
        .or(cfg.proxy)
        .filter(|p| !p.trim().is_empty());

    let output = args
        .output
        .or(cfg.output)
        .filter(|p| !p.trim().is_empty())
        .map(|p| config::expand_tilde_string(&p));
    let output_format = match args.output_format.or(cfg.output_format) {
        Some(raw) => OutputFormat::parse(&raw)
            .ok_or_else(|| format!("invalid output format '{raw}', expected text, json or html"))?,
        None => output
            .as_deref()
            .and_then(output::infer_format_from_path)
            .unwrap_or(OutputFormat::Text),
    };

    let auto_wildcard = cfg.auto_wildcard.unwrap_or(true);
    let table_limit = cfg
        .table_limit
        .unwrap_or(DEFAULT_TABLE_LIMIT)
        .clamp(1, MAX_TABLE_LIMIT);

    let poll_interval_ms = match &args.command {
        Command::Reindex(reindex) => reindex.poll_interval_ms,
        _ => None,
    }
    .or(cfg.poll_interval_ms)
    .unwrap_or(500);
    if poll_interval_ms == 0 {
        return Err("invalid poll-interval, expected positive integer".to_string());
    }

    let shortcuts_path = args
        .shortcuts_file
        .or(cfg.shortcuts_file)
        .filter(|p| !p.trim().is_empty())
        .map(|p| config::expand_tilde(&p))
        .or_else(config::default_shortcuts_path);

    Ok(RunConfig {
        command: args.command,
        verbose: args.verbose,
        client: ClientOptions {
            base_url,
            timeout_seconds: timeout,
            proxy,
            ..defaults
        },
        output,
        output_format,
        no_color,
        auto_wildcard,
        table_limit,
        poll_interval: Duration::from_millis(poll_interval_ms),
        shortcuts_path,
        config_path,
    })
}

async fn emit(run: &RunConfig, rendered: Vec<u8>) -> Result<(), String> {
    match run.output.as_deref() {
        Some(path) => {
            let mut outfile = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .await
                .map_err(|e| format!("failed to open output file: {e}"))?;
            outfile
                .write_all(&rendered)
                .await
                .map_err(|e| format!("failed to write output file: {e}"))?;
            format_kv_line("Output", path);
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(&rendered)
                .await
                .map_err(|e| format!("failed to write to stdout: {e}"))?;
            stdout
                .flush()
                .await
                .map_err(|e| format!("failed to write to stdout: {e}"))?;
        }
    }
    Ok(())
}

/// Query-only commands print plain lines unless JSON was asked for.
fn render_plain(format: OutputFormat, lines: &[String], value: serde_json::Value) -> Vec<u8> {
    match format {
        OutputFormat::Json => output::render_json(&value),
        OutputFormat::Text | OutputFormat::Html => {
            let mut out = String::new();
            for line in lines {
                out.push_str(line);
                out.push('\n');
            }
            out.into_bytes()
        }
    }
}

fn resolve_table(raw: &str) -> Result<TableName, String> {
    TableName::resolve(raw).map_err(|e| e.to_string())
}

fn open_shortcuts(run: &RunConfig) -> Result<ShortcutStore, String> {
    let path = run.shortcuts_path.clone().ok_or_else(|| {
        "could not determine home directory; pass --shortcuts-file".to_string()
    })?;
    ShortcutStore::load(path).map_err(|e| e.to_string())
}

fn progress_rows(status: &IndexStatus) -> Vec<Row> {
    status
        .details
        .iter()
        .map(|(category, progress)| {
            [
                ("Category".to_string(), CellValue::from(category.as_str())),
                ("Done".to_string(), CellValue::Number(progress.done.into())),
                ("Total".to_string(), CellValue::Number(progress.total.into())),
            ]
            .into_iter()
            .collect()
        })
        .collect()
}

fn render_progress(status: &IndexStatus, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Json => output::render_json(status),
        OutputFormat::Html => output::html::render_rows("Index progress", &progress_rows(status)),
        OutputFormat::Text => {
            let mut out = format!(
                "active  : {}\nindexed : {}/{} ({}%)\n",
                status.active,
                status.total_done,
                status.grand_total,
                status.percent()
            );
            if !status.details.is_empty() {
                out.push_str(&output::render_rows_text(&progress_rows(status)));
            }
            out.into_bytes()
        }
    }
}

async fn search(run: &RunConfig, session: &QuerySession, no_wildcard: bool) -> Result<(), String> {
    let query = session
        .search_query(run.auto_wildcard && !no_wildcard)
        .ok_or_else(|| "nothing to search for, pass a query or --filter".to_string())?;
    let client = ApiClient::new(&run.client).map_err(|e| e.to_string())?;
    format_kv_line("Query", &query);
    let hits = client.search(&query).await.map_err(|e| e.to_string())?;
    format_kv_line("Hits", &hits.len().to_string());
    emit(run, output::render_hits(&hits, run.output_format)).await
}

async fn run_shortcut(run: &RunConfig, command: &ShortcutCommand) -> Result<(), String> {
    let mut store = open_shortcuts(run)?;
    match command {
        ShortcutCommand::List => {
            let rows: Vec<Row> = store
                .list()
                .into_iter()
                .map(|id| {
                    let label = store.label(&id);
                    let query = store.query(&id).unwrap_or_default();
                    [
                        ("ID".to_string(), CellValue::Text(id)),
                        ("Label".to_string(), CellValue::Text(label)),
                        ("Query".to_string(), CellValue::Text(query)),
                    ]
                    .into_iter()
                    .collect()
                })
                .collect();
            emit(run, output::render_rows("Shortcuts", &rows, run.output_format)).await
        }
        ShortcutCommand::Show { id } => {
            let query = store
                .query(id)
                .ok_or_else(|| format!("unknown shortcut '{}'", id.trim()))?;
            let mut row = Row::new();
            row.insert("ID", CellValue::from(id.trim()));
            row.insert("Label", CellValue::Text(store.label(id)));
            row.insert("Query", CellValue::Text(query.clone()));
            let fragments = query::split(&query).join(" | ");
            row.insert("Fragments", CellValue::Text(fragments));
            emit(run, output::render_row("Shortcut", &row, run.output_format)).await
        }
        ShortcutCommand::Set { id, query } => {
            store.set_query(id, query);
            store.save().map_err(|e| e.to_string())?;
            format_kv_line("Shortcut", &store.label(id));
            format_kv_line("Query", query.trim());
            Ok(())
        }
        ShortcutCommand::Rename { id, label } => {
            if store.rename(id, label) {
                store.save().map_err(|e| e.to_string())?;
                format_kv_line("Label", label.trim());
            } else {
                format_kv_line("Label", "unchanged (empty label)");
            }
            Ok(())
        }
        ShortcutCommand::Filter { id, fragment } => {
            let merged = store
                .apply_filter(id, fragment)
                .map_err(|e| e.to_string())?;
            store.save().map_err(|e| e.to_string())?;
            format_kv_line("Shortcut", &store.label(id));
            emit(
                run,
                render_plain(
                    run.output_format,
                    std::slice::from_ref(&merged),
                    json!({ "id": id.trim(), "query": merged }),
                ),
            )
            .await
        }
        ShortcutCommand::Run { id, no_wildcard } => {
            let query = store
                .query(id)
                .ok_or_else(|| format!("unknown shortcut '{}'", id.trim()))?;
            format_kv_line("Shortcut", &store.label(id));
            search(run, &QuerySession::new(query), *no_wildcard).await
        }
    }
}

pub(crate) async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    debug!(command = ?run.command, base_url = %run.client.base_url, "dispatching");

    match &run.command {
        Command::Search(args) => {
            let mut session = QuerySession::new(args.query.join(" "));
            for fragment in args.filters.iter() {
                session.apply_filter(fragment);
            }
            search(&run, &session, args.no_wildcard).await
        }
        Command::Split { query } => {
            let fragments = query::split(query);
            emit(
                &run,
                render_plain(run.output_format, &fragments, json!(fragments)),
            )
            .await
        }
        Command::Filter(args) => {
            let fragment = match args.value.as_deref() {
                Some(value) => model::quick_filter(args.column.as_deref().unwrap_or(""), value),
                None => args.fragment.clone().unwrap_or_default(),
            };
            let mut session = QuerySession::new(args.query.as_str());
            let merged = session.apply_filter(&fragment).to_string();
            emit(
                &run,
                render_plain(
                    run.output_format,
                    std::slice::from_ref(&merged),
                    json!({ "query": merged, "fragments": session.fragments() }),
                ),
            )
            .await
        }
        Command::Contains { fragment, query } => {
            let found = query::contains(fragment, query);
            emit(
                &run,
                render_plain(
                    run.output_format,
                    &[found.to_string()],
                    json!({ "contains": found }),
                ),
            )
            .await
        }
        Command::Table(args) => {
            let table = resolve_table(&args.table)?;
            let client = ApiClient::new(&run.client).map_err(|e| e.to_string())?;
            let limit = args.limit.unwrap_or(run.table_limit);
            let mut rows = client
                .list_table(table, limit)
                .await
                .map_err(|e| e.to_string())?;
            if let Some(raw) = args.matcher.as_deref() {
                let matcher = crate::utils::compile_row_matcher(raw)
                    .map_err(|e| format!("invalid --match '{raw}': {e}"))?;
                rows = crate::utils::filter_rows(rows, &matcher);
            }
            format_kv_line("Table", table.table());
            format_kv_line("Rows", &rows.len().to_string());
            emit(
                &run,
                output::render_rows(table.table(), &rows, run.output_format),
            )
            .await
        }
        Command::Tables(args) => {
            let tables = match args.only.as_deref() {
                Some(raw) => crate::utils::parse_tables_csv(raw)
                    .map_err(|e| format!("invalid --only '{raw}': {e}"))?,
                None => TableName::all(),
            };
            let client = ApiClient::new(&run.client).map_err(|e| e.to_string())?;
            let limit = args.limit.unwrap_or(run.table_limit);
            let summaries = client.table_summaries(&tables, limit).await;
            let rows: Vec<Row> = summaries
                .into_iter()
                .map(|summary| {
                    let count = match summary.rows {
                        Ok(n) => CellValue::Number((n as u64).into()),
                        Err(e) => {
                            warn!(table = %summary.table, error = %e, "table listing failed");
                            CellValue::Text(format!("error: {e}"))
                        }
                    };
                    [
                        ("Table".to_string(), CellValue::from(summary.table.table())),
                        ("Rows".to_string(), count),
                    ]
                    .into_iter()
                    .collect()
                })
                .collect();
            emit(&run, output::render_rows("Tables", &rows, run.output_format)).await
        }
        Command::Row(args) => {
            let table = resolve_table(&args.table)?;
            let client = ApiClient::new(&run.client).map_err(|e| e.to_string())?;
            let row = client
                .get_row(table, &args.id)
                .await
                .map_err(|e| e.to_string())?;
            let title = format!("{} {}", table.table(), args.id.trim());
            emit(&run, output::render_row(&title, &row, run.output_format)).await
        }
        Command::Create(args) => {
            let table = resolve_table(&args.table)?;
            let row = crate::utils::parse_assignments(&args.set)?;
            let client = ApiClient::new(&run.client).map_err(|e| e.to_string())?;
            client
                .create_row(table, &row)
                .await
                .map_err(|e| e.to_string())?;
            format_kv_line("Created", table.table());
            Ok(())
        }
        Command::Update(args) => {
            let table = resolve_table(&args.table)?;
            let row = crate::utils::parse_assignments(&args.set)?;
            let client = ApiClient::new(&run.client).map_err(|e| e.to_string())?;
            client
                .update_row(table, &args.id, &row)
                .await
                .map_err(|e| e.to_string())?;
            format_kv_line(
                "Updated",
                &format!("{} {}={}", table.table(), table.primary_key(), args.id.trim()),
            );
            Ok(())
        }
        Command::Delete(args) => {
            let table = resolve_table(&args.table)?;
            let client = ApiClient::new(&run.client).map_err(|e| e.to_string())?;
            client
                .delete_row(table, &args.id)
                .await
                .map_err(|e| e.to_string())?;
            format_kv_line(
                "Deleted",
                &format!("{} {}={}", table.table(), table.primary_key(), args.id.trim()),
            );
            Ok(())
        }
        Command::Reindex(args) => {
            let client = ApiClient::new(&run.client).map_err(|e| e.to_string())?;
            if args.no_wait {
                client.trigger_reindex().await.map_err(|e| e.to_string())?;
                format_kv_line("Reindex", "triggered");
                return Ok(());
            }
            let options = WatchOptions {
                interval: run.poll_interval,
                ..WatchOptions::default()
            };
            let bar = reindex::progress_bar();
            let status = reindex::trigger_and_watch(&client, &options, &bar)
                .await
                .map_err(|e| e.to_string())?;
            format_kv_line(
                "Reindex",
                &format!("{}/{} documents", status.total_done, status.grand_total),
            );
            Ok(())
        }
        Command::Progress => {
            let client = ApiClient::new(&run.client).map_err(|e| e.to_string())?;
            let status = client.index_progress().await.map_err(|e| e.to_string())?;
            emit(&run, render_progress(&status, run.output_format)).await
        }
        Command::Shortcut(command) => run_shortcut(&run, command).await,
        Command::Init => {
            let path = run
                .config_path
                .clone()
                .ok_or_else(|| "could not determine home directory; pass --config".to_string())?;
            config::ensure_default_config_file(&path)?;
            format_kv_line("Config", &path.display().to_string());
            Ok(())
        }
    }
}

pub fn run_cli() -> Result<(), String> {
    run_cli_from(std::env::args_os())
}

pub fn run_cli_from<I, T>(argv: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    let args = match CliArgs::try_parse_from(&argv) {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                if !names_subcommand(&argv) =>
            {
                print!("{}", render_custom_help());
                return Ok(());
            }
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{}", e.render());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    crate::logging::init(args.verbose);

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));
    let (cfg, config_path) = match user_config_path {
        Some(path) => {
            let allow_missing = matches!(args.command, Command::Init);
            (config::load_config(&path, allow_missing)?, Some(path))
        }
        None => match config::default_config_path() {
            Some(path) => (config::load_config(&path, true)?, Some(path)),
            None => (ConfigFile::default(), None),
        },
    };

    let run = build_run_config(args, cfg, config_path)?;
    debug!(verbose = run.verbose, "configuration resolved");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))?;
    Ok(())
}
