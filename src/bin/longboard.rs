//! CLI binary running the Upwork to Wave sync.
#![allow(
    clippy::exit,
    reason = "CLI binary uses process::exit for fatal errors"
)]

use core::time::Duration;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use indicatif::{ProgressBar, ProgressStyle};
use longboard_rs::client::{UpworkClient, WaveClient};
use longboard_rs::config::SyncConfig;
use longboard_rs::dates::{self, DateRange};
use longboard_rs::longboard::{Longboard, SyncReport};
use longboard_rs::models::{NaiveDate, SourceTeam};
use longboard_rs::platform::{DestinationPlatform, SourcePlatform};
use longboard_rs::reconcile::TransactionOutcome;
use owo_colors::OwoColorize;

/// Environment variable holding the Upwork access token.
const UPWORK_TOKEN_ENV: &str = "UPWORK_TOKEN";

/// Environment variable holding the Wave access token.
const WAVE_TOKEN_ENV: &str = "WAVE_TOKEN";

/// Longboard: reconcile Upwork earnings into Wave invoices and payments.
#[derive(Debug, Parser)]
#[command(name = "longboard", version, about)]
struct Cli {
    /// Configuration file (default: <config dir>/longboard/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Sync customers, invoices and payments.
    Sync(SyncArgs),
    /// Show the query windows a sync would use.
    Windows(RangeArgs),
    /// List the Upwork teams that would become Wave customers.
    Teams,
}

/// Date boundaries overriding the configuration.
#[derive(Debug, Args)]
struct RangeArgs {
    /// First day to sync (inclusive, YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    start: Option<NaiveDate>,
    /// Last day to sync (inclusive, YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    end: Option<NaiveDate>,
}

/// Arguments for the `sync` subcommand.
#[derive(Debug, Args)]
struct SyncArgs {
    /// Date boundaries.
    #[command(flatten)]
    range: RangeArgs,
    /// Keep running, starting a new sync this many seconds after the
    /// previous one finished.
    #[arg(long, value_name = "SECS")]
    every: Option<u64>,
}

/// Parses a date string in `YYYY-MM-DD` format for clap.
fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, dates::ISO_DATE_FORMAT).map_err(|err| format!("{err}"))
}

/// Reads an API token from the environment variable `name`.
fn read_token(name: &str) -> io::Result<Option<String>> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => Ok(Some(val)),
        _ => {
            let mut err = io::stderr().lock();
            writeln!(
                err,
                "{} {} environment variable is not set",
                "error:".red().bold(),
                name.bold()
            )?;
            writeln!(
                err,
                "  {} create a .env file with {}=<your_token>",
                "hint:".cyan(),
                name
            )?;
            Ok(None)
        }
    }
}

/// Resolves the configuration path, falling back to the user config dir.
fn config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| dirs::config_dir().map(|dir| dir.join("longboard").join("config.toml")))
}

/// Loads the configuration, reporting failures on stderr.
fn load_config(explicit: Option<PathBuf>) -> io::Result<Option<SyncConfig>> {
    let Some(path) = config_path(explicit) else {
        writeln!(
            io::stderr().lock(),
            "{} could not determine the configuration directory; pass --config",
            "error:".red().bold()
        )?;
        return Ok(None);
    };
    match SyncConfig::load(&path) {
        Ok(config) => Ok(Some(config)),
        Err(err) => {
            let mut out = io::stderr().lock();
            writeln!(
                out,
                "{} failed to load {}: {err}",
                "error:".red().bold(),
                path.display()
            )?;
            writeln!(
                out,
                "  {} see README.md for the configuration format",
                "hint:".cyan()
            )?;
            Ok(None)
        }
    }
}

/// Builds both API clients from the environment tokens and config.
fn build_clients(config: &SyncConfig) -> io::Result<Option<(UpworkClient, WaveClient)>> {
    let Some(upwork_token) = read_token(UPWORK_TOKEN_ENV)? else {
        return Ok(None);
    };
    let Some(wave_token) = read_token(WAVE_TOKEN_ENV)? else {
        return Ok(None);
    };

    let mut upwork = UpworkClient::builder().token(upwork_token);
    if let Some(url) = config.upwork.base_url.clone() {
        upwork = upwork.base_url(url);
    }
    let mut wave = WaveClient::builder().token(wave_token);
    if let Some(url) = config.wave.base_url.clone() {
        wave = wave.base_url(url);
    }
    if let Some(url) = config.wave.rest_url.clone() {
        wave = wave.rest_url(url);
    }

    match upwork
        .build()
        .and_then(|source| wave.build().map(|destination| (source, destination)))
    {
        Ok(clients) => Ok(Some(clients)),
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} failed to build client: {err}",
                "error:".red().bold()
            )?;
            Ok(None)
        }
    }
}

/// Runs the CLI, returning an appropriate exit code.
fn run() -> io::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let Some(config) = load_config(cli.config)? else {
        return Ok(ExitCode::FAILURE);
    };

    if let Command::Windows(args) = cli.command {
        return cmd_windows(&config, &args);
    }

    let Some((source, destination)) = build_clients(&config)? else {
        return Ok(ExitCode::FAILURE);
    };

    let job = match Longboard::builder()
        .source(source)
        .destination(destination)
        .config(&config)
        .build()
    {
        Ok(job) => job,
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} failed to set up the sync: {err}",
                "error:".red().bold()
            )?;
            return Ok(ExitCode::FAILURE);
        }
    };

    dispatch(&job, &config, cli.command)
}

/// Dispatches to the appropriate subcommand handler.
fn dispatch<S: SourcePlatform, D: DestinationPlatform>(
    job: &Longboard<S, D>,
    config: &SyncConfig,
    command: Command,
) -> io::Result<ExitCode> {
    match command {
        Command::Sync(args) => cmd_sync(job, config, &args),
        Command::Windows(args) => cmd_windows(config, &args),
        Command::Teams => cmd_teams(job),
    }
}

/// Executes the `sync` subcommand, once or on a fixed delay.
#[allow(
    clippy::infinite_loop,
    reason = "scheduled mode runs until the process is stopped"
)]
fn cmd_sync<S: SourcePlatform, D: DestinationPlatform>(
    job: &Longboard<S, D>,
    config: &SyncConfig,
    args: &SyncArgs,
) -> io::Result<ExitCode> {
    let Some(every) = args.every else {
        return sync_once(job, config, &args.range);
    };
    let delay = Duration::from_secs(every.max(1));
    tracing::info!(every_secs = delay.as_secs(), "running on a schedule");
    loop {
        let _code = sync_once(job, config, &args.range)?;
        tracing::info!(next_in_secs = delay.as_secs(), "waiting for next sync");
        std::thread::sleep(delay);
    }
}

/// Runs a single sync and prints its summary.
fn sync_once<S: SourcePlatform, D: DestinationPlatform>(
    job: &Longboard<S, D>,
    config: &SyncConfig,
    range: &RangeArgs,
) -> io::Result<ExitCode> {
    let start = range.start.or(config.sync.start);
    let end = range.end.or(config.sync.end);

    match job.run(&config.wave.business_id, start, end) {
        Ok(report) => {
            print_sync_report(&report)?;
            if report.failed_windows() > 0 {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} sync failed: {err}",
                "error:".red().bold()
            )?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `windows` subcommand: prints the query windows.
fn cmd_windows(config: &SyncConfig, args: &RangeArgs) -> io::Result<ExitCode> {
    let range = Longboard::<UpworkClient, WaveClient>::resolve_range(
        args.start.or(config.sync.start),
        args.end.or(config.sync.end),
    );
    print_windows_table(range, &dates::split(range, config.sync.window))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `teams` subcommand: lists the Upwork teams.
fn cmd_teams<S: SourcePlatform, D: DestinationPlatform>(
    job: &Longboard<S, D>,
) -> io::Result<ExitCode> {
    let spinner = make_spinner("Fetching teams from Upwork...");

    match job.teams() {
        Ok(teams) => {
            spinner.finish_and_clear();
            print_teams_table(&teams)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            spinner.finish_and_clear();
            writeln!(
                io::stderr().lock(),
                "{} failed to fetch teams: {err}",
                "error:".red().bold()
            )?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Creates a spinner with a message.
fn make_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_owned());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Prints the customer, outcome and window summary of a run.
fn print_sync_report(report: &SyncReport) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(
        out,
        "{} {}",
        "Sync finished".green().bold(),
        format_args!("({}, {})", report.business.name, report.range).dimmed()
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "Customers: {} created, {} updated, {} failed",
        report.customers.created, report.customers.updated, report.customers.failed
    )?;
    writeln!(out)?;

    let totals = report.totals();
    let mut outcomes = Table::new();
    _ = outcomes.load_preset(UTF8_FULL);
    _ = outcomes.set_header(vec![
        Cell::new("Outcome").fg(Color::Cyan),
        Cell::new("Transactions").fg(Color::Cyan),
    ]);
    for outcome in TransactionOutcome::ALL {
        let count = totals.count(outcome);
        if count > 0 {
            _ = outcomes.add_row(vec![Cell::new(outcome), Cell::new(count)]);
        }
    }
    _ = outcomes.add_row(vec![
        Cell::new("total").fg(Color::Green),
        Cell::new(totals.total()).fg(Color::Green),
    ]);
    writeln!(out, "{outcomes}")?;

    let mut windows = Table::new();
    _ = windows.load_preset(UTF8_FULL);
    _ = windows.set_header(vec![
        Cell::new("Window").fg(Color::Cyan),
        Cell::new("Rows").fg(Color::Cyan),
        Cell::new("Skipped").fg(Color::Cyan),
        Cell::new("Invoices").fg(Color::Cyan),
        Cell::new("Payments").fg(Color::Cyan),
        Cell::new("Error").fg(Color::Cyan),
    ]);
    for window in &report.windows {
        let error = window
            .error
            .as_deref()
            .map_or_else(|| Cell::new(""), |message| Cell::new(message).fg(Color::Red));
        _ = windows.add_row(vec![
            Cell::new(window.range),
            Cell::new(window.rows),
            Cell::new(window.malformed),
            Cell::new(window.transactions.invoices().len()),
            Cell::new(window.transactions.payments().len()),
            error,
        ]);
    }
    writeln!(out, "{windows}")?;
    Ok(())
}

/// Prints the windows covering `range`.
fn print_windows_table(range: DateRange, windows: &[DateRange]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(vec![
        Cell::new("#").fg(Color::Cyan),
        Cell::new("Start").fg(Color::Cyan),
        Cell::new("End").fg(Color::Cyan),
    ]);
    for (index, window) in windows.iter().enumerate() {
        _ = table.add_row(vec![
            Cell::new(index.saturating_add(1)),
            Cell::new(dates::human(window.start)),
            Cell::new(dates::human(window.end)),
        ]);
    }

    writeln!(
        out,
        "{} {}",
        "Query Windows".green().bold(),
        format_args!("({range})").dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

/// Prints teams in a table.
fn print_teams_table(teams: &[SourceTeam]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if teams.is_empty() {
        writeln!(out, "{}", "No teams found.".dimmed())?;
        return Ok(());
    }

    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(vec![
        Cell::new("Reference").fg(Color::Cyan),
        Cell::new("Company").fg(Color::Cyan),
        Cell::new("Contact").fg(Color::Cyan),
    ]);
    for team in teams {
        _ = table.add_row(vec![
            Cell::new(&team.reference),
            Cell::new(&team.company_name),
            Cell::new(&team.name),
        ]);
    }

    writeln!(
        out,
        "{} {}",
        "Upwork Teams".green().bold(),
        format_args!("({})", teams.len()).dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            let _ignored = writeln!(io::stderr(), "fatal I/O error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use longboard_rs::models::{
        Account, AccountId, Business, BusinessId, Product, ProductId, Record,
    };
    use longboard_rs::platform::{InMemoryDestination, InMemorySource};
    use serde_json::json;

    const CONFIG: &str = r#"
[wave]
business_id = "biz-1"

[upwork]
account_ref = "acct-ref"

[sync]
start = "2024-01-01"
end = "2024-02-29"

[mappings.products]
"Hourly-Invoice" = "prod-1"

[mappings.accounts]
"Hourly-Invoice" = "acct-1"
"#;

    fn config() -> SyncConfig {
        SyncConfig::from_toml_str(CONFIG).unwrap()
    }

    fn row(reference: &str, posted: &str) -> Record {
        [
            ("reference", reference),
            ("amount", "50.00"),
            ("type", "Hourly"),
            ("subtype", "Invoice"),
            ("description", "(Build) API - 2:00 hrs @ $25.00/hr - 01/01/2024 - 01/07/2024"),
            ("date", posted),
            ("date_due", posted),
            ("buyer_team__reference", "T1"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
    }

    fn wave() -> InMemoryDestination {
        let business = BusinessId::from("biz-1");
        InMemoryDestination::new()
            .with_business(Business {
                id: business.clone(),
                name: "Freelance Co".to_owned(),
                currency: None,
            })
            .with_product(
                &business,
                Product {
                    id: ProductId::from("prod-1"),
                    name: "Hourly work".to_owned(),
                },
            )
            .with_account(
                &business,
                Account {
                    id: AccountId::from("acct-1"),
                    name: "Checking".to_owned(),
                    classic_id: Some("42".to_owned()),
                },
            )
    }

    fn mock_job(
        source: InMemorySource,
        destination: InMemoryDestination,
    ) -> Longboard<InMemorySource, InMemoryDestination> {
        Longboard::builder()
            .source(source)
            .destination(destination)
            .config(&config())
            .build()
            .unwrap()
    }

    fn range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> RangeArgs {
        RangeArgs { start, end }
    }

    // ── parse_date tests ─────────────────────────────────────────────

    #[test]
    fn parse_date_valid() {
        let date = parse_date("2024-01-15").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn parse_date_invalid() {
        assert!(parse_date("not-a-date").is_err());
        assert!(parse_date("01-15-2024").is_err());
    }

    // ── config tests ─────────────────────────────────────────────────

    #[test]
    fn config_path_prefers_explicit() {
        let path = config_path(Some(PathBuf::from("/tmp/longboard.toml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/longboard.toml")));
    }

    #[test]
    fn load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(Some(dir.path().join("absent.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn cli_parses_sync_with_schedule() {
        let cli = Cli::try_parse_from([
            "longboard",
            "--config",
            "x.toml",
            "sync",
            "--start",
            "2024-01-01",
            "--every",
            "3600",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(
            cli.command,
            Command::Sync(SyncArgs {
                every: Some(3600),
                range: RangeArgs { start: Some(_), end: None },
            })
        ));
    }

    // ── cmd_* tests ──────────────────────────────────────────────────

    #[test]
    fn cmd_sync_once_succeeds() {
        let source = InMemorySource::new()
            .with_team(json!({"reference": "T1", "company_name": "Acme", "name": "Jane Doe"}))
            .with_row(row("R1", "20240108"));
        let job = mock_job(source, wave());
        let args = SyncArgs {
            range: range(None, None),
            every: None,
        };
        let code = cmd_sync(&job, &config(), &args).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(job.destination().payments().unwrap().len(), 1);
    }

    #[test]
    fn cmd_sync_unknown_business_fails() {
        let job = mock_job(InMemorySource::new(), InMemoryDestination::new());
        let args = SyncArgs {
            range: range(None, None),
            every: None,
        };
        let code = cmd_sync(&job, &config(), &args).unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[test]
    fn cmd_sync_failed_window_fails() {
        let source = InMemorySource::new()
            .failing_window(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        let job = mock_job(source, wave());
        let code = sync_once(&job, &config(), &range(None, None)).unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[test]
    fn cmd_sync_range_overrides_config() {
        let job = mock_job(InMemorySource::new(), wave());
        let start = NaiveDate::from_ymd_opt(2024, 3, 1);
        let end = NaiveDate::from_ymd_opt(2024, 3, 10);
        let code = sync_once(&job, &config(), &range(start, end)).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(
            job.source().report_calls().unwrap(),
            vec![(start.unwrap(), end.unwrap())]
        );
    }

    #[test]
    fn cmd_windows_prints() {
        let code = cmd_windows(&config(), &range(None, None)).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn cmd_teams_lists() {
        let source = InMemorySource::new()
            .with_team(json!({"reference": "T1", "company_name": "Acme", "name": "Jane Doe"}));
        let code = cmd_teams(&mock_job(source, wave())).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn cmd_teams_missing_list_fails() {
        let code = cmd_teams(&mock_job(InMemorySource::without_teams(), wave())).unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[test]
    fn dispatch_routes_teams() {
        let code = dispatch(
            &mock_job(InMemorySource::new(), wave()),
            &config(),
            Command::Teams,
        )
        .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn print_teams_empty() {
        print_teams_table(&[]).unwrap();
    }

    #[test]
    fn make_spinner_creates_spinner() {
        let spinner = make_spinner("Testing...");
        spinner.finish_and_clear();
    }
}
