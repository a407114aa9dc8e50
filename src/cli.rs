use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use crate::commands::{self, CommandReport};
use crate::monitor::message::Role;

#[derive(Parser)]
#[command(name = "chatmon")]
#[command(about = "Keeps a local ledger of AI chat conversations: capture, search, export, and daily summaries")]
#[command(version)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest JSONL capture frames, one page observation per line.
    Capture {
        /// File path, or `-` for stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Override the platform named in each frame.
        #[arg(short, long)]
        platform: Option<String>,
    },
    /// Save a pasted transcript (`User: ...` / `AI: ...` blocks).
    Add {
        #[arg(short, long, default_value = "manual")]
        platform: String,

        #[arg(short, long)]
        date: Option<String>,

        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        /// File path, or `-` for stdin.
        #[arg(short, long)]
        file: Option<String>,

        /// Store the input as a single message with this role.
        #[arg(short, long)]
        role: Option<Role>,
    },
    /// List one day's messages.
    Messages {
        #[arg(short, long)]
        date: Option<String>,

        #[arg(short, long)]
        platform: Option<String>,
    },
    /// Totals for one day plus the daily report line.
    Stats {
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Group one day's messages into conversations.
    Conversations {
        #[arg(short, long)]
        date: Option<String>,

        #[arg(short, long)]
        gap_minutes: Option<u64>,
    },
    /// Search every stored day, newest first.
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        #[arg(short, long)]
        platform: Option<String>,

        #[arg(short, long)]
        role: Option<Role>,

        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Export a date range as platform sessions.
    Export {
        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,

        /// Repeat to include several platforms; omit for all.
        #[arg(short, long = "platform")]
        platforms: Vec<String>,

        #[arg(short, long, default_value = "")]
        keyword: String,

        #[arg(short, long)]
        gap_minutes: Option<u64>,

        /// json, conversation, markdown, or qa.
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Wrap text output with instructions for the receiving model.
        #[arg(long)]
        guide: bool,

        #[arg(short, long)]
        output: Option<String>,
    },
    /// Daily summary: confirmed, cached, or freshly generated.
    Summary {
        #[arg(short, long)]
        date: Option<String>,

        /// Regenerate even when a cached or confirmed summary exists.
        #[arg(long)]
        force: bool,

        #[arg(long)]
        stream: bool,
    },
    /// Pin a summary for a day so it is served instead of generated text.
    Confirm {
        #[arg(short, long)]
        date: Option<String>,

        #[arg(short, long)]
        text: Option<String>,

        #[arg(short, long)]
        file: Option<String>,

        #[arg(long)]
        from_cache: bool,

        #[arg(long, conflicts_with_all = ["text", "file", "from_cache"])]
        clear: bool,
    },
    /// Show or change persisted settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Send a tiny request to the configured provider.
    TestApi,
    /// Delete message and summary days older than the retention window.
    Cleanup {
        #[arg(long)]
        days: Option<u64>,
    },
    /// Paths, store counts, and environment checks.
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Set {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        api_url: Option<String>,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        max_tokens: Option<u32>,
        #[arg(long)]
        system_prompt: Option<String>,
        #[arg(long)]
        timezone: Option<String>,
        #[arg(long)]
        view_gap_minutes: Option<u64>,
        #[arg(long)]
        export_gap_minutes: Option<u64>,
        #[arg(long)]
        max_results: Option<usize>,
        #[arg(long)]
        debounce_ms: Option<u64>,
        #[arg(long)]
        retention_days: Option<u64>,
    },
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for line in &report.details {
        println!("{line}");
    }
    for issue in &report.issues {
        eprintln!("issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Command::Capture { input, platform } => {
            commands::capture::run(&commands::capture::CaptureOptions { input, platform })?
        }
        Command::Add {
            platform,
            date,
            text,
            file,
            role,
        } => commands::add::run(&commands::add::AddOptions {
            platform,
            date,
            text,
            file,
            role,
        })?,
        Command::Messages { date, platform } => {
            commands::messages::run(&commands::messages::MessagesOptions { date, platform })?
        }
        Command::Stats { date } => commands::stats::run(date.as_deref())?,
        Command::Conversations { date, gap_minutes } => {
            commands::conversations::run(&commands::conversations::ConversationsOptions {
                date,
                gap_minutes,
            })?
        }
        Command::Search {
            query,
            platform,
            role,
            limit,
        } => commands::search::run(&commands::search::SearchOptions {
            query: query.join(" "),
            platform,
            role,
            limit,
        })?,
        Command::Export {
            from,
            to,
            platforms,
            keyword,
            gap_minutes,
            format,
            guide,
            output,
        } => commands::export::run(&commands::export::ExportOptions {
            from,
            to,
            platforms,
            keyword,
            gap_minutes,
            format,
            guide,
            output,
        })?,
        Command::Summary {
            date,
            force,
            stream,
        } => commands::summary::run(
            &commands::summary::SummaryOptions {
                date,
                force,
                stream,
            },
            cli.json,
        )?,
        Command::Confirm {
            date,
            text,
            file,
            from_cache,
            clear,
        } => commands::confirm::run(&commands::confirm::ConfirmOptions {
            date,
            text,
            file,
            from_cache,
            clear,
        })?,
        Command::Config { action } => match action {
            ConfigAction::Show => commands::config::show()?,
            ConfigAction::Set {
                provider,
                model,
                api_key,
                api_url,
                temperature,
                max_tokens,
                system_prompt,
                timezone,
                view_gap_minutes,
                export_gap_minutes,
                max_results,
                debounce_ms,
                retention_days,
            } => commands::config::set(&commands::config::ConfigSetOptions {
                provider,
                model,
                api_key,
                api_url,
                temperature,
                max_tokens,
                system_prompt,
                timezone,
                view_gap_minutes,
                export_gap_minutes,
                max_results,
                debounce_ms,
                retention_days,
            })?,
        },
        Command::TestApi => commands::test_api::run()?,
        Command::Cleanup { days } => commands::cleanup::run(days)?,
        Command::Status => commands::status::run()?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        bail!("{} failed", report.command);
    }
    Ok(())
}
