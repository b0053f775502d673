pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "kampus",
    about = "Kampus operator CLI",
    long_about = "Operate the kampus bot pair: migrations, allow-list management, activity log inspection, and readiness checks.",
    after_help = "Examples:\n  kampus migrate\n  kampus users add 123456789 dina\n  kampus logs --limit 20\n  kampus doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(subcommand, about = "Manage the end-user allow list")]
    Users(UsersCommand),
    #[command(about = "Show the most recent activity-log entries")]
    Logs {
        #[arg(long, default_value_t = 10, help = "Number of entries to show")]
        limit: u32,
    },
    #[command(about = "Validate config, database connectivity, and portal configuration")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum UsersCommand {
    #[command(about = "Grant a Telegram user access to the student bot")]
    Add {
        user_id: i64,
        #[arg(help = "Optional Telegram username, without the @")]
        username: Option<String>,
    },
    #[command(about = "Revoke a Telegram user's access")]
    Remove { user_id: i64 },
    #[command(about = "List all permitted users")]
    List,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Users(UsersCommand::Add { user_id, username }) => {
            commands::users::add(user_id, username.as_deref())
        }
        Command::Users(UsersCommand::Remove { user_id }) => commands::users::remove(user_id),
        Command::Users(UsersCommand::List) => commands::users::list(),
        Command::Logs { limit } => commands::logs::run(limit),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
