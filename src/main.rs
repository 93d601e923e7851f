use clap::Parser;
use expense_tracker::args::{Args, Command, DeleteArgs};
use expense_tracker::context::detect_system_theme;
use expense_tracker::model::ExpenseForm;
use expense_tracker::pipeline::DayZone;
use expense_tracker::{commands, AppContext, Config, Mode, Result, Theme};
use std::io::{BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().expenses_home().path();

    // When EXPENSES_IN_TEST_MODE is set and non-empty the in-memory API is used instead of the
    // configured server.
    let mode = Mode::from_env();
    let system = detect_system_theme();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.api_url()).await?.print(),

        Command::Signup(signup_args) => {
            let ctx = context(home, mode, system).await?;
            commands::signup(&ctx, signup_args.form()).await?.print()
        }

        Command::Login(login_args) => {
            let mut ctx = context(home, mode, system).await?;
            commands::login(&mut ctx, login_args.form()).await?.print()
        }

        Command::Logout => {
            let mut ctx = context(home, mode, system).await?;
            commands::logout(&mut ctx).await?.print()
        }

        Command::List(list_args) => {
            let ctx = context(home, mode, system).await?;
            // Date bounds are calendar days where the user is
            let filters = list_args.filters().with_zone(DayZone::Local);
            let out = commands::list(&ctx, filters, list_args.format()).await?;
            out.print();
            if let Some(rows) = out.structure() {
                println!("{rows}");
            }
        }

        Command::Add(add_args) => {
            let ctx = context(home, mode, system).await?;
            let form = ExpenseForm::new(
                add_args.title(),
                add_args.amount(),
                add_args.category(),
            );
            commands::add(&ctx, form).await?.print()
        }

        Command::Update(update_args) => {
            let ctx = context(home, mode, system).await?;
            commands::update(&ctx, update_args.clone()).await?.print()
        }

        Command::Delete(delete_args) => {
            if confirm_delete(delete_args) {
                let ctx = context(home, mode, system).await?;
                commands::delete(&ctx, delete_args.id()).await?.print()
            } else {
                debug!("Delete of {} cancelled", delete_args.id());
            }
        }

        Command::Summary => {
            let ctx = context(home, mode, system).await?;
            commands::summary(&ctx).await?.print()
        }

        Command::Theme(theme_args) => {
            let mut ctx = context(home, mode, system).await?;
            commands::theme(&mut ctx, theme_args.action(), system)
                .await?
                .print()
        }
    };
    Ok(())
}

async fn context(home: &Path, mode: Mode, system: Theme) -> Result<AppContext> {
    let config = Config::load(home).await?;
    AppContext::init(config, mode, system).await
}

/// Asks on the terminal unless `--yes` was given. Anything but "y" or "yes" declines.
fn confirm_delete(args: &DeleteArgs) -> bool {
    if args.yes() {
        return true;
    }
    eprint!("Delete expense {}? [y/N] ", args.id());
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "expense_tracker={},{}={}",
                level,
                env!("CARGO_CRATE_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
