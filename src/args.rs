//! These structs provide the CLI interface for the expenses CLI.

use crate::commands::OutputFormat;
use crate::context::Theme;
use crate::model::{ExpenseId, LoginForm, SignupForm};
use crate::pipeline::{FilterConfig, SortKey};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// expenses: A command-line client for a personal expense tracker.
///
/// Expenses are stored by a remote expense API. This program signs you in, lists your expenses
/// with filters and sorting, adds, edits and deletes them, and summarizes spending per category.
///
/// Start with `expenses init --api-url <URL>`, then `expenses signup` and `expenses login`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and the configuration file.
    ///
    /// This is the first command you should run. Pass the base URL of the expense API, e.g.
    /// http://localhost:5000/api, and optionally --expenses-home if you do not want the default
    /// of $HOME/expenses.
    Init(InitArgs),
    /// Create an account with the expense API.
    Signup(SignupArgs),
    /// Log in and save the session token for later commands.
    Login(LoginArgs),
    /// Forget the saved session token.
    Logout,
    /// List expenses, optionally filtered by category and date and sorted.
    List(ListArgs),
    /// Add an expense.
    Add(AddArgs),
    /// Change the title, amount or category of an expense.
    Update(UpdateArgs),
    /// Delete an expense.
    Delete(DeleteArgs),
    /// Show the total, count and average of all expenses and the spending per category.
    Summary,
    /// Show or change the light/dark theme.
    Theme(ThemeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where configuration and the session are held. Defaults to ~/expenses
    #[arg(long, env = "EXPENSES_HOME", default_value_t = default_expenses_home())]
    expenses_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, expenses_home: PathBuf) -> Self {
        Self {
            log_level,
            expenses_home: expenses_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn expenses_home(&self) -> &DisplayPath {
        &self.expenses_home
    }
}

/// (Not shown): Args for the `expenses init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The base URL of the expense API, e.g. http://localhost:5000/api
    #[arg(long)]
    api_url: String,
}

impl InitArgs {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

/// (Not shown): Args for the `expenses signup` command.
#[derive(Debug, Parser, Clone)]
pub struct SignupArgs {
    #[arg(long)]
    username: String,

    #[arg(long)]
    email: String,

    #[arg(long, env = "EXPENSES_PASSWORD", hide_env_values = true)]
    password: String,
}

impl SignupArgs {
    pub fn form(&self) -> SignupForm {
        SignupForm {
            username: self.username.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

/// (Not shown): Args for the `expenses login` command.
#[derive(Debug, Parser, Clone)]
pub struct LoginArgs {
    #[arg(long)]
    email: String,

    #[arg(long, env = "EXPENSES_PASSWORD", hide_env_values = true)]
    password: String,
}

impl LoginArgs {
    pub fn form(&self) -> LoginForm {
        LoginForm {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

/// (Not shown): Args for the `expenses list` command.
#[derive(Debug, Parser, Clone)]
pub struct ListArgs {
    /// Only show expenses in this category (exact match).
    #[arg(long)]
    category: Option<String>,

    /// Only show expenses on or after this day, e.g. 2025-10-01
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Only show expenses on or before this day, e.g. 2025-10-31
    #[arg(long)]
    end: Option<NaiveDate>,

    /// The sort order. Without it, expenses are listed newest-created first.
    #[arg(long, value_enum, default_value_t = SortKey::None)]
    sort: SortKey,

    /// The output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

impl ListArgs {
    pub fn new(
        category: Option<String>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        sort: SortKey,
        format: OutputFormat,
    ) -> Self {
        Self {
            category,
            start,
            end,
            sort,
            format,
        }
    }

    /// The filter configuration these args describe, in the default zone.
    pub fn filters(&self) -> FilterConfig {
        let mut filters = FilterConfig::new().with_sort(self.sort);
        if let Some(category) = &self.category {
            filters = filters.with_category(category.clone());
        }
        if let Some(start) = self.start {
            filters = filters.with_start(start);
        }
        if let Some(end) = self.end {
            filters = filters.with_end(end);
        }
        filters
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

/// (Not shown): Args for the `expenses add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    #[arg(long)]
    title: String,

    /// The amount, e.g. 12.50
    #[arg(long, allow_hyphen_values = true)]
    amount: String,

    #[arg(long)]
    category: String,
}

impl AddArgs {
    pub fn new(
        title: impl Into<String>,
        amount: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            amount: amount.into(),
            category: category.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

/// (Not shown): Args for the `expenses update` command. Fields that are not given keep their
/// current values.
#[derive(Debug, Parser, Clone)]
pub struct UpdateArgs {
    /// The id of the expense, as shown by `expenses list`.
    id: String,

    #[arg(long)]
    title: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    amount: Option<String>,

    #[arg(long)]
    category: Option<String>,
}

impl UpdateArgs {
    pub fn new(
        id: impl Into<String>,
        title: Option<String>,
        amount: Option<String>,
        category: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title,
            amount,
            category,
        }
    }

    pub fn id(&self) -> ExpenseId {
        ExpenseId::new(&self.id)
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn amount(&self) -> Option<&str> {
        self.amount.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

/// (Not shown): Args for the `expenses delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The id of the expense, as shown by `expenses list`.
    id: String,

    /// Do not ask for confirmation.
    #[arg(long, short)]
    yes: bool,
}

impl DeleteArgs {
    pub fn new(id: impl Into<String>, yes: bool) -> Self {
        Self { id: id.into(), yes }
    }

    pub fn id(&self) -> ExpenseId {
        ExpenseId::new(&self.id)
    }

    pub fn yes(&self) -> bool {
        self.yes
    }
}

/// What to do with the theme.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeAction {
    /// Print the current theme.
    #[default]
    Show,
    /// Switch between light and dark.
    Toggle,
    /// Use the light theme.
    Light,
    /// Use the dark theme.
    Dark,
    /// Forget the saved choice and follow the terminal.
    System,
}

impl ThemeAction {
    /// The theme this action selects explicitly, if any.
    pub fn theme(&self) -> Option<Theme> {
        match self {
            ThemeAction::Light => Some(Theme::Light),
            ThemeAction::Dark => Some(Theme::Dark),
            _ => None,
        }
    }
}

/// (Not shown): Args for the `expenses theme` command.
#[derive(Debug, Parser, Clone)]
pub struct ThemeArgs {
    #[arg(value_enum, default_value_t = ThemeAction::Show)]
    action: ThemeAction,
}

impl ThemeArgs {
    pub fn new(action: ThemeAction) -> Self {
        Self { action }
    }

    pub fn action(&self) -> ThemeAction {
        self.action
    }
}

fn default_expenses_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("expenses"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --expenses-home or EXPENSES_HOME instead of relying on the \
                default expenses home directory.",
            );
            PathBuf::from("expenses")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["expenses", "--expenses-home", "/tmp/expenses-args-test"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_is_well_formed() {
        <Args as CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_list_args_to_filters() {
        let args = parse(&[
            "list",
            "--category",
            "Food",
            "--start",
            "2025-10-01",
            "--sort",
            "amount-desc",
            "--format",
            "csv",
        ]);
        let Command::List(list) = args.command() else {
            panic!("expected list, got {:?}", args.command());
        };
        let filters = list.filters();
        assert_eq!(filters.category(), Some("Food"));
        assert_eq!(filters.start(), NaiveDate::from_ymd_opt(2025, 10, 1));
        assert_eq!(filters.end(), None);
        assert_eq!(filters.sort(), SortKey::AmountDesc);
        assert_eq!(list.format(), OutputFormat::Csv);
    }

    #[test]
    fn test_add_accepts_negative_amount_text() {
        let args = parse(&["add", "--title", "Refund", "--amount", "-5", "--category", "Food"]);
        let Command::Add(add) = args.command() else {
            panic!("expected add");
        };
        assert_eq!(add.amount(), "-5");
    }

    #[test]
    fn test_theme_defaults_to_show() {
        let args = parse(&["theme"]);
        let Command::Theme(theme) = args.command() else {
            panic!("expected theme");
        };
        assert_eq!(theme.action(), ThemeAction::Show);
        assert_eq!(ThemeAction::Dark.theme(), Some(Theme::Dark));
    }

    #[test]
    fn test_bad_date_rejected() {
        let argv = ["expenses", "list", "--start", "10/01/2025"];
        assert!(Args::try_parse_from(argv).is_err());
    }
}
