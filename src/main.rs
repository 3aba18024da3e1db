use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use duesboard::api::api_types::NewExpense;
use duesboard::api::ApiClient;
use duesboard::app::App;
use duesboard::commands;
use duesboard::config::{Config, Role};
use duesboard::hooks::HookContext;

#[derive(Parser, Debug)]
#[command(name = "duesboard")]
#[command(about = "A terminal dashboard for association dues, payments and expenses")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/duesboard/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Dashboard role to use
  #[arg(short, long, value_enum)]
  role: Option<Role>,

  /// College code for college-scoped roles
  #[arg(long)]
  college: Option<String>,

  /// Department code for department-scoped roles
  #[arg(short, long)]
  department: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Inspect or clear the local cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
  /// Record expenses
  Expense {
    #[command(subcommand)]
    action: ExpenseAction,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Show entry counts and sizes per namespace
  Stats,
  /// Remove cached entries
  Clear {
    /// Only remove keys starting with this prefix
    #[arg(long)]
    prefix: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
enum ExpenseAction {
  /// Record a new expense
  Add {
    #[arg(long)]
    title: String,
    #[arg(long)]
    amount: f64,
    /// Expense category (e.g. "event", "logistics")
    #[arg(long = "type")]
    expense_type: String,
    #[arg(long)]
    account: String,
    #[arg(long, default_value = "transfer")]
    method: String,
    #[arg(long)]
    description: Option<String>,
  },
}

/// Log to a daily file in the data directory; the terminal belongs to the UI.
fn init_tracing() -> Option<WorkerGuard> {
  let dir = dirs::data_dir()?.join("duesboard").join("logs");
  std::fs::create_dir_all(&dir).ok()?;

  let appender = tracing_appender::rolling::daily(dir, "duesboard.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_tracing();

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Command line overrides the configured session
  if let Some(role) = args.role {
    config.session.role = role;
  }
  if let Some(college) = args.college {
    config.session.college = Some(college);
  }
  if let Some(department) = args.department {
    config.session.department = Some(department);
  }
  config.session.validate()?;

  let client = ApiClient::new(&config)?;

  match args.command {
    None => {
      let mut app = App::new(config, client);
      app.run().await?;
    }
    Some(Command::Cache { action }) => {
      let context = HookContext::from_config(&config, client);
      match action {
        CacheAction::Stats => commands::cache_stats(&context)?,
        CacheAction::Clear { prefix } => commands::cache_clear(&context, prefix.as_deref())?,
      }
    }
    Some(Command::Expense {
      action:
        ExpenseAction::Add {
          title,
          amount,
          expense_type,
          account,
          method,
          description,
        },
    }) => {
      let timeout = Duration::from_secs(config.api.timeout_secs);
      let context = HookContext::from_config(&config, client);
      let expense = NewExpense {
        title,
        amount,
        expense_type,
        department: config.session.department.clone(),
        account,
        payment_method: method,
        description,
      };
      commands::expense_add(&context, expense, timeout).await?;
    }
  }

  Ok(())
}
