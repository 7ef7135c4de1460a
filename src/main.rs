mod categorizer;
mod cli;
mod db;
mod error;
mod importer;
mod models;
mod parse;
mod readers;
mod reporter;
mod rules;
mod settings;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{AccountsCommands, Cli, Commands, FeaturesCommands, RulesCommands, TransactionsCommands};

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Import { path, strict } => cli::import::run(&path, strict),
        Commands::Report { month, dir, output } => {
            cli::report::run(month.as_deref(), dir.as_deref(), output.as_deref())
        }
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                id,
                account_type,
                metadata,
            } => cli::accounts::add(&id, &account_type, metadata.as_deref()),
            AccountsCommands::List => cli::accounts::list(),
        },
        Commands::Transactions { command } => match command {
            TransactionsCommands::List { account } => cli::transactions::list(account.as_deref()),
            TransactionsCommands::Update {
                date,
                description,
                amount,
                account,
                shared,
            } => cli::transactions::update(&date, &description, &amount, account.as_deref(), shared),
        },
        Commands::Features { command } => match command {
            FeaturesCommands::Add {
                date,
                description,
                amount,
                value,
                origin,
            } => cli::features::add(&date, &description, &amount, &value, &origin),
            FeaturesCommands::List => cli::features::list(),
        },
        Commands::Rules { command } => match command {
            RulesCommands::Check {
                description,
                bank_category,
            } => cli::rules::check(description.as_deref(), bank_category.as_deref()),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
