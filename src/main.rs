use clap::Parser;
use snapkeep::clean::CleanMode;
use snapkeep::cli::{Cli, Command};
use snapkeep::config::Config;
use snapkeep::report;
use snapkeep::store::{restore, Store};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("error: {e}");
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::from_cli(&cli).unwrap_or_else(|e| fail(e));
    let store = Store::open(&config).unwrap_or_else(|e| fail(e));

    match cli.command {
        Command::Backup(args) => match store.backup(&args.source, args.description.as_deref()) {
            Ok(path) => println!("{}", path.display()),
            Err(e) => fail(e),
        },
        Command::List(_) => match store.list_backups() {
            Ok(records) => report::print(&records, &config),
            Err(e) => fail(e),
        },
        Command::Clean(args) => {
            let keep = args.keep.unwrap_or_else(|| {
                i64::try_from(config.retention_limit()).unwrap_or(i64::MAX)
            });
            let mode = if args.dry_run {
                CleanMode::DryRun
            } else {
                CleanMode::Execute
            };

            let result = store.clean(keep, mode).unwrap_or_else(|e| fail(e));

            for path in &result.deleted {
                if args.dry_run {
                    println!("[dry-run] would delete: {}", path.display());
                } else {
                    println!("deleted: {}", path.display());
                }
            }

            if !result.is_clean() {
                eprintln!("\nerrors encountered:");
                for error in &result.errors {
                    eprintln!("  {error}");
                }
            }

            if result.deleted.is_empty() {
                println!("nothing to clean, {} or fewer backups present", keep);
            }
        }
        Command::Restore(args) => {
            let chosen = match args.slot {
                Some(slot) => store.restore_backup_by_index(slot).map(Some),
                None => store.restore_most_recent_backup(),
            };

            let backup = match chosen {
                Ok(Some(path)) => path,
                Ok(None) => fail("no backups found"),
                Err(e) => fail(e),
            };

            if let Some(destination) = &args.to {
                if let Err(e) = restore::restore_to(&backup, destination) {
                    fail(e);
                }
                println!("restored {} from {}", destination.display(), backup.display());
            } else {
                println!("{}", backup.display());
            }
        }
    }
}
