pub mod table;
pub mod json;

use crate::config::Config;
use crate::store::catalog::BackupRecord;

pub const NO_BACKUPS: &str = "No backups found.";

pub fn print(records: &[BackupRecord], config: &Config) {
    if config.json_output {
        println!("{}", json::render(records));
    } else if records.is_empty() {
        println!("{NO_BACKUPS}");
    } else {
        println!("Available backups:");
        print!("{}", table::render(records));
        print_location(records, config.verbose);
    }
}

fn print_location(records: &[BackupRecord], verbose: bool) {
    if !verbose {
        return;
    }

    println!();
    for record in records {
        println!("  {}", record.path.display());
    }
}
