//! `sleuth cases` - browse the published case catalog.

use anyhow::{Context, Result};
use clap::Subcommand;
use sleuth_core::catalog::{Case, CaseCatalog};
use sleuth_core::config::ClientConfig;

use super::print_json;

/// Case catalog subcommands.
#[derive(Subcommand, Debug)]
pub enum CasesCommand {
    /// List every case
    List,

    /// Show one case in full
    Show {
        /// Case id
        id: u64,
    },
}

/// Loads the catalog named by `catalog_path`.
pub fn load_catalog(config: &ClientConfig) -> Result<CaseCatalog> {
    let path = config
        .catalog_path
        .as_deref()
        .context("no case catalog configured (set catalog_path in the config file)")?;
    CaseCatalog::from_file(path)
        .with_context(|| format!("failed to load case catalog from {}", path.display()))
}

/// Runs a cases subcommand.
pub fn run(config: &ClientConfig, cmd: &CasesCommand, json: bool) -> Result<()> {
    let catalog = load_catalog(config)?;
    match cmd {
        CasesCommand::List => {
            if json {
                return print_json(&catalog.cases());
            }
            if catalog.is_empty() {
                println!("No cases published");
            }
            for case in catalog.cases() {
                println!("{}", list_line(case));
            }
        },
        CasesCommand::Show { id } => {
            let case = catalog.find(*id)?;
            if json {
                return print_json(case);
            }
            println!("#{} {}", case.id, case.title);
            if let Some(date) = &case.created_date {
                println!("Published: {date}");
            }
            println!();
            println!("{}", case.description);
        },
    }
    Ok(())
}

fn list_line(case: &Case) -> String {
    match &case.created_date {
        Some(date) => format!("{:>4}  {}  ({date})", case.id, case.title),
        None => format!("{:>4}  {}", case.id, case.title),
    }
}
