//! Order command implementation

use std::path::PathBuf;

use super::{load_settings, parse_tables};
use crate::api::ApiClient;
use crate::cli::error::CliError;
use crate::resolve::DependencyResolver;

/// Arguments for the order command
#[derive(Debug, Clone)]
pub struct OrderArgs {
    pub tables: Vec<String>,
    pub config_dir: PathBuf,
    pub schema: Option<String>,
}

/// Handle the order command: print the parents-first load order
pub fn handle_order(args: &OrderArgs) -> Result<(), CliError> {
    let settings = load_settings(&args.config_dir)?;
    let default_schema = args
        .schema
        .as_deref()
        .unwrap_or(&settings.upload.default_schema);

    let tables = parse_tables(&args.tables, default_schema);
    if tables.is_empty() {
        return Err(CliError::InvalidArgument(
            "At least one table is required".to_string(),
        ));
    }

    let client = ApiClient::from_settings(&settings)?;
    let resolution = DependencyResolver::new(&client).resolve(&tables)?;

    for (position, table) in resolution.order.iter().enumerate() {
        let parents = resolution.graph.parents_of(table);
        if parents.is_empty() {
            println!("{}. {}", position + 1, table);
        } else {
            let parents: Vec<String> = parents.iter().map(ToString::to_string).collect();
            println!("{}. {} (after {})", position + 1, table, parents.join(", "));
        }
    }
    Ok(())
}
