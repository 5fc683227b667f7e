// aurs/src/cli/info.rs
use aurs_common::config::Config;
use aurs_common::dependency::DependencySpec;
use aurs_common::error::{AursError, Result};
use aurs_common::model::PackageRef;
use aurs_common::RegistryClient;
use aurs_core::{BatchedRegistry, WorkerPool};
use aurs_net::RpcClient;
use clap::Args;
use colored::Colorize;
use prettytable::{format, row, Table};

use crate::pipeline::join_error;

#[derive(Args, Debug)]
pub struct Info {
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Print the records as JSON
    #[arg(long)]
    pub json: bool,
}

impl Info {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let config = config.clone();
        let names = self.names.clone();
        let packages = tokio::task::spawn_blocking(move || fetch_info(&config, &names))
            .await
            .map_err(join_error)??;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&packages)?);
            return Ok(());
        }

        for (i, package) in packages.iter().enumerate() {
            if i > 0 {
                println!();
            }
            print_package(package);
        }
        Ok(())
    }
}

/// Registry records for `names`, in the order asked for.
fn fetch_info(config: &Config, names: &[String]) -> Result<Vec<PackageRef>> {
    let registry = BatchedRegistry::new(RpcClient::new(config)?, WorkerPool::with_default_size());
    let mut found = registry.info(names)?;

    let missing: Vec<String> = names
        .iter()
        .filter(|name| !found.iter().any(|p| &p.name == *name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(AursError::PackagesNotFoundInRegistry {
            packages: missing,
            wanted_by: Vec::new(),
        });
    }

    found.sort_by_key(|p| names.iter().position(|name| name == &p.name));
    Ok(found)
}

fn joined(specs: &[DependencySpec]) -> String {
    if specs.is_empty() {
        return "None".to_string();
    }
    specs
        .iter()
        .map(|spec| spec.raw_line.as_str())
        .collect::<Vec<_>>()
        .join("  ")
}

fn print_package(package: &PackageRef) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(row!["Name", package.name.bold()]);
    table.add_row(row!["Version", package.version.green()]);
    table.add_row(row!["Package Base", package.package_base]);
    table.add_row(row![
        "Description",
        package.description.as_deref().unwrap_or("None")
    ]);
    table.add_row(row!["URL", package.url.as_deref().unwrap_or("None")]);
    table.add_row(row![
        "Maintainer",
        package.maintainer.as_deref().unwrap_or("orphan")
    ]);
    table.add_row(row!["Votes", package.num_votes]);
    table.add_row(row!["Popularity", format!("{:.2}", package.popularity)]);
    table.add_row(row![
        "Out Of Date",
        if package.out_of_date.is_some() {
            "Yes".red()
        } else {
            "No".normal()
        }
    ]);
    table.add_row(row!["Depends On", joined(&package.depends)]);
    table.add_row(row!["Make Deps", joined(&package.make_depends)]);
    table.add_row(row!["Check Deps", joined(&package.check_depends)]);
    table.add_row(row!["Optional Deps", joined(&package.opt_depends)]);
    table.add_row(row!["Provides", joined(&package.provides)]);
    table.add_row(row!["Conflicts With", joined(&package.conflicts)]);
    table.add_row(row!["Replaces", joined(&package.replaces)]);
    table.printstd();
}
