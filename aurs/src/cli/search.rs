// aurs/src/cli/search.rs
use aurs_common::config::Config;
use aurs_common::error::Result;
use aurs_net::{RpcClient, RpcPackage, SearchField};
use clap::Args;
use colored::Colorize;
use terminal_size::{terminal_size, Width};

use crate::pipeline::join_error;

const DEFAULT_WIDTH: usize = 80;
const INDENT: &str = "    ";

#[derive(Args, Debug)]
pub struct Search {
    pub query: String,

    /// Field to match against (name, name-desc, maintainer, depends, provides, ...)
    #[arg(long, default_value = "name-desc")]
    pub by: SearchField,
}

impl Search {
    pub async fn run(&self, config: &Config) -> Result<()> {
        tracing::debug!("Searching the AUR by {} for: {}", self.by, self.query);
        let config = config.clone();
        let by = self.by;
        let query = self.query.clone();
        let mut results =
            tokio::task::spawn_blocking(move || RpcClient::new(&config)?.search(by, &query))
                .await
                .map_err(join_error)??;

        if results.is_empty() {
            println!("No AUR packages match \"{}\"", self.query);
            return Ok(());
        }

        sort_by_popularity(&mut results);
        let width = terminal_size()
            .map(|(Width(w), _)| w as usize)
            .unwrap_or(DEFAULT_WIDTH);
        for package in &results {
            print_result(package, width);
        }
        Ok(())
    }
}

/// Most popular first; ties broken by name.
pub fn sort_by_popularity(results: &mut [RpcPackage]) {
    results.sort_by(|a, b| {
        b.popularity
            .total_cmp(&a.popularity)
            .then_with(|| a.name.cmp(&b.name))
    });
}

fn print_result(package: &RpcPackage, width: usize) {
    let mut header = format!(
        "{}{} {} {}",
        "aur/".magenta().bold(),
        package.name.bold(),
        package.version.green(),
        format!("(+{} {:.2})", package.num_votes, package.popularity).dimmed()
    );
    if package.out_of_date.is_some() {
        header.push_str(&format!(" {}", "[out of date]".red()));
    }
    println!("{header}");

    if let Some(description) = package.description.as_deref() {
        for line in wrap_description(description, width) {
            println!("{line}");
        }
    }
}

fn wrap_description(description: &str, width: usize) -> Vec<String> {
    let options = textwrap::Options::new(width.max(INDENT.len() + 20))
        .initial_indent(INDENT)
        .subsequent_indent(INDENT);
    textwrap::wrap(description, options)
        .into_iter()
        .map(|line| line.into_owned())
        .collect()
}
