// aurs-net/src/rpc.rs
//! Client for the AUR RPC interface (v5).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use aurs_common::config::Config;
use aurs_common::dependency::{DependencySpec, DependencyTag};
use aurs_common::error::{AursError, Result};
use aurs_common::model::{PackageRef, PackageSource};
use aurs_common::universe::RegistryClient;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::http::{build_http_client, get_json, RetryPolicy};
use crate::validation::validate_url;

const RPC_VERSION: &str = "5";

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub resultcount: usize,
    #[serde(default)]
    pub results: Vec<RpcPackage>,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Query-level failure reported inside a 200 response.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RpcPackage {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub package_base: Option<String>,
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
    #[serde(default)]
    pub maintainer: Option<String>,
    #[serde(default)]
    pub num_votes: u64,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub out_of_date: Option<i64>,
    #[serde(default)]
    pub last_modified: Option<i64>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub make_depends: Vec<String>,
    #[serde(default)]
    pub check_depends: Vec<String>,
    #[serde(default)]
    pub opt_depends: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub replaces: Vec<String>,
}

impl RpcPackage {
    pub fn into_package_ref(self) -> PackageRef {
        let base = self.package_base.unwrap_or_else(|| self.name.clone());
        let mut package =
            PackageRef::new(self.name, self.version, PackageSource::Registry).with_base(base);
        package.description = self.description;
        package.url = self.url;
        package.maintainer = self.maintainer;
        package.num_votes = self.num_votes;
        package.popularity = self.popularity;
        package.out_of_date = self.out_of_date;
        package.last_modified = self.last_modified;
        package.depends = DependencySpec::parse_all(&self.depends, DependencyTag::RUNTIME);
        package.make_depends = DependencySpec::parse_all(&self.make_depends, DependencyTag::BUILD);
        package.check_depends = DependencySpec::parse_all(&self.check_depends, DependencyTag::TEST);
        package.opt_depends = DependencySpec::parse_all(&self.opt_depends, DependencyTag::OPTIONAL);
        package.provides = DependencySpec::parse_all(&self.provides, DependencyTag::empty());
        package.conflicts = DependencySpec::parse_all(&self.conflicts, DependencyTag::empty());
        package.replaces = DependencySpec::parse_all(&self.replaces, DependencyTag::empty());
        package
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchField {
    Name,
    #[default]
    NameDesc,
    Maintainer,
    Depends,
    MakeDepends,
    OptDepends,
    CheckDepends,
    Provides,
    Conflicts,
    Replaces,
    Keywords,
    Groups,
    Submitter,
    CoMaintainers,
}

impl SearchField {
    pub const ALL: [SearchField; 14] = [
        SearchField::Name,
        SearchField::NameDesc,
        SearchField::Maintainer,
        SearchField::Depends,
        SearchField::MakeDepends,
        SearchField::OptDepends,
        SearchField::CheckDepends,
        SearchField::Provides,
        SearchField::Conflicts,
        SearchField::Replaces,
        SearchField::Keywords,
        SearchField::Groups,
        SearchField::Submitter,
        SearchField::CoMaintainers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchField::Name => "name",
            SearchField::NameDesc => "name-desc",
            SearchField::Maintainer => "maintainer",
            SearchField::Depends => "depends",
            SearchField::MakeDepends => "makedepends",
            SearchField::OptDepends => "optdepends",
            SearchField::CheckDepends => "checkdepends",
            SearchField::Provides => "provides",
            SearchField::Conflicts => "conflicts",
            SearchField::Replaces => "replaces",
            SearchField::Keywords => "keywords",
            SearchField::Groups => "groups",
            SearchField::Submitter => "submitter",
            SearchField::CoMaintainers => "comaintainers",
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchField {
    type Err = AursError;

    fn from_str(s: &str) -> Result<Self> {
        SearchField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| AursError::ValidationError(format!("Unknown search field '{s}'")))
    }
}

#[derive(Debug, Clone)]
pub struct RpcClient {
    client: Client,
    base_url: String,
    batch_size: usize,
    retry: RetryPolicy,
}

impl RpcClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.rpc_url, config.http_timeout, config.rpc_batch_size)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration, batch_size: usize) -> Result<Self> {
        validate_url(base_url)?;
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.to_string(),
            batch_size: batch_size.max(1),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn query(&self, params: &[(&str, &str)]) -> Result<RpcResponse> {
        let response: RpcResponse = self.retry.run("AUR RPC request", || {
            get_json(&self.client, &self.base_url, params)
        })?;
        if let Some(message) = response.error.as_deref().filter(|m| !m.is_empty()) {
            return Err(AursError::Api(format!("AUR RPC error: {message}")));
        }
        Ok(response)
    }

    /// One `type=info` request for every name given.
    pub fn info_batch(&self, names: &[String]) -> Result<Vec<RpcPackage>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        debug!("AUR info request for {} name(s)", names.len());
        let mut params: Vec<(&str, &str)> = vec![("v", RPC_VERSION), ("type", "info")];
        params.extend(names.iter().map(|name| ("arg[]", name.as_str())));
        Ok(self.query(&params)?.results)
    }

    pub fn search(&self, by: SearchField, term: &str) -> Result<Vec<RpcPackage>> {
        debug!("AUR search by {} for '{}'", by, term);
        let params = [
            ("v", RPC_VERSION),
            ("type", "search"),
            ("by", by.as_str()),
            ("arg", term),
        ];
        Ok(self.query(&params)?.results)
    }
}

impl RegistryClient for RpcClient {
    fn info(&self, names: &[String]) -> Result<Vec<PackageRef>> {
        let mut packages = Vec::with_capacity(names.len());
        for chunk in names.chunks(self.batch_size) {
            packages.extend(
                self.info_batch(chunk)?
                    .into_iter()
                    .map(RpcPackage::into_package_ref),
            );
        }
        Ok(packages)
    }
}
