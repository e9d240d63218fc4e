//! Names for the addresses of a local test network.

use std::{collections::HashMap, fs, net::Ipv4Addr, path::Path};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

#[derive(Deserialize)]
struct ContainerInspect {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "NetworkSettings")]
    network_settings: NetworkSettings,
}

#[derive(Deserialize)]
struct NetworkSettings {
    #[serde(rename = "Networks", default)]
    networks: HashMap<String, EndpointSettings>,
}

#[derive(Deserialize)]
struct EndpointSettings {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

/// Maps container IPs to container names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBook {
    names: HashMap<Ipv4Addr, String>,
}

impl AddressBook {
    /// Reads the JSON array printed by `docker inspect <container>...`.
    pub fn from_docker_inspect(json: &str) -> Result<Self> {
        let containers: Vec<ContainerInspect> =
            serde_json::from_str(json).context("invalid docker inspect output")?;

        let mut book = Self::default();
        for container in containers {
            let name = container.name.trim_start_matches('/');
            for endpoint in container.network_settings.networks.values() {
                if let Ok(ip) = endpoint.ip_address.parse() {
                    book.insert(ip, name);
                }
            }
        }
        Ok(book)
    }

    pub fn from_docker_inspect_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_docker_inspect(&json)
    }

    pub fn insert(&mut self, ip: Ipv4Addr, name: impl Into<String>) {
        self.names.insert(ip, name.into());
    }

    pub fn name(&self, ip: &Ipv4Addr) -> Option<&str> {
        self.names.get(ip).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Parses an `ip=name` pair.
    pub fn parse_pair(pair: &str) -> Result<(Ipv4Addr, String)> {
        let (ip, name) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected ip=name, got {pair}"))?;
        let ip = ip
            .trim()
            .parse()
            .with_context(|| format!("invalid ip address in {pair}"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("empty name in {pair}"));
        }
        Ok((ip, name.to_string()))
    }

    /// Replaces every known IPv4 address in `line` by its name. Ports are kept, so
    /// `172.16.0.11:9000` becomes `cl-1-lighthouse:9000`.
    pub fn label_line(&self, line: &str) -> String {
        let mut labeled = String::with_capacity(line.len());
        let mut rest = line;

        while let Some(start) = rest.find(|c: char| c.is_ascii_digit()) {
            let (before, candidate) = rest.split_at(start);
            labeled.push_str(before);

            let end = candidate
                .find(|c: char| !c.is_ascii_digit() && c != '.')
                .unwrap_or(candidate.len());
            let (token, after) = candidate.split_at(end);
            // tcpdump ends an address with `.` or `:`, e.g. `> 10.0.0.1.9000:`
            let address = token.trim_end_matches('.');
            match address.parse::<Ipv4Addr>().ok().and_then(|ip| self.name(&ip)) {
                Some(name) => {
                    labeled.push_str(name);
                    labeled.push_str(&token[address.len()..]);
                }
                None => labeled.push_str(token),
            }
            rest = after;
        }

        labeled.push_str(rest);
        labeled
    }
}
