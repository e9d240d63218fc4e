#![warn(clippy::unwrap_used)]

use std::{net::Ipv4Addr, path::PathBuf};

use alloy_primitives::B256;
use anyhow::Result;
use clap::Parser;
use cl_packet_parser::{decoder::PacketDecoder, labels::AddressBook, output::parse_capture_file};
use lc_utils::log::init_tracing_logger;
use light_client::config::NetworkSpec;
use tracing::info;

const APP_NAME: &str = "cl-network-packet-parser";

#[derive(Parser, Debug, PartialEq, Clone)]
#[command(
    name = APP_NAME,
    about = "Decode consensus layer gossip and req/resp messages from a tcpdump text capture"
)]
struct ParserCli {
    #[arg(help = "Output of tcpdump -x or -X")]
    source_file: PathBuf,

    #[arg(help = "File the decoded messages are written to")]
    output_file: PathBuf,

    #[arg(help = "Consensus config.yaml of the captured network")]
    config_file: PathBuf,

    #[arg(help = "Genesis validators root of the captured network")]
    genesis_validators_root: B256,

    #[arg(
        long,
        help = "JSON printed by docker inspect, used to name container addresses"
    )]
    containers: Option<PathBuf>,

    #[arg(
        long = "label",
        value_parser = AddressBook::parse_pair,
        help = "Names an address, as ip=name. May be repeated"
    )]
    labels: Vec<(Ipv4Addr, String)>,
}

impl ParserCli {
    fn address_book(&self) -> Result<Option<AddressBook>> {
        let mut book = match &self.containers {
            Some(path) => AddressBook::from_docker_inspect_file(path)?,
            None => AddressBook::default(),
        };
        for (ip, name) in &self.labels {
            book.insert(*ip, name.clone());
        }
        Ok((!book.is_empty()).then_some(book))
    }
}

fn main() -> Result<()> {
    init_tracing_logger("info");
    let cli = ParserCli::parse();

    let spec = NetworkSpec::from_yaml_file(&cli.config_file, cli.genesis_validators_root)?;
    let decoder = PacketDecoder::new(&spec);
    let labels = cli.address_book()?;
    if let Some(labels) = &labels {
        info!(addresses = labels.len(), "labeling container addresses");
    }

    let summary = parse_capture_file(&cli.source_file, &cli.output_file, &decoder, labels.as_ref())?;
    println!("{summary}");

    Ok(())
}
