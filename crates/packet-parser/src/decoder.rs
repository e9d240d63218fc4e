use std::fmt;

use light_client::config::NetworkSpec;
use tracing::trace;

use crate::{
    fork_digest::ForkDigests,
    gossip::{decode_gossip, DecodedGossip},
    multistream::decode_multistream,
    rpc::{decode_any_request, decode_any_response, protocol::SupportedProtocol},
};

const GOSSIPSUB_PROTOCOL: &str = "/meshsub/1.1.0";
const MULTISTREAM_PROTOCOL: &str = "/multistream/1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Gossip,
    Multistream,
    RpcRequest,
    RpcResponse,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gossip => "Gossip",
            Self::Multistream => "Multistream",
            Self::RpcRequest => "RPC Request",
            Self::RpcResponse => "RPC Response",
        })
    }
}

/// One decoded message found in a TCP payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub kind: PayloadKind,
    pub protocol: String,
    pub data: String,
}

impl DecodedMessage {
    fn new(kind: PayloadKind, protocol: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind,
            protocol: protocol.into(),
            data: data.into(),
        }
    }
}

/// Recognizes consensus p2p traffic in TCP payloads.
#[derive(Debug, Clone)]
pub struct PacketDecoder {
    fork_digests: ForkDigests,
    protocols: Vec<SupportedProtocol>,
}

impl PacketDecoder {
    pub fn new(spec: &NetworkSpec) -> Self {
        Self::from_fork_digests(ForkDigests::new(&spec.forks, spec.chain.genesis_root))
    }

    pub fn from_fork_digests(fork_digests: ForkDigests) -> Self {
        let protocols = SupportedProtocol::currently_supported(&fork_digests);
        Self {
            fork_digests,
            protocols,
        }
    }

    pub fn fork_digests(&self) -> &ForkDigests {
        &self.fork_digests
    }

    /// Decodes `payload` as gossip, then multistream negotiation, then an RPC request and
    /// finally an RPC response. Returns `None` when no decoding applies.
    pub fn decode_payload(&self, payload: &[u8]) -> Option<Vec<DecodedMessage>> {
        match decode_gossip(payload) {
            Ok(gossip) => return Some(self.gossip_messages(gossip)),
            Err(err) => trace!(error = %err, "not a gossipsub payload"),
        }

        if let Some(lines) = decode_multistream(payload) {
            return Some(
                lines
                    .into_iter()
                    .map(|line| DecodedMessage::new(PayloadKind::Multistream, MULTISTREAM_PROTOCOL, line))
                    .collect(),
            );
        }

        if let Some((protocol, request)) = decode_any_request(&self.protocols, payload) {
            return Some(vec![DecodedMessage::new(
                PayloadKind::RpcRequest,
                protocol.protocol_id(),
                request.to_string(),
            )]);
        }

        let (protocol, responses) =
            decode_any_response(&self.protocols, payload, &self.fork_digests)?;
        Some(
            responses
                .into_iter()
                .map(|response| {
                    DecodedMessage::new(
                        PayloadKind::RpcResponse,
                        protocol.protocol_id(),
                        response.to_string(),
                    )
                })
                .collect(),
        )
    }

    fn gossip_messages(&self, gossip: DecodedGossip) -> Vec<DecodedMessage> {
        if gossip.messages.is_empty() {
            let subscriptions: Vec<String> = gossip
                .subscriptions
                .iter()
                .map(|(subscribe, topic)| format!("{}{topic}", if *subscribe { '+' } else { '-' }))
                .collect();
            let data = format!(
                "subscriptions: [{}], control messages: {}",
                subscriptions.join(", "),
                gossip.control_messages
            );
            return vec![DecodedMessage::new(PayloadKind::Gossip, GOSSIPSUB_PROTOCOL, data)];
        }

        gossip
            .messages
            .into_iter()
            .map(|message| {
                let len = message.data.len();
                let data = match self.fork_digests.fork_name(message.topic.fork_digest) {
                    Some(fork) => format!("{fork} payload of {len} bytes"),
                    None => format!("payload of {len} bytes"),
                };
                DecodedMessage::new(PayloadKind::Gossip, message.topic.to_string(), data)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use light_client::{config::networks, consensus::types::ForkName};
    use ssz::Encode;

    use super::*;
    use crate::{
        gossip::proto,
        rpc::methods::{Ping, StatusMessage},
        test_utils::{gossip_frame, multistream_line, published, response_chunk, ssz_snappy},
    };

    fn decoder() -> PacketDecoder {
        let mainnet = networks::mainnet();
        PacketDecoder::new(&NetworkSpec {
            chain: mainnet.chain,
            forks: mainnet.forks,
        })
    }

    #[test]
    fn payload_kinds() {
        assert_eq!(PayloadKind::RpcRequest.to_string(), "RPC Request");
        assert_eq!(PayloadKind::Gossip.to_string(), "Gossip");
    }

    #[test]
    fn decodes_gossip_messages() {
        let decoder = decoder();
        let payload = gossip_frame(&proto::Rpc {
            publish: vec![published(
                "/eth2/6a95a1a9/light_client_finality_update/ssz_snappy",
                &[9; 300],
            )],
            ..Default::default()
        });

        let decoded = decoder.decode_payload(&payload).unwrap();
        assert_eq!(
            decoded,
            vec![DecodedMessage::new(
                PayloadKind::Gossip,
                "/eth2/6a95a1a9/light_client_finality_update/ssz_snappy",
                "deneb payload of 300 bytes"
            )]
        );
    }

    #[test]
    fn summarizes_gossip_without_messages() {
        let payload = gossip_frame(&proto::Rpc {
            subscriptions: vec![proto::SubOpts {
                subscribe: Some(false),
                topic_id: Some("/eth2/6a95a1a9/voluntary_exit/ssz_snappy".to_string()),
            }],
            ..Default::default()
        });

        let decoded = decoder().decode_payload(&payload).unwrap();
        assert_eq!(decoded[0].protocol, GOSSIPSUB_PROTOCOL);
        assert_eq!(
            decoded[0].data,
            "subscriptions: [-/eth2/6a95a1a9/voluntary_exit/ssz_snappy], control messages: 0"
        );
    }

    #[test]
    fn decodes_multistream_and_rpc() {
        let decoder = decoder();

        let negotiation = multistream_line("/eth2/beacon_chain/req/ping/1/ssz_snappy");
        let decoded = decoder.decode_payload(&negotiation).unwrap();
        assert_eq!(decoded[0].kind, PayloadKind::Multistream);
        assert_eq!(decoded[0].data, "/eth2/beacon_chain/req/ping/1/ssz_snappy");

        let status = StatusMessage {
            fork_digest: decoder.fork_digests().digest(ForkName::Deneb).unwrap(),
            finalized_root: B256::ZERO,
            finalized_epoch: 1,
            head_root: B256::ZERO,
            head_slot: 40,
        };
        let decoded = decoder
            .decode_payload(&ssz_snappy(&status.as_ssz_bytes()))
            .unwrap();
        assert_eq!(decoded[0].kind, PayloadKind::RpcRequest);
        assert_eq!(
            decoded[0].protocol,
            "/eth2/beacon_chain/req/status/1/ssz_snappy"
        );

        let pong = response_chunk(0, None, &Ping { data: 7 }.as_ssz_bytes());
        let decoded = decoder.decode_payload(&pong).unwrap();
        assert_eq!(decoded[0].kind, PayloadKind::RpcResponse);
        assert_eq!(decoded[0].data, "Pong { data: 7 }");
    }

    #[test]
    fn skips_unknown_payloads() {
        assert_eq!(decoder().decode_payload(b"GET / HTTP/1.1\r\n\r\n"), None);
        assert_eq!(decoder().decode_payload(&[0xff; 32]), None);
    }
}
