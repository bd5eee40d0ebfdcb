//! Raw log queries and ABI-decoded contract events.
//!
//! Logs come back in node order (block, then log index). Decoding is
//! per-record: a record that does not match the interface is returned raw and
//! the rest of the query is unaffected.

use alloy::dyn_abi::{DecodedEvent, EventExt};
use alloy::json_abi::{Event, JsonAbi};
use alloy::primitives::{Address, Bytes, B256};
use alloy::rpc::types::{Filter, Log, Topic};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::blockchain::abi::resolve_event;
use crate::blockchain::rpc::ChainRpc;
use crate::blockchain::serialize::{serialize, to_json};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::validate::{parse_address, parse_block_tag};

/// Raw log filter. Absent fields are unrestricted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogQuery {
    pub address: Option<String>,
    /// Topic positions 0..=3; `None` is a wildcard.
    pub topics: Vec<Option<String>>,
    pub from_block: Option<String>,
    pub to_block: Option<String>,
}

/// Contract event filter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventQuery {
    pub address: String,
    /// Interface description (JSON ABI or human-readable signatures).
    pub abi: String,
    /// Event name or signature; when absent every event of the contract matches.
    pub event_name: Option<String>,
    /// Indexed-argument topics following topic0.
    pub topics: Vec<Option<String>>,
    pub from_block: Option<String>,
    pub to_block: Option<String>,
}

/// A log as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
    pub transaction_hash: Option<B256>,
    pub transaction_index: Option<u64>,
    pub log_index: Option<u64>,
    pub removed: bool,
}

impl From<&Log> for LogRecord {
    fn from(log: &Log) -> Self {
        Self {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number,
            block_hash: log.block_hash,
            transaction_hash: log.transaction_hash,
            transaction_index: log.transaction_index,
            log_index: log.log_index,
            removed: log.removed,
        }
    }
}

/// The decoded part of an event record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedEventData {
    pub name: String,
    pub signature: String,
    /// Arguments by name (positional index when unnamed), rendered losslessly.
    pub args: Map<String, Value>,
}

/// A log with its decoded event, when decoding succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    #[serde(flatten)]
    pub log: LogRecord,
    pub event: Option<DecodedEventData>,
}

/// Validated query, ready for the wire.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    filter: Filter,
}

impl PreparedQuery {
    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

fn parse_topic(value: &str, field: &str) -> BlockchainResult<B256> {
    let body = value
        .strip_prefix("0x")
        .filter(|body| body.len() == 64 && body.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| {
            BlockchainError::Validation(format!(
                "{field}: expected 0x followed by 64 hex characters, got '{value}'"
            ))
        })?;
    body.parse::<B256>()
        .map_err(|e| BlockchainError::Validation(format!("{field}: {e}")))
}

fn build_filter(
    address: Option<Address>,
    topics: &[Option<B256>],
    from_block: Option<&str>,
    to_block: Option<&str>,
) -> BlockchainResult<Filter> {
    if topics.len() > 4 {
        return Err(BlockchainError::Validation(format!(
            "topics: at most 4 positions are allowed, got {}",
            topics.len()
        )));
    }

    let mut filter = Filter::new();
    if let Some(address) = address {
        filter = filter.address(address);
    }
    if let Some(from) = from_block {
        filter = filter.from_block(parse_block_tag(from, "fromBlock")?);
    }
    if let Some(to) = to_block {
        filter = filter.to_block(parse_block_tag(to, "toBlock")?);
    }
    for (position, topic) in topics.iter().enumerate() {
        if let Some(topic) = topic {
            filter.topics[position] = Topic::from(*topic);
        }
    }
    Ok(filter)
}

fn parse_topics(topics: &[Option<String>], offset: usize) -> BlockchainResult<Vec<Option<B256>>> {
    topics
        .iter()
        .enumerate()
        .map(|(i, topic)| {
            topic
                .as_deref()
                .map(|t| parse_topic(t, &format!("topics[{}]", i + offset)))
                .transpose()
        })
        .collect()
}

impl LogQuery {
    /// Validate every field before any network access.
    pub fn prepare(&self) -> BlockchainResult<PreparedQuery> {
        let address = self
            .address
            .as_deref()
            .map(|a| parse_address(a, "address"))
            .transpose()?;
        let topics = parse_topics(&self.topics, 0)?;
        let filter = build_filter(
            address,
            &topics,
            self.from_block.as_deref(),
            self.to_block.as_deref(),
        )?;
        Ok(PreparedQuery { filter })
    }
}

/// Fetch logs in node order.
pub async fn query_logs(rpc: &dyn ChainRpc, query: &PreparedQuery) -> BlockchainResult<Vec<LogRecord>> {
    let logs = rpc.logs(&query.filter).await?;
    tracing::debug!(count = logs.len(), "Logs fetched");
    Ok(logs.iter().map(LogRecord::from).collect())
}

/// Validated event query together with its interface.
#[derive(Debug, Clone)]
pub struct PreparedEventQuery {
    query: PreparedQuery,
    abi: JsonAbi,
}

impl EventQuery {
    /// Validate the query and resolve the event; an unknown event fails here,
    /// before any log is fetched.
    pub fn prepare(&self) -> BlockchainResult<PreparedEventQuery> {
        let address = parse_address(&self.address, "address")?;
        let abi = crate::blockchain::abi::parse_abi(&self.abi)?;

        let topics = match self.event_name.as_deref() {
            Some(name) => {
                let event = resolve_event(&abi, name)?;
                let mut topics = vec![Some(event.selector())];
                topics.extend(parse_topics(&self.topics, 1)?);
                topics
            }
            None if self.topics.is_empty() => Vec::new(),
            None => {
                return Err(BlockchainError::Validation(
                    "topics: indexed-argument topics require an event name".to_string(),
                ))
            }
        };

        let filter = build_filter(
            Some(address),
            &topics,
            self.from_block.as_deref(),
            self.to_block.as_deref(),
        )?;
        Ok(PreparedEventQuery {
            query: PreparedQuery { filter },
            abi,
        })
    }
}

impl PreparedEventQuery {
    pub fn filter(&self) -> &Filter {
        self.query.filter()
    }
}

/// Fetch logs and decode each against the interface by its topic0.
pub async fn contract_events(
    rpc: &dyn ChainRpc,
    query: &PreparedEventQuery,
) -> BlockchainResult<Vec<EventRecord>> {
    let logs = rpc.logs(query.filter()).await?;
    let events: HashMap<B256, &Event> = query
        .abi
        .events()
        .filter(|event| !event.anonymous)
        .map(|event| (event.selector(), event))
        .collect();

    let mut undecoded = 0usize;
    let records: Vec<EventRecord> = logs
        .iter()
        .map(|log| {
            let event = decode_log(&events, log);
            if event.is_none() {
                undecoded += 1;
            }
            EventRecord {
                log: LogRecord::from(log),
                event,
            }
        })
        .collect();

    if undecoded > 0 {
        tracing::debug!(undecoded, total = records.len(), "Some logs returned undecoded");
    }
    Ok(records)
}

fn decode_log(events: &HashMap<B256, &Event>, log: &Log) -> Option<DecodedEventData> {
    let topic0 = log.topics().first()?;
    let event = events.get(topic0)?;
    let decoded: DecodedEvent = event.decode_log(log.data()).ok()?;

    let mut indexed = decoded.indexed.into_iter();
    let mut body = decoded.body.into_iter();
    let mut args = Map::new();
    for (i, param) in event.inputs.iter().enumerate() {
        let value = if param.indexed { indexed.next() } else { body.next() }?;
        let key = if param.name.is_empty() {
            i.to_string()
        } else {
            param.name.clone()
        };
        let rendered = match &value {
            alloy::dyn_abi::DynSolValue::Tuple(_) => to_json(&value),
            other => Value::String(serialize(other)),
        };
        args.insert(key, rendered);
    }

    Some(DecodedEventData {
        name: event.name.clone(),
        signature: event.signature(),
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{LogData, U256};

    const TRANSFER_ABI: &str =
        "event Transfer(address indexed from, address indexed to, uint256 value)";

    fn transfer_log(value: U256) -> Log {
        let event = Event::parse(TRANSFER_ABI).unwrap();
        let from = Address::repeat_byte(0x11);
        let to = Address::repeat_byte(0x22);
        let data = LogData::new_unchecked(
            vec![event.selector(), from.into_word(), to.into_word()],
            value.to_be_bytes_vec().into(),
        );
        Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0xaa),
                data,
            },
            block_number: Some(10),
            log_index: Some(0),
            ..Default::default()
        }
    }

    #[test]
    fn test_log_query_validates_before_fetch() {
        let query = LogQuery {
            address: Some("0x1234".to_string()),
            ..Default::default()
        };
        assert!(matches!(query.prepare(), Err(BlockchainError::Validation(_))));

        let query = LogQuery {
            topics: vec![None, Some("0xnothex".to_string())],
            ..Default::default()
        };
        let err = query.prepare().unwrap_err();
        assert!(err.to_string().starts_with("topics[1]"));

        let query = LogQuery {
            from_block: Some("yesterday".to_string()),
            ..Default::default()
        };
        assert!(query.prepare().is_err());
    }

    #[test]
    fn test_empty_log_query_is_unrestricted() {
        let prepared = LogQuery::default().prepare().unwrap();
        assert!(prepared.filter().topics.iter().all(|t| t.is_empty()));
    }

    #[test]
    fn test_unknown_event_fails_in_prepare() {
        let query = EventQuery {
            address: format!("{:#x}", Address::repeat_byte(0xaa)),
            abi: TRANSFER_ABI.to_string(),
            event_name: Some("Approval".to_string()),
            ..Default::default()
        };
        let err = query.prepare().unwrap_err();
        assert!(err.to_string().contains("event 'Approval' not found"));
    }

    #[test]
    fn test_event_topic_is_prepended() {
        let event = Event::parse(TRANSFER_ABI).unwrap();
        let query = EventQuery {
            address: format!("{:#x}", Address::repeat_byte(0xaa)),
            abi: TRANSFER_ABI.to_string(),
            event_name: Some("Transfer".to_string()),
            topics: vec![None, Some(format!("{:#x}", Address::repeat_byte(0x22).into_word()))],
            ..Default::default()
        };
        let prepared = query.prepare().unwrap();
        assert!(prepared.filter().topics[0].matches(&event.selector()));
        assert!(prepared.filter().topics[1].is_empty());
        assert!(!prepared.filter().topics[2].is_empty());
    }

    #[test]
    fn test_decode_and_raw_fallback() {
        let abi = crate::blockchain::abi::parse_abi(TRANSFER_ABI).unwrap();
        let events: HashMap<B256, &Event> = abi.events().map(|e| (e.selector(), e)).collect();

        let big = U256::from(10u8).pow(U256::from(30u8));
        let decoded = decode_log(&events, &transfer_log(big)).unwrap();
        assert_eq!(decoded.name, "Transfer");
        assert_eq!(decoded.args["value"], "1000000000000000000000000000000");

        let mut unknown = transfer_log(big);
        unknown.inner.data = LogData::new_unchecked(vec![B256::repeat_byte(0x01)], Bytes::new());
        assert!(decode_log(&events, &unknown).is_none());

        let mut truncated = transfer_log(big);
        let topics = truncated.inner.data.topics().to_vec();
        truncated.inner.data = LogData::new_unchecked(topics, Bytes::from(vec![0u8; 3]));
        assert!(decode_log(&events, &truncated).is_none());
    }
}
