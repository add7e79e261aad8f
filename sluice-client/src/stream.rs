//! Stream service operations

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::{Service, ServiceClient};

/// Most records the stream service returns per `GetRecords`
pub const MAX_RECORDS_PER_READ: usize = 10_000;

/// Where a new shard iterator starts reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardPosition {
    /// Only records written after the iterator is created
    Latest,
    /// Oldest record still retained in the shard
    TrimHorizon,
    /// The record with this sequence number, inclusive
    AtSequenceNumber(String),
    /// The record after this sequence number
    AfterSequenceNumber(String),
}

impl ShardPosition {
    fn iterator_type(&self) -> &'static str {
        match self {
            ShardPosition::Latest => "LATEST",
            ShardPosition::TrimHorizon => "TRIM_HORIZON",
            ShardPosition::AtSequenceNumber(_) => "AT_SEQUENCE_NUMBER",
            ShardPosition::AfterSequenceNumber(_) => "AFTER_SEQUENCE_NUMBER",
        }
    }

    fn sequence_number(&self) -> Option<&str> {
        match self {
            ShardPosition::AtSequenceNumber(seq) | ShardPosition::AfterSequenceNumber(seq) => {
                Some(seq.as_str())
            }
            _ => None,
        }
    }
}

impl std::str::FromStr for ShardPosition {
    type Err = ClientError;

    /// Parses `latest`, `trim-horizon`, `at:<seq>` or `after:<seq>`
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "latest" => Ok(ShardPosition::Latest),
            "trim-horizon" => Ok(ShardPosition::TrimHorizon),
            _ => {
                if let Some(seq) = s.strip_prefix("at:").filter(|seq| !seq.is_empty()) {
                    Ok(ShardPosition::AtSequenceNumber(seq.to_string()))
                } else if let Some(seq) = s.strip_prefix("after:").filter(|seq| !seq.is_empty()) {
                    Ok(ShardPosition::AfterSequenceNumber(seq.to_string()))
                } else {
                    Err(ClientError::InvalidRequest(format!(
                        "Unknown shard position '{}' (expected latest, trim-horizon, at:<seq> or after:<seq>)",
                        s
                    )))
                }
            }
        }
    }
}

/// A decoded record read from a stream shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRecord {
    pub sequence_number: String,
    pub partition_key: String,
    pub data: Vec<u8>,
    pub arrived_at: Option<DateTime<Utc>>,
}

/// Summary of a stream and its shards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescription {
    pub name: String,
    pub arn: String,
    pub status: String,
    pub shard_ids: Vec<String>,
    /// More shards exist than were returned
    pub has_more_shards: bool,
}

/// One `GetRecords` reply
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<StreamRecord>,
    /// Absent once the shard has been closed and fully read
    pub next_shard_iterator: Option<String>,
    pub millis_behind_latest: Option<u64>,
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateStreamRequest<'a> {
    stream_name: &'a str,
    shard_count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StreamNameRequest<'a> {
    stream_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStreamResponse {
    stream_description: WireStreamDescription,
}

#[derive(Deserialize)]
struct WireStreamDescription {
    #[serde(rename = "StreamName")]
    stream_name: String,
    #[serde(rename = "StreamARN", default)]
    stream_arn: String,
    #[serde(rename = "StreamStatus", default)]
    stream_status: String,
    #[serde(rename = "Shards", default)]
    shards: Vec<WireShard>,
    #[serde(rename = "HasMoreShards", default)]
    has_more_shards: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireShard {
    shard_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetShardIteratorRequest<'a> {
    stream_name: &'a str,
    shard_id: &'a str,
    shard_iterator_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    starting_sequence_number: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetShardIteratorResponse {
    shard_iterator: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetRecordsRequest<'a> {
    shard_iterator: &'a str,
    limit: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetRecordsResponse {
    #[serde(default)]
    records: Vec<WireRecord>,
    #[serde(default)]
    next_shard_iterator: Option<String>,
    #[serde(default)]
    millis_behind_latest: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireRecord {
    sequence_number: String,
    #[serde(default)]
    partition_key: String,
    data: String,
    /// Seconds since the epoch, with a fractional part
    #[serde(default)]
    approximate_arrival_timestamp: Option<f64>,
}

impl WireRecord {
    fn decode(self) -> Result<StreamRecord> {
        let data = STANDARD.decode(self.data.as_bytes())?;
        let arrived_at = self
            .approximate_arrival_timestamp
            .and_then(|secs| DateTime::from_timestamp_millis((secs * 1000.0).round() as i64));

        Ok(StreamRecord {
            sequence_number: self.sequence_number,
            partition_key: self.partition_key,
            data,
            arrived_at,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutRecordRequest<'a> {
    stream_name: &'a str,
    data: String,
    partition_key: &'a str,
}

/// Where a written record landed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRecordResult {
    pub shard_id: String,
    pub sequence_number: String,
}

impl ServiceClient {
    // =============================================================================
    // Stream Management
    // =============================================================================

    /// Create a stream with the given number of shards
    pub fn create_stream(&self, name: &str, shard_count: u32) -> Result<()> {
        if shard_count == 0 {
            return Err(ClientError::InvalidRequest(
                "shard_count must be greater than 0".to_string(),
            ));
        }

        self.call_empty(
            Service::Stream,
            "CreateStream",
            &CreateStreamRequest {
                stream_name: name,
                shard_count,
            },
        )
    }

    /// Delete a stream and all of its data
    pub fn delete_stream(&self, name: &str) -> Result<()> {
        self.call_empty(Service::Stream, "DeleteStream", &StreamNameRequest { stream_name: name })
    }

    /// Describe a stream, including the ids of its shards
    pub fn describe_stream(&self, name: &str) -> Result<StreamDescription> {
        let response: DescribeStreamResponse =
            self.call(Service::Stream, "DescribeStream", &StreamNameRequest { stream_name: name })?;
        let description = response.stream_description;

        Ok(StreamDescription {
            name: description.stream_name,
            arn: description.stream_arn,
            status: description.stream_status,
            shard_ids: description.shards.into_iter().map(|s| s.shard_id).collect(),
            has_more_shards: description.has_more_shards,
        })
    }

    // =============================================================================
    // Records
    // =============================================================================

    /// Obtain an iterator into one shard
    pub fn get_shard_iterator(
        &self,
        stream: &str,
        shard_id: &str,
        position: &ShardPosition,
    ) -> Result<String> {
        let response: GetShardIteratorResponse = self.call(
            Service::Stream,
            "GetShardIterator",
            &GetShardIteratorRequest {
                stream_name: stream,
                shard_id,
                shard_iterator_type: position.iterator_type(),
                starting_sequence_number: position.sequence_number(),
            },
        )?;

        Ok(response.shard_iterator)
    }

    /// Read up to `limit` records (clamped to 1..=10000) at `shard_iterator`
    pub fn get_records(&self, shard_iterator: &str, limit: usize) -> Result<RecordPage> {
        let response: GetRecordsResponse = self.call(
            Service::Stream,
            "GetRecords",
            &GetRecordsRequest {
                shard_iterator,
                limit: limit.clamp(1, MAX_RECORDS_PER_READ),
            },
        )?;

        let records = response
            .records
            .into_iter()
            .map(WireRecord::decode)
            .collect::<Result<Vec<_>>>()?;

        Ok(RecordPage {
            records,
            next_shard_iterator: response.next_shard_iterator,
            millis_behind_latest: response.millis_behind_latest,
        })
    }

    /// Write one record; the partition key picks the shard
    pub fn put_record(&self, stream: &str, partition_key: &str, data: &[u8]) -> Result<PutRecordResult> {
        if partition_key.is_empty() {
            return Err(ClientError::InvalidRequest(
                "partition key cannot be empty".to_string(),
            ));
        }

        self.call(
            Service::Stream,
            "PutRecord",
            &PutRecordRequest {
                stream_name: stream,
                data: STANDARD.encode(data),
                partition_key,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_parse_shard_position() {
        assert_eq!("latest".parse::<ShardPosition>().unwrap(), ShardPosition::Latest);
        assert_eq!(
            "trim-horizon".parse::<ShardPosition>().unwrap(),
            ShardPosition::TrimHorizon
        );
        assert_eq!(
            "after:4959".parse::<ShardPosition>().unwrap(),
            ShardPosition::AfterSequenceNumber("4959".to_string())
        );
        assert!("at:".parse::<ShardPosition>().is_err());
        assert!("oldest".parse::<ShardPosition>().is_err());
    }

    #[test]
    fn test_get_records_decodes_payloads() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/")
            .match_header("x-amz-target", "Kinesis_20131202.GetRecords")
            .match_header("content-type", "application/x-amz-json-1.1")
            .match_body(Matcher::PartialJsonString(
                r#"{"ShardIterator":"it-1","Limit":2}"#.to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"{
                    "Records": [
                        {"SequenceNumber":"1","PartitionKey":"abc","Data":"eyJwcm9wIjoiNDIifQ==","ApproximateArrivalTimestamp":1700000000.5}
                    ],
                    "NextShardIterator":"it-2",
                    "MillisBehindLatest":0
                }"#,
            )
            .create();

        let client = ServiceClient::new(server.url());
        let page = client.get_records("it-1", 2).unwrap();

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].data, br#"{"prop":"42"}"#.to_vec());
        assert_eq!(page.records[0].partition_key, "abc");
        assert_eq!(
            page.records[0].arrived_at.map(|t| t.timestamp_millis()),
            Some(1_700_000_000_500)
        );
        assert_eq!(page.next_shard_iterator.as_deref(), Some("it-2"));
        mock.assert();
    }

    #[test]
    fn test_get_records_rejects_bad_base64() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"Records":[{"SequenceNumber":"1","Data":"***"}]}"#)
            .create();

        let client = ServiceClient::new(server.url());
        let err = client.get_records("it-1", 2).unwrap_err();
        assert!(matches!(err, ClientError::DecodeError(_)));
    }

    #[test]
    fn test_get_shard_iterator_sends_sequence_number() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/")
            .match_header("x-amz-target", "Kinesis_20131202.GetShardIterator")
            .match_body(Matcher::PartialJsonString(
                r#"{"ShardIteratorType":"AT_SEQUENCE_NUMBER","StartingSequenceNumber":"77"}"#
                    .to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"ShardIterator":"it-77"}"#)
            .create();

        let client = ServiceClient::new(server.url());
        let iterator = client
            .get_shard_iterator(
                "new_stream",
                "shardId-000000000000",
                &ShardPosition::AtSequenceNumber("77".to_string()),
            )
            .unwrap();

        assert_eq!(iterator, "it-77");
        mock.assert();
    }

    #[test]
    fn test_describe_stream_collects_shard_ids() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/")
            .match_header("x-amz-target", "Kinesis_20131202.DescribeStream")
            .with_status(200)
            .with_body(
                r#"{"StreamDescription":{"StreamName":"new_stream","StreamARN":"arn:aws:kinesis:us-east-1:000000000000:stream/new_stream","StreamStatus":"ACTIVE","Shards":[{"ShardId":"shardId-000000000000"},{"ShardId":"shardId-000000000001"}],"HasMoreShards":false}}"#,
            )
            .create();

        let client = ServiceClient::new(server.url());
        let description = client.describe_stream("new_stream").unwrap();

        assert_eq!(description.status, "ACTIVE");
        assert_eq!(
            description.shard_ids,
            vec!["shardId-000000000000", "shardId-000000000001"]
        );
    }

    #[test]
    fn test_put_record_encodes_data() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/")
            .match_header("x-amz-target", "Kinesis_20131202.PutRecord")
            .match_body(Matcher::PartialJsonString(
                r#"{"StreamName":"new_stream","PartitionKey":"abc","Data":"aGVsbG8="}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"ShardId":"shardId-000000000000","SequenceNumber":"1"}"#)
            .create();

        let client = ServiceClient::new(server.url());
        let result = client.put_record("new_stream", "abc", b"hello").unwrap();

        assert_eq!(result.sequence_number, "1");
        mock.assert();
    }

    #[test]
    fn test_create_stream_rejects_zero_shards() {
        let client = ServiceClient::new("http://localhost:4566");
        assert!(matches!(
            client.create_stream("new_stream", 0),
            Err(ClientError::InvalidRequest(_))
        ));
    }
}
