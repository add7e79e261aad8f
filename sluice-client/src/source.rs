//! Batch sources backed by the service client
//!
//! Each adapter turns one kind of remote read into a
//! [`BatchSource`] so it can be drained by a `CursorPoller`:
//!
//! - [`StreamSource`]: shard reads, the cursor is the shard iterator
//! - [`QueueSource`]: message receives, ending at the first empty receive
//! - [`QueueListing`]: paginated queue listing, the cursor is `NextToken`

use sluice_core::{Batch, BatchSource, Cursor, Item};
use tracing::debug;

use crate::ServiceClient;
use crate::error::{ClientError, Result};
use crate::queue::QueueMessage;
use crate::stream::{ShardPosition, StreamRecord};

/// Reads one shard of a stream
///
/// Without a cursor the source first asks for an iterator at the configured
/// position. A missing `NextShardIterator` means the shard was closed and
/// every record in it has been read.
#[derive(Debug)]
pub struct StreamSource<'a> {
    client: &'a ServiceClient,
    stream: String,
    shard_id: String,
    position: ShardPosition,
    millis_behind_latest: Option<u64>,
}

impl<'a> StreamSource<'a> {
    pub fn new(
        client: &'a ServiceClient,
        stream: impl Into<String>,
        shard_id: impl Into<String>,
        position: ShardPosition,
    ) -> Self {
        Self {
            client,
            stream: stream.into(),
            shard_id: shard_id.into(),
            position,
            millis_behind_latest: None,
        }
    }

    /// How far behind the tip of the shard the last read was
    pub fn millis_behind_latest(&self) -> Option<u64> {
        self.millis_behind_latest
    }
}

impl BatchSource for StreamSource<'_> {
    type Item = StreamRecord;
    type Error = ClientError;

    fn fetch(&mut self, cursor: Option<&Cursor>, limit: usize) -> Result<Batch<StreamRecord>> {
        let iterator = match cursor {
            Some(cursor) => cursor.as_str().to_string(),
            None => {
                debug!(
                    "Requesting {:?} iterator for {}/{}",
                    self.position, self.stream, self.shard_id
                );
                self.client
                    .get_shard_iterator(&self.stream, &self.shard_id, &self.position)?
            }
        };

        let page = self.client.get_records(&iterator, limit)?;
        self.millis_behind_latest = page.millis_behind_latest;

        Ok(Batch::new(page.records, page.next_shard_iterator.map(Cursor::new)))
    }
}

/// Receives messages from a queue until a receive comes back empty
///
/// Queues have no position of their own, so the continuation handed back
/// after a non-empty receive is the queue URL itself.
#[derive(Debug)]
pub struct QueueSource<'a> {
    client: &'a ServiceClient,
    queue_url: String,
    wait_seconds: Option<u32>,
}

impl<'a> QueueSource<'a> {
    pub fn new(client: &'a ServiceClient, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            wait_seconds: None,
        }
    }

    /// Long-poll each receive for up to `seconds`
    pub fn with_wait(mut self, seconds: u32) -> Self {
        self.wait_seconds = Some(seconds);
        self
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

impl BatchSource for QueueSource<'_> {
    type Item = QueueMessage;
    type Error = ClientError;

    fn fetch(&mut self, _cursor: Option<&Cursor>, limit: usize) -> Result<Batch<QueueMessage>> {
        let messages = self
            .client
            .receive_messages(&self.queue_url, limit, self.wait_seconds)?;

        if messages.is_empty() {
            debug!("Queue {} returned no messages", self.queue_url);
            return Ok(Batch::exhausted(messages));
        }

        Ok(Batch::continuing(messages, Cursor::new(self.queue_url.clone())))
    }
}

/// Pages through queue URLs, optionally filtered by name prefix
#[derive(Debug)]
pub struct QueueListing<'a> {
    client: &'a ServiceClient,
    prefix: Option<String>,
}

impl<'a> QueueListing<'a> {
    pub fn new(client: &'a ServiceClient, prefix: Option<String>) -> Self {
        Self { client, prefix }
    }
}

impl BatchSource for QueueListing<'_> {
    type Item = String;
    type Error = ClientError;

    fn fetch(&mut self, cursor: Option<&Cursor>, limit: usize) -> Result<Batch<String>> {
        let page = self.client.list_queues(
            self.prefix.as_deref(),
            cursor.map(Cursor::as_str),
            limit,
        )?;

        Ok(Batch::new(page.queue_urls, page.next_token.map(Cursor::new)))
    }
}

impl From<QueueMessage> for Item {
    fn from(message: QueueMessage) -> Self {
        let mut item = Item::new(message.body)
            .with_metadata("message_id", message.message_id)
            .with_metadata("receipt_handle", message.receipt_handle);

        if let Some(md5) = message.md5_of_body {
            item = item.with_metadata("md5_of_body", md5);
        }
        for (key, value) in message.attributes {
            item = item.with_metadata(key, value);
        }

        item
    }
}

impl From<StreamRecord> for Item {
    fn from(record: StreamRecord) -> Self {
        let mut item = Item::new(record.data)
            .with_metadata("sequence_number", record.sequence_number)
            .with_metadata("partition_key", record.partition_key);

        if let Some(arrived_at) = record.arrived_at {
            item = item.with_metadata("arrived_at", arrived_at.to_rfc3339());
        }

        item
    }
}
