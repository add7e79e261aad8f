//! Resource resolver module
//!
//! Turns the names users type into the identifiers the services expect.
//! Every lookup goes through the command's [`ResourceRegistry`], so a name
//! is resolved against the service at most once per invocation.

use anyhow::{Context, Result, anyhow};
use sluice_client::ServiceClient;
use sluice_core::{ResourceKind, ResourceRegistry};
use tracing::debug;

/// Resolve a queue name (or URL) to a queue URL
///
/// URLs are returned untouched. Names are looked up in the registry first,
/// then with `GetQueueUrl`.
///
/// # Errors
/// Returns an error if the queue does not exist or the API call fails
pub fn resolve_queue_url(
    client: &ServiceClient,
    registry: &mut ResourceRegistry,
    name_or_url: &str,
) -> Result<String> {
    if is_url(name_or_url) {
        return Ok(name_or_url.to_string());
    }

    if let Some(url) = registry.get(ResourceKind::QueueUrl, name_or_url) {
        return Ok(url.to_string());
    }

    let url = client
        .get_queue_url(name_or_url)
        .with_context(|| format!("Failed to resolve queue '{}'", name_or_url))?;

    debug!("Resolved queue {} to {}", name_or_url, url);
    registry.insert(ResourceKind::QueueUrl, name_or_url, url.clone());

    Ok(url)
}

/// Resolve a queue name (or URL) to its ARN
pub fn resolve_queue_arn(
    client: &ServiceClient,
    registry: &mut ResourceRegistry,
    name_or_url: &str,
) -> Result<String> {
    if let Some(arn) = registry.get(ResourceKind::QueueArn, name_or_url) {
        return Ok(arn.to_string());
    }

    let url = resolve_queue_url(client, registry, name_or_url)?;
    let arn = client
        .get_queue_arn(&url)
        .with_context(|| format!("Failed to read the ARN of queue '{}'", name_or_url))?;

    registry.insert(ResourceKind::QueueArn, name_or_url, arn.clone());

    Ok(arn)
}

/// Pick the shard to read
///
/// An explicit shard id wins. Otherwise the stream is described, its ARN
/// recorded, and the first shard chosen.
///
/// # Errors
/// Returns an error if the stream has no shards or the API call fails
pub fn resolve_shard_id(
    client: &ServiceClient,
    registry: &mut ResourceRegistry,
    stream: &str,
    requested: Option<String>,
) -> Result<String> {
    if let Some(shard_id) = requested {
        return Ok(shard_id);
    }

    let description = client
        .describe_stream(stream)
        .with_context(|| format!("Failed to describe stream '{}'", stream))?;

    registry.insert(ResourceKind::StreamArn, stream, description.arn);

    description
        .shard_ids
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Stream '{}' has no shards", stream))
}

fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
