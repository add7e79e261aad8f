//! Queue command handlers
//!
//! Creating, configuring, listing and deleting queues, sending messages,
//! and draining a queue through the cursor poller.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use clap::builder::TypedValueParser as _;
use colored::*;
use sluice_client::queue::{MAX_LIST_PAGE, MAX_RECEIVE_BATCH};
use sluice_client::source::{QueueListing, QueueSource};
use sluice_client::{ClientError, CreateQueueOptions, ServiceClient};
use sluice_core::{ContinueSignal, Item, ResourceRegistry, TerminationReason};
use std::collections::HashMap;

use super::print_item;
use crate::config::Config;
use crate::resolver::{resolve_queue_arn, resolve_queue_url};
use crate::resume::poll_with_resume;

/// Queue subcommands
#[derive(Subcommand)]
pub enum QueueCommands {
    /// Create a queue
    Create {
        /// Queue name (FIFO queues must end in ".fifo")
        name: String,

        /// Create a FIFO queue
        #[arg(long)]
        fifo: bool,

        /// Name or URL of the dead-letter queue for failed messages
        #[arg(long)]
        dead_letter: Option<String>,

        /// Receives before a message moves to the dead-letter queue
        #[arg(long, requires = "dead_letter")]
        max_receive_count: Option<u32>,
    },
    /// List queues
    List {
        /// Only list queues whose name starts with this prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Queue URLs requested per page
        #[arg(long, default_value_t = MAX_LIST_PAGE, value_parser = clap::value_parser!(u64).range(1..=MAX_LIST_PAGE as u64).map(|n| n as usize))]
        page_size: usize,
    },
    /// Send one or more messages
    Send {
        /// Queue name or URL
        queue: String,

        /// Message bodies
        #[arg(required = true)]
        messages: Vec<String>,

        /// Message group (required for FIFO queues)
        #[arg(long)]
        group_id: Option<String>,
    },
    /// Receive messages until the queue is empty
    Receive {
        /// Queue name or URL
        queue: String,

        /// Messages requested per receive
        #[arg(long, default_value_t = MAX_RECEIVE_BATCH, value_parser = clap::value_parser!(u64).range(1..=MAX_RECEIVE_BATCH as u64).map(|n| n as usize))]
        batch_size: usize,

        /// Stop after this many messages
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize))]
        max_messages: Option<usize>,

        /// Delete each message once it has been printed
        #[arg(long)]
        delete: bool,

        /// Long-poll each receive for up to this many seconds
        #[arg(long)]
        wait_secs: Option<u32>,

        /// Print one JSON object per message
        #[arg(long)]
        json: bool,
    },
    /// Update queue attributes
    SetAttributes {
        /// Queue name or URL
        queue: String,

        /// Attributes as KEY=VALUE (e.g. DelaySeconds=10)
        #[arg(required = true, value_parser = parse_attribute)]
        attributes: Vec<(String, String)>,
    },
    /// Grant accounts access to queue actions
    AddPermission {
        /// Queue name or URL
        queue: String,

        /// Unique label for this permission
        #[arg(long)]
        label: String,

        /// Account allowed to act on the queue ("*" for everyone)
        #[arg(long = "account-id", required = true)]
        account_ids: Vec<String>,

        /// Action to allow, e.g. SendMessage ("*" for all)
        #[arg(long = "action", required = true)]
        actions: Vec<String>,
    },
    /// Delete queues
    Delete {
        /// Queue names or URLs
        #[arg(required = true)]
        queues: Vec<String>,
    },
}

/// Handle queue commands
pub fn handle_queue_command(command: QueueCommands, config: &Config) -> Result<()> {
    let client = config.build_client()?;
    let mut registry = ResourceRegistry::new();

    match command {
        QueueCommands::Create {
            name,
            fifo,
            dead_letter,
            max_receive_count,
        } => create_queue(
            &client,
            &mut registry,
            &name,
            fifo,
            dead_letter.as_deref(),
            max_receive_count,
        ),
        QueueCommands::List { prefix, page_size } => list_queues(&client, config, prefix, page_size),
        QueueCommands::Send {
            queue,
            messages,
            group_id,
        } => send_messages(&client, &mut registry, &queue, &messages, group_id.as_deref()),
        QueueCommands::Receive {
            queue,
            batch_size,
            max_messages,
            delete,
            wait_secs,
            json,
        } => {
            let options = ReceiveOptions {
                batch_size,
                max_messages,
                delete,
                wait_secs,
                json,
            };
            receive_messages(&client, &mut registry, config, &queue, &options)
        }
        QueueCommands::SetAttributes { queue, attributes } => {
            set_attributes(&client, &mut registry, &queue, attributes)
        }
        QueueCommands::AddPermission {
            queue,
            label,
            account_ids,
            actions,
        } => add_permission(&client, &mut registry, &queue, &label, &account_ids, &actions),
        QueueCommands::Delete { queues } => delete_queues(&client, &mut registry, &queues),
    }
}

/// Parse a `KEY=VALUE` attribute argument
fn parse_attribute(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", arg)),
    }
}

/// Create a queue, optionally wired to a dead-letter queue
fn create_queue(
    client: &ServiceClient,
    registry: &mut ResourceRegistry,
    name: &str,
    fifo: bool,
    dead_letter: Option<&str>,
    max_receive_count: Option<u32>,
) -> Result<()> {
    let mut options = CreateQueueOptions {
        fifo,
        max_receive_count,
        ..CreateQueueOptions::default()
    };

    if let Some(dead_letter) = dead_letter {
        let arn = resolve_queue_arn(client, registry, dead_letter)?;
        options = options.with_dead_letter(arn);
    }

    let url = client
        .create_queue(name, &options)
        .with_context(|| format!("Failed to create queue '{}'", name))?;

    println!("{}", "✓ Queue created successfully!".green().bold());
    println!("  Name: {}", name.bold());
    println!("  URL:  {}", url.cyan());
    if let Some(arn) = &options.dead_letter_arn {
        println!("  Dead letters: {}", arn.dimmed());
    }

    Ok(())
}

/// List every queue, page by page
fn list_queues(
    client: &ServiceClient,
    config: &Config,
    prefix: Option<String>,
    page_size: usize,
) -> Result<()> {
    let mut listing = QueueListing::new(client, prefix);
    let mut urls = Vec::new();

    let outcome = poll_with_resume(
        &mut listing,
        page_size,
        None,
        &config.retry,
        ClientError::is_retryable,
        |url| {
            urls.push(url);
            ContinueSignal::Continue
        },
    )?;

    if let TerminationReason::SourceError { error, .. } = outcome {
        return Err(error).context("Failed to list queues");
    }

    if urls.is_empty() {
        println!("{}", "No queues found.".yellow());
    } else {
        println!("{}", format!("Found {} queue(s):", urls.len()).bold());
        println!();
        for url in urls {
            println!("  {} {}", "▸".cyan(), url);
        }
    }

    Ok(())
}

/// Send messages, batching when there is more than one
fn send_messages(
    client: &ServiceClient,
    registry: &mut ResourceRegistry,
    queue: &str,
    messages: &[String],
    group_id: Option<&str>,
) -> Result<()> {
    let url = resolve_queue_url(client, registry, queue)?;

    if let [body] = messages {
        let sent = client
            .send_message(&url, body, group_id)
            .with_context(|| format!("Failed to send message to '{}'", queue))?;

        println!("{}", "✓ Message sent".green().bold());
        println!("  Message ID: {}", sent.message_id.cyan());
        if let Some(sequence) = sent.sequence_number {
            println!("  Sequence:   {}", sequence.dimmed());
        }
        return Ok(());
    }

    let result = client
        .send_message_batch(&url, messages, group_id)
        .with_context(|| format!("Failed to send messages to '{}'", queue))?;

    println!(
        "{}",
        format!("✓ Sent {} message(s)", result.successful.len())
            .green()
            .bold()
    );
    for message_id in &result.successful {
        println!("  {} {}", "▸".cyan(), message_id.dimmed());
    }

    if !result.failed.is_empty() {
        for (body, reason) in &result.failed {
            println!("  {} {}: {}", "✗".red(), body, reason.red());
        }
        bail!("{} message(s) were rejected", result.failed.len());
    }

    Ok(())
}

struct ReceiveOptions {
    batch_size: usize,
    max_messages: Option<usize>,
    delete: bool,
    wait_secs: Option<u32>,
    json: bool,
}

/// Drain a queue through the poller
///
/// Polling ends at the first empty receive, at `max_messages`, or when a
/// delete fails (the message stays on the queue and reappears later).
fn receive_messages(
    client: &ServiceClient,
    registry: &mut ResourceRegistry,
    config: &Config,
    queue: &str,
    options: &ReceiveOptions,
) -> Result<()> {
    let url = resolve_queue_url(client, registry, queue)?;

    let mut source = QueueSource::new(client, url.clone());
    if let Some(seconds) = options.wait_secs {
        source = source.with_wait(seconds);
    }

    let mut received = 0usize;
    let mut delete_failure: Option<ClientError> = None;

    let outcome = poll_with_resume(
        &mut source,
        options.batch_size,
        None,
        &config.retry,
        ClientError::is_retryable,
        |message| {
            let receipt_handle = message.receipt_handle.clone();
            print_item(&Item::from(message), options.json);
            received += 1;

            if options.delete {
                if let Err(err) = client.delete_message(&url, &receipt_handle) {
                    delete_failure = Some(err);
                    return ContinueSignal::Stop;
                }
            }

            let done = options.max_messages.is_some_and(|max| received >= max);
            ContinueSignal::from(!done)
        },
    )?;

    if let Some(err) = delete_failure {
        return Err(err).context("Failed to delete a received message");
    }

    match outcome {
        TerminationReason::SourceExhausted if received == 0 => {
            if !options.json {
                println!("{}", "Queue is empty.".yellow());
            }
        }
        TerminationReason::SourceExhausted | TerminationReason::ConsumerStopped => {
            if !options.json {
                println!();
                println!(
                    "{}",
                    format!("Reading completed: {} message(s)", received).bold()
                );
            }
        }
        TerminationReason::SourceError { error, .. } => {
            return Err(error).with_context(|| {
                format!(
                    "Receive from '{}' failed after {} message(s)",
                    queue, received
                )
            });
        }
    }

    Ok(())
}

fn set_attributes(
    client: &ServiceClient,
    registry: &mut ResourceRegistry,
    queue: &str,
    attributes: Vec<(String, String)>,
) -> Result<()> {
    let url = resolve_queue_url(client, registry, queue)?;
    let attributes: HashMap<String, String> = attributes.into_iter().collect();

    client
        .set_queue_attributes(&url, &attributes)
        .with_context(|| format!("Failed to update attributes of '{}'", queue))?;

    println!("{}", "✓ Queue attributes updated".green().bold());
    let mut keys: Vec<_> = attributes.keys().collect();
    keys.sort();
    for key in keys {
        println!("  {}: {}", key, attributes[key].cyan());
    }

    Ok(())
}

fn add_permission(
    client: &ServiceClient,
    registry: &mut ResourceRegistry,
    queue: &str,
    label: &str,
    account_ids: &[String],
    actions: &[String],
) -> Result<()> {
    let url = resolve_queue_url(client, registry, queue)?;

    client
        .add_permission(&url, label, account_ids, actions)
        .with_context(|| format!("Failed to add permission '{}' to '{}'", label, queue))?;

    println!("{}", "✓ Permission added".green().bold());
    println!("  Label:    {}", label.bold());
    println!("  Accounts: {}", account_ids.join(", ").dimmed());
    println!("  Actions:  {}", actions.join(", ").dimmed());

    Ok(())
}

/// Delete queues by name or URL
fn delete_queues(
    client: &ServiceClient,
    registry: &mut ResourceRegistry,
    queues: &[String],
) -> Result<()> {
    for queue in queues {
        let url = resolve_queue_url(client, registry, queue)?;

        client
            .delete_queue(&url)
            .with_context(|| format!("Failed to delete queue '{}'", queue))?;
        registry.forget(queue);

        println!("{} Deleted queue {}", "✓".green(), queue.bold());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn test_config(endpoint: String) -> Config {
        let mut config = Config::new(endpoint);
        config.retry.max_retries = 0;
        config.retry.initial_delay = Duration::from_millis(1);
        config.retry.max_delay = Duration::from_millis(1);
        config
    }

    #[test]
    fn test_receive_deletes_every_message_and_stops_when_empty() {
        let mut server = mockito::Server::new();
        let config = test_config(server.url());
        let client = config.build_client().unwrap();
        let mut registry = ResourceRegistry::new();
        registry.insert(
            sluice_core::ResourceKind::QueueUrl,
            "First-Queue",
            "http://q/First-Queue",
        );

        let receive = server
            .mock("POST", "/")
            .match_header("x-amz-target", "AmazonSQS.ReceiveMessage")
            .with_status(200)
            .with_body(
                r#"{"Messages":[
                    {"MessageId":"m-1","ReceiptHandle":"rh-1","Body":"one"},
                    {"MessageId":"m-2","ReceiptHandle":"rh-2","Body":"two"}
                ]}"#,
            )
            .expect(1)
            .create();
        let delete = server
            .mock("POST", "/")
            .match_header("x-amz-target", "AmazonSQS.DeleteMessage")
            .with_status(200)
            .expect(2)
            .create();

        let options = ReceiveOptions {
            batch_size: 10,
            max_messages: Some(2),
            delete: true,
            wait_secs: None,
            json: true,
        };
        receive_messages(&client, &mut registry, &config, "First-Queue", &options).unwrap();

        receive.assert();
        delete.assert();
    }

    #[test]
    fn test_receive_stops_on_failed_delete() {
        let mut server = mockito::Server::new();
        let config = test_config(server.url());
        let client = config.build_client().unwrap();
        let mut registry = ResourceRegistry::new();

        server
            .mock("POST", "/")
            .match_header("x-amz-target", "AmazonSQS.ReceiveMessage")
            .with_status(200)
            .with_body(
                r#"{"Messages":[
                    {"MessageId":"m-1","ReceiptHandle":"rh-1","Body":"one"},
                    {"MessageId":"m-2","ReceiptHandle":"rh-2","Body":"two"}
                ]}"#,
            )
            .create();
        let delete = server
            .mock("POST", "/")
            .match_header("x-amz-target", "AmazonSQS.DeleteMessage")
            .with_status(400)
            .with_body(r#"{"__type":"com.amazonaws.sqs#ReceiptHandleIsInvalid","message":"bad handle"}"#)
            .expect(1)
            .create();

        let options = ReceiveOptions {
            batch_size: 10,
            max_messages: None,
            delete: true,
            wait_secs: None,
            json: true,
        };
        let err = receive_messages(
            &client,
            &mut registry,
            &config,
            "http://q/First-Queue",
            &options,
        )
        .unwrap_err();

        assert!(err.to_string().contains("Failed to delete"));
        delete.assert();
    }

    #[test]
    fn test_single_message_uses_send_message() {
        let mut server = mockito::Server::new();
        let client = ServiceClient::new(server.url());
        let mut registry = ResourceRegistry::new();

        let send = server
            .mock("POST", "/")
            .match_header("x-amz-target", "AmazonSQS.SendMessage")
            .match_body(Matcher::PartialJsonString(
                r#"{"QueueUrl":"http://q/First-Queue","MessageBody":"hello"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"MessageId":"m-1"}"#)
            .expect(1)
            .create();

        send_messages(
            &client,
            &mut registry,
            "http://q/First-Queue",
            &["hello".to_string()],
            None,
        )
        .unwrap();

        send.assert();
    }

    #[test]
    fn test_rejected_batch_entries_fail_the_command() {
        let mut server = mockito::Server::new();
        let client = ServiceClient::new(server.url());
        let mut registry = ResourceRegistry::new();

        server
            .mock("POST", "/")
            .match_header("x-amz-target", "AmazonSQS.SendMessageBatch")
            .with_status(200)
            .with_body(r#"{"Successful":[],"Failed":[{"Id":"x","Code":"InternalError","SenderFault":false}]}"#)
            .create();

        let err = send_messages(
            &client,
            &mut registry,
            "http://q/First-Queue",
            &["a".to_string(), "b".to_string()],
            None,
        )
        .unwrap_err();

        assert!(err.to_string().contains("rejected"));
    }

    #[derive(clap::Parser)]
    struct QueueCli {
        #[command(subcommand)]
        command: QueueCommands,
    }

    fn parse(args: &[&str]) -> std::result::Result<QueueCommands, clap::Error> {
        use clap::Parser;
        QueueCli::try_parse_from(std::iter::once("sluice").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn test_zero_max_messages_is_rejected() {
        assert!(parse(&["receive", "First-Queue", "--max-messages", "0"]).is_err());

        match parse(&["receive", "First-Queue", "--max-messages", "1", "--delete"]).unwrap() {
            QueueCommands::Receive {
                max_messages,
                delete,
                ..
            } => {
                assert_eq!(max_messages, Some(1));
                assert!(delete);
            }
            _ => panic!("expected a receive command"),
        }
    }

    #[test]
    fn test_attribute_arguments() {
        assert_eq!(
            parse_attribute("DelaySeconds=10").unwrap(),
            ("DelaySeconds".to_string(), "10".to_string())
        );
        assert_eq!(
            parse_attribute("Policy=a=b").unwrap(),
            ("Policy".to_string(), "a=b".to_string())
        );
        assert!(parse_attribute("DelaySeconds").is_err());
        assert!(parse_attribute("=10").is_err());
        assert!(parse(&["set-attributes", "First-Queue"]).is_err());
    }

    #[test]
    fn test_set_attributes_resolves_queue_and_sends_map() {
        let mut server = mockito::Server::new();
        let client = ServiceClient::new(server.url());
        let mut registry = ResourceRegistry::new();

        let lookup = server
            .mock("POST", "/")
            .match_header("x-amz-target", "AmazonSQS.GetQueueUrl")
            .with_status(200)
            .with_body(r#"{"QueueUrl":"http://q/First-Queue"}"#)
            .expect(1)
            .create();
        let update = server
            .mock("POST", "/")
            .match_header("x-amz-target", "AmazonSQS.SetQueueAttributes")
            .match_body(Matcher::Json(serde_json::json!({
                "QueueUrl": "http://q/First-Queue",
                "Attributes": {"DelaySeconds": "10", "MaximumMessageSize": "30000"},
            })))
            .with_status(200)
            .expect(1)
            .create();

        set_attributes(
            &client,
            &mut registry,
            "First-Queue",
            vec![
                ("DelaySeconds".to_string(), "10".to_string()),
                ("MaximumMessageSize".to_string(), "30000".to_string()),
            ],
        )
        .unwrap();

        lookup.assert();
        update.assert();
    }

    #[test]
    fn test_add_permission_for_everyone() {
        let mut server = mockito::Server::new();
        let client = ServiceClient::new(server.url());
        let mut registry = ResourceRegistry::new();

        let grant = server
            .mock("POST", "/")
            .match_header("x-amz-target", "AmazonSQS.AddPermission")
            .match_body(Matcher::PartialJsonString(
                r#"{"Label":"AddPermissionForAll","AWSAccountIds":["*"],"Actions":["*"]}"#
                    .to_string(),
            ))
            .with_status(200)
            .expect(1)
            .create();

        add_permission(
            &client,
            &mut registry,
            "http://q/First-Queue",
            "AddPermissionForAll",
            &["*".to_string()],
            &["*".to_string()],
        )
        .unwrap();

        grant.assert();
    }
}
