use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use futures::StreamExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::ChainConfig;
use crate::indexer::receipt_fetcher;
use crate::pipeline::ApprovalPipeline;

/// Main entry point for the chain follower task.
/// Feeds every transaction of every new block through the pipeline, in order.
pub async fn run_chain_follower(
    config: ChainConfig,
    shutdown: CancellationToken,
    pipeline: &ApprovalPipeline,
) -> eyre::Result<()> {
    tracing::info!(chain = %config.name, "Starting chain follower");

    let mut last_seen = None;

    if let Some(ws_url) = &config.rpc_ws {
        match follow_ws(&config, ws_url, &shutdown, pipeline, &mut last_seen).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(
                    chain = %config.name,
                    error = %e,
                    last_seen,
                    "WebSocket connection failed, falling back to HTTP polling"
                );
            }
        }
    }

    if !shutdown.is_cancelled() {
        follow_http(&config, &shutdown, pipeline, last_seen).await?;
    }

    tracing::info!(chain = %config.name, "Chain follower stopped");
    Ok(())
}

/// Follow new blocks via WebSocket subscription.
/// `last_seen` is updated after every block so a fallback poller can resume from it.
async fn follow_ws(
    config: &ChainConfig,
    ws_url: &str,
    shutdown: &CancellationToken,
    pipeline: &ApprovalPipeline,
    last_seen: &mut Option<u64>,
) -> eyre::Result<()> {
    let ws = WsConnect::new(ws_url);
    let provider = ProviderBuilder::new().connect_ws(ws).await?;

    let sub = provider.subscribe_blocks().await?;
    let mut stream = sub.into_stream();

    tracing::info!(chain = %config.name, "WebSocket block subscription active");

    loop {
        tokio::select! {
            maybe_block = stream.next() => {
                match maybe_block {
                    Some(block_header) => {
                        if let Err(e) = process_block(&provider, config, block_header.number, pipeline).await {
                            tracing::error!(
                                chain = %config.name,
                                block = block_header.number,
                                error = %e,
                                "Failed to process block"
                            );
                        }
                        *last_seen = Some(block_header.number);
                    }
                    None => {
                        return Err(eyre::eyre!("Block stream ended"));
                    }
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!(chain = %config.name, "Shutdown received, stopping subscription");
                break;
            }
        }
    }

    Ok(())
}

/// Follow new blocks via HTTP polling (fallback when WS is unavailable).
/// Starts after `resume_after` when given, otherwise at the current head.
async fn follow_http(
    config: &ChainConfig,
    shutdown: &CancellationToken,
    pipeline: &ApprovalPipeline,
    resume_after: Option<u64>,
) -> eyre::Result<()> {
    let provider = ProviderBuilder::new()
        .connect_http(config.rpc_http.parse().map_err(|e| eyre::eyre!("Invalid RPC URL: {}", e))?);

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let chain_head = retry_rpc(|| provider.get_block_number()).await?;
    let mut last_block = polling_start(resume_after, chain_head);

    tracing::info!(
        chain = %config.name,
        poll_interval_ms = config.poll_interval_ms,
        last_block,
        "HTTP polling active"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown.cancelled() => {
                tracing::info!(chain = %config.name, "Shutdown received, stopping poller");
                break;
            }
        }

        let current = match retry_rpc(|| provider.get_block_number()).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(chain = %config.name, error = %e, "Failed to get block number");
                continue;
            }
        };

        if current <= last_block {
            continue;
        }

        for block_num in (last_block + 1)..=current {
            if shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = process_block(&provider, config, block_num, pipeline).await {
                tracing::error!(
                    chain = %config.name,
                    block = block_num,
                    error = %e,
                    "Failed to process block"
                );
            }
        }

        last_block = current;
    }

    Ok(())
}

/// Last block already handled when polling begins. Blocks after a dropped
/// subscription are replayed up to the head rather than skipped.
fn polling_start(resume_after: Option<u64>, chain_head: u64) -> u64 {
    resume_after.map_or(chain_head, |n| n.min(chain_head))
}

/// Run every transaction of one block through the approval pipeline.
async fn process_block<P: Provider>(
    provider: &P,
    config: &ChainConfig,
    block_number: u64,
    pipeline: &ApprovalPipeline,
) -> eyre::Result<()> {
    let transactions = receipt_fetcher::fetch_block_receipts(provider, block_number).await?;
    let tx_count = transactions.len();

    let mut findings = 0usize;
    for (tx_hash, logs) in transactions {
        findings += pipeline.process_transaction(tx_hash, logs).len();
    }

    tracing::debug!(
        chain = %config.name,
        block = block_number,
        transactions = tx_count,
        findings,
        "Processed block"
    );

    Ok(())
}

/// Retry an async operation with exponential backoff.
/// Handles transient RPC errors (rate limits, network issues).
pub async fn retry_rpc<F, Fut, T, E>(mut f: F) -> eyre::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = Duration::from_millis(500);
    let max_retries = 5;

    for attempt in 0..max_retries {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "RPC call failed, retrying..."
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }
        }
    }

    // Final attempt, propagate the error
    f().await.map_err(|e| eyre::eyre!("RPC call failed after {} retries: {}", max_retries, e))
}
