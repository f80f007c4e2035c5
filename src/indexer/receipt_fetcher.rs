use alloy::primitives::B256;
use alloy::providers::Provider;
use alloy::rpc::types::{BlockId, BlockNumberOrTag, Log};

/// Fetch every receipt of a block and return each transaction's logs, in
/// transaction order.
pub async fn fetch_block_receipts<P: Provider>(
    provider: &P,
    block_number: u64,
) -> eyre::Result<Vec<(B256, Vec<Log>)>> {
    let block_id = BlockId::Number(BlockNumberOrTag::Number(block_number));
    let receipts = super::chain::retry_rpc(|| provider.get_block_receipts(block_id)).await?;

    let Some(receipts) = receipts else {
        return Err(eyre::eyre!("Receipts for block {} not available", block_number));
    };

    Ok(receipts
        .into_iter()
        .map(|receipt| (receipt.transaction_hash, receipt.inner.logs().to_vec()))
        .collect())
}
