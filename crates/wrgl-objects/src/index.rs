//! Table indexing.
//!
//! Block indices are never transferred: a receiving repository derives them
//! from the blocks it already holds and checks each one against the sum the
//! table declares.

use tracing::debug;
use wrgl_types::ObjectSum;

use crate::error::{StoreError, StoreResult};
use crate::object::{Block, BlockIndex, Table, BLOCK_SIZE};
use crate::traits::ObjectStore;

/// Derive and store the block indices of `table`.
///
/// Every block must already be present. Fails with `CorruptObject` when a
/// derived index does not match the table's declared sum or when the blocks
/// do not add up to `rows_count`.
pub fn index_table(
    store: &dyn ObjectStore,
    table_sum: &ObjectSum,
    table: &Table,
) -> StoreResult<()> {
    let mut rows = 0usize;
    for (block_sum, index_sum) in table.blocks.iter().zip(&table.block_indices) {
        let block = store.get_block(block_sum)?;
        rows += block.len();
        if store.exists(index_sum)? {
            continue;
        }
        let index = BlockIndex::from_block(&block, &table.pk).to_stored_object()?;
        let derived = index.compute_sum();
        if derived != *index_sum {
            return Err(StoreError::CorruptObject {
                sum: *table_sum,
                reason: format!(
                    "block {} indexes to {}, table declares {}",
                    block_sum.short_hex(),
                    derived.short_hex(),
                    index_sum.short_hex()
                ),
            });
        }
        store.write(&index)?;
    }
    if rows != table.rows_count as usize {
        return Err(StoreError::CorruptObject {
            sum: *table_sum,
            reason: format!("blocks hold {rows} rows, table declares {}", table.rows_count),
        });
    }
    debug!(table = %table_sum.short_hex(), blocks = table.blocks.len(), "indexed table");
    Ok(())
}

/// Split `rows` into blocks, store blocks, indices and the table, and return
/// the table sum.
pub fn build_table(
    store: &dyn ObjectStore,
    columns: Vec<String>,
    pk: Vec<u32>,
    rows: Vec<Vec<String>>,
) -> StoreResult<ObjectSum> {
    let mut blocks = Vec::new();
    let mut block_indices = Vec::new();
    for chunk in rows.chunks(BLOCK_SIZE) {
        let block = Block::new(chunk.to_vec());
        blocks.push(store.save_block(&block)?);
        block_indices.push(store.save_block_index(&BlockIndex::from_block(&block, &pk))?);
    }
    let table = Table {
        columns,
        pk,
        rows_count: rows.len() as u32,
        blocks,
        block_indices,
    };
    store.save_table(&table)
}
