//! Import of stored content blocks.
//!
//! Runs a block's STIX content through the text import and records the
//! outcome on the block. A failed import sets `import_failed` and appends
//! the reason; a successful one clears the flag, so `import_failed` always
//! describes the latest committed attempt. Every item the importer rejected
//! is appended to `errors`, which is kept as history. Previews never touch
//! the block.

use tracing::{info, warn};

use crate::error::StoreError;
use crate::import::{ImportPipeline, TextImportOptions};
use crate::models::{ContentBlock, ImportResult};
use crate::store::{ContentQuery, Store};

/// Import method recorded for content that arrived over TAXII.
pub const TAXII_IMPORT_METHOD: &str = "TAXII";

#[derive(Debug, Clone)]
pub struct ContentImportOptions {
    pub analyst: String,
    pub source: String,
    pub header_events: bool,
    pub observables_as_indicators: bool,
    pub preview_only: bool,
}

impl ContentImportOptions {
    pub fn new(analyst: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            analyst: analyst.into(),
            source: source.into(),
            header_events: true,
            observables_as_indicators: false,
            preview_only: false,
        }
    }
}

/// Outcome of importing one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockImport {
    pub block_id: String,
    pub result: ImportResult,
    /// Why the outcome could not be recorded on the block, if it could not.
    pub save_error: Option<String>,
}

/// Imports the block with `id`. Returns `None` if there is no such block.
pub async fn import_content_block(
    store: &dyn Store,
    pipeline: &ImportPipeline,
    id: &str,
    opts: &ContentImportOptions,
) -> Result<Option<ImportResult>, StoreError> {
    let Some(block) = store.get_content(id).await? else {
        return Ok(None);
    };
    let (result, saved) = import_block(store, pipeline, block, opts).await;
    saved?;
    Ok(Some(result))
}

/// Imports every block matching `query`, oldest first.
///
/// A block that fails to import, or whose outcome cannot be saved, is
/// reported in its [`BlockImport`] and the rest still run. Only the initial
/// lookup can fail the whole batch.
pub async fn import_pending(
    store: &dyn Store,
    pipeline: &ImportPipeline,
    query: &ContentQuery,
    opts: &ContentImportOptions,
) -> Result<Vec<BlockImport>, StoreError> {
    let blocks = store.find_content(query).await?;
    let mut outcomes = Vec::with_capacity(blocks.len());
    for block in blocks {
        let block_id = block.id.clone();
        let (result, saved) = import_block(store, pipeline, block, opts).await;
        let save_error = saved.err().map(|e| {
            warn!(block = %block_id, error = %e, "could not record import outcome");
            e.to_string()
        });
        outcomes.push(BlockImport {
            block_id,
            result,
            save_error,
        });
    }

    let failed = outcomes.iter().filter(|o| !o.result.success).count();
    let unsaved = outcomes.iter().filter(|o| o.save_error.is_some()).count();
    info!(
        blocks = outcomes.len(),
        failed,
        unsaved,
        preview = opts.preview_only,
        "content block import finished"
    );
    Ok(outcomes)
}

async fn import_block(
    store: &dyn Store,
    pipeline: &ImportPipeline,
    mut block: ContentBlock,
    opts: &ContentImportOptions,
) -> (ImportResult, Result<(), StoreError>) {
    let text_opts = TextImportOptions {
        analyst: opts.analyst.clone(),
        source: opts.source.clone(),
        reference: format!("{}:{}", block.hostname, block.feed),
        method: TAXII_IMPORT_METHOD.to_string(),
        header_events: opts.header_events,
        use_header_source: block.use_hdr_src,
        observables_as_indicators: opts.observables_as_indicators,
        preview_only: opts.preview_only,
    };

    let result = pipeline.import_str(&block.content, &text_opts).await;

    if opts.preview_only || !record_outcome(&mut block, &result) {
        return (result, Ok(()));
    }
    if !result.success {
        warn!(block = %block.id, reason = %result.reason, "content block import failed");
    }
    let saved = store.save_content(&block).await;
    (result, saved)
}

/// Applies an import result to a block. Returns whether anything changed.
fn record_outcome(block: &mut ContentBlock, result: &ImportResult) -> bool {
    let mut changed = false;
    if !result.success {
        let reason = if result.reason.is_empty() {
            "import failed".to_string()
        } else {
            result.reason.clone()
        };
        block.record_failure(reason);
        changed = true;
    } else if block.import_failed {
        block.import_failed = false;
        changed = true;
    }
    for item in &result.failed {
        block.errors.push(format!("{}: {}", item.item, item.reason));
        changed = true;
    }
    changed
}
