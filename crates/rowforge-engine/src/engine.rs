use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rowforge_build::Manifest;
use rowforge_core::{
    CellValue, ExistingCell, GenerateReply, GenerateRequest, PluginCatalog, RowSchema,
    WorkerResources, resolve,
};

use crate::errors::EngineError;
use crate::host::{CellGenerator, PluginHost};
use crate::model::{Dataset, EngineOptions, GeneratedRow, RowFailure};
use crate::pool::WorkerPool;
use crate::worker::WorkerHandle;

/// Manifest key of the shared-utilities artifact workers load at bootstrap.
const WORKER_UTILS_ID: &str = "worker_utils";

/// Drives dependency-ordered, row-by-row dataset generation.
///
/// The catalog and manifest are read-only for the engine's lifetime; they
/// are only rebuilt between generation runs by the build cache.
pub struct DispatchEngine {
    options: EngineOptions,
    catalog: PluginCatalog,
    manifest: Arc<Manifest>,
    artifacts_dir: PathBuf,
    host: Arc<dyn PluginHost>,
    pool: Arc<WorkerPool>,
}

enum RowOutcome {
    Completed(GeneratedRow),
    Failed(RowFailure),
    Cancelled,
}

struct RowContext {
    schema: Arc<RowSchema>,
    order: Arc<Vec<usize>>,
    manifest: Arc<Manifest>,
    artifacts_dir: PathBuf,
    host: Arc<dyn PluginHost>,
    pool: Arc<WorkerPool>,
    resources: WorkerResources,
    timeout: Duration,
    cancel: CancellationToken,
}

impl DispatchEngine {
    pub fn new(
        options: EngineOptions,
        catalog: PluginCatalog,
        manifest: Manifest,
        artifacts_dir: impl Into<PathBuf>,
        host: Arc<dyn PluginHost>,
    ) -> Self {
        Self {
            options,
            catalog,
            manifest: Arc::new(manifest),
            artifacts_dir: artifacts_dir.into(),
            host,
            pool: Arc::new(WorkerPool::new()),
        }
    }

    /// Generate `row_count` rows for `schema`.
    pub async fn generate_dataset(
        &self,
        schema: &RowSchema,
        row_count: u64,
    ) -> Result<Dataset, EngineError> {
        self.generate_dataset_with_cancel(schema, row_count, CancellationToken::new())
            .await
    }

    /// Generate rows until done or `cancel` fires.
    ///
    /// Cancellation stops issuing new requests immediately; rows in flight
    /// are abandoned and their handles disposed. The returned dataset then
    /// holds exactly the rows that completed.
    pub async fn generate_dataset_with_cancel(
        &self,
        schema: &RowSchema,
        row_count: u64,
        cancel: CancellationToken,
    ) -> Result<Dataset, EngineError> {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        // Pure pre-pass: configuration errors abort before any worker
        // exists. The order is computed once and reused for every row.
        let order = Arc::new(resolve(schema, &self.catalog)?);

        info!(
            run_id = %run_id,
            rows = row_count,
            columns = schema.len(),
            fan_out = self.options.max_concurrent_rows,
            "generation started"
        );

        let ctx = Arc::new(RowContext {
            schema: Arc::new(schema.clone()),
            order,
            manifest: Arc::clone(&self.manifest),
            artifacts_dir: self.artifacts_dir.clone(),
            host: Arc::clone(&self.host),
            pool: Arc::clone(&self.pool),
            resources: self.worker_resources(),
            timeout: self.options.request_timeout,
            cancel: cancel.clone(),
        });

        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_rows.max(1)));
        let mut tasks = JoinSet::new();
        for row_index in 0..row_count {
            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(generate_row(ctx, semaphore, row_index));
        }

        let mut rows = Vec::new();
        let mut failures = Vec::new();
        let mut fatal: Option<RowFailure> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(RowOutcome::Completed(row)) => rows.push(row),
                Ok(RowOutcome::Failed(failure)) => {
                    warn!(
                        run_id = %run_id,
                        row_index = failure.row_index,
                        plugin_id = %failure.plugin_id,
                        error = %failure.message,
                        "row generation failed"
                    );
                    if self.options.fail_fast {
                        cancel.cancel();
                        if fatal.is_none() {
                            fatal = Some(failure);
                        }
                    } else {
                        failures.push(failure);
                    }
                }
                Ok(RowOutcome::Cancelled) => {}
                Err(err) => return Err(EngineError::Join(err.to_string())),
            }
        }

        if let Some(failure) = fatal {
            return Err(EngineError::RowFailed(failure));
        }

        rows.sort_by_key(|row| row.row_index);
        failures.sort_by_key(|failure| failure.row_index);

        info!(
            run_id = %run_id,
            rows_completed = rows.len(),
            rows_failed = failures.len(),
            cancelled = cancel.is_cancelled(),
            duration_ms = started.elapsed().as_millis() as u64,
            "generation finished"
        );

        Ok(Dataset {
            run_id,
            rows_requested: row_count,
            rows,
            failures,
            cancelled: cancel.is_cancelled(),
        })
    }

    /// Dispose every pooled handle.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    fn worker_resources(&self) -> WorkerResources {
        let worker_utils = self
            .manifest
            .core
            .get(WORKER_UTILS_ID)
            .map(|entry| self.artifacts_dir.join(&entry.artifact_name));
        WorkerResources { worker_utils }
    }
}

async fn generate_row(
    ctx: Arc<RowContext>,
    semaphore: Arc<Semaphore>,
    row_index: u64,
) -> RowOutcome {
    let _permit = tokio::select! {
        permit = semaphore.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return RowOutcome::Cancelled,
        },
        _ = ctx.cancel.cancelled() => return RowOutcome::Cancelled,
    };
    if ctx.cancel.is_cancelled() {
        return RowOutcome::Cancelled;
    }

    let mut cells: Vec<ExistingCell> = Vec::new();
    let mut inline: BTreeMap<String, Box<dyn CellGenerator>> = BTreeMap::new();

    for &col in ctx.order.iter() {
        if ctx.cancel.is_cancelled() {
            return RowOutcome::Cancelled;
        }

        let binding = &ctx.schema.columns[col];
        // Only cells the resolver placed earlier in this row are visible.
        let request = GenerateRequest {
            row_index,
            col_index: col,
            row_state: binding.config.clone(),
            existing_row_data: cells.clone(),
            bootstrap: None,
        };

        let produced = match ctx.manifest.entry(&binding.plugin_id) {
            Some(entry) => {
                generate_pooled(&ctx, &binding.plugin_id, &entry.artifact_name, request).await
            }
            None => generate_inline(&ctx, &mut inline, &binding.plugin_id, &request),
        };

        match produced {
            Ok(value) => cells.push(ExistingCell {
                col_index: col,
                data: value,
            }),
            Err(Cell::Failed(message)) => {
                return RowOutcome::Failed(RowFailure {
                    row_index,
                    col_index: col,
                    plugin_id: binding.plugin_id.clone(),
                    message,
                });
            }
            Err(Cell::Cancelled) => return RowOutcome::Cancelled,
        }
    }

    cells.sort_by_key(|cell| cell.col_index);
    RowOutcome::Completed(GeneratedRow {
        row_index,
        cells: cells.into_iter().map(|cell| cell.data).collect(),
    })
}

enum Cell {
    Failed(String),
    Cancelled,
}

async fn generate_pooled(
    ctx: &RowContext,
    plugin_id: &str,
    artifact_name: &str,
    mut request: GenerateRequest,
) -> Result<CellValue, Cell> {
    let mut handle = ctx.pool.checkout(plugin_id).unwrap_or_else(|| {
        WorkerHandle::spawn(
            plugin_id.to_string(),
            Arc::clone(&ctx.host),
            ctx.artifacts_dir.join(artifact_name),
        )
    });

    if handle.needs_bootstrap() {
        request.bootstrap = Some(ctx.resources.clone());
    }

    match handle.send_request(request, ctx.timeout, &ctx.cancel).await {
        Ok(GenerateReply::Value(value)) => {
            ctx.pool.checkin(handle);
            Ok(value)
        }
        Ok(GenerateReply::Failed { message }) => {
            // The worker answered; it stays usable unless it was condemned
            // while bootstrapping (checkin drops non-idle handles).
            ctx.pool.checkin(handle);
            Err(Cell::Failed(message))
        }
        Err(crate::worker::RequestError::Cancelled) => Err(Cell::Cancelled),
        Err(err) => Err(Cell::Failed(err.to_string())),
    }
}

fn generate_inline(
    ctx: &RowContext,
    inline: &mut BTreeMap<String, Box<dyn CellGenerator>>,
    plugin_id: &str,
    request: &GenerateRequest,
) -> Result<CellValue, Cell> {
    let generator = match inline.entry(plugin_id.to_string()) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(slot) => match ctx.host.load_inline(plugin_id) {
            Ok(generator) => slot.insert(generator),
            Err(err) => return Err(Cell::Failed(err.to_string())),
        },
    };
    generator.generate(request).map_err(|err| Cell::Failed(err.message))
}
