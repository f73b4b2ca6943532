use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::config::IndexConfig;
use crate::corpus;
use crate::error::{Error, Result};
use crate::spimi::finalize;
use crate::spimi::worker::{run_batch, WorkerOutput};

const LOG_EVERY_DOCS: u64 = 50_000;

#[derive(Debug)]
pub struct BuildResult {
    pub n_docs: u64,
    pub vocab_size: u64,
    pub meta_path: PathBuf,
}

type Job = (u64, (u64, u64));

/// Everything a worker thread needs; cloned into each thread, including the
/// replacement threads spawned when a worker retires.
#[derive(Clone)]
struct WorkerContext {
    corpus_path: PathBuf,
    out_dir: PathBuf,
    config: IndexConfig,
    job_rx: Receiver<Job>,
    result_tx: Sender<Result<WorkerOutput>>,
}

fn spawn_worker(ctx: WorkerContext) {
    thread::spawn(move || worker_loop(ctx));
}

fn worker_loop(ctx: WorkerContext) {
    let mut served = 0usize;
    while let Ok((batch_id, range)) = ctx.job_rx.recv() {
        let result = run_batch(&ctx.corpus_path, range, &ctx.out_dir, batch_id, &ctx.config);
        if ctx.result_tx.send(result).is_err() {
            return;
        }
        served += 1;
        if ctx.config.max_tasks_per_child != 0 && served >= ctx.config.max_tasks_per_child {
            // Retire and hand the channels to a fresh thread.
            spawn_worker(ctx.clone());
            return;
        }
    }
}

/// Builds the full index for `corpus_path` under `out_dir`.
///
/// Batches are scheduled onto a pool of share-nothing worker threads with at
/// most `max_in_flight` submitted at once; the first worker failure aborts
/// the build before the meta descriptor exists.
pub fn build(corpus_path: &Path, out_dir: &Path, cfg: &IndexConfig) -> Result<BuildResult> {
    if !corpus_path.is_file() {
        return Err(Error::CorpusNotFound(corpus_path.to_path_buf()));
    }
    fs::create_dir_all(out_dir)?;

    let workers = cfg.workers.max(1);
    let max_in_flight = cfg.effective_max_in_flight();
    let started = Instant::now();
    tracing::info!(
        corpus = %corpus_path.display(),
        workers,
        max_in_flight,
        block_docs = cfg.block_docs,
        "starting index build"
    );

    let (job_tx, job_rx) = unbounded::<Job>();
    let (result_tx, result_rx) = unbounded::<Result<WorkerOutput>>();
    let ctx = WorkerContext {
        corpus_path: corpus_path.to_path_buf(),
        out_dir: out_dir.to_path_buf(),
        config: cfg.clone(),
        job_rx,
        result_tx,
    };
    for _ in 0..workers {
        spawn_worker(ctx.clone());
    }
    // The coordinator keeps no endpoints beyond these two; dropping `job_tx`
    // at the end is what winds the pool down.
    drop(ctx);

    let mut batches = corpus::batch_offsets(corpus_path, cfg.block_docs)?;
    let mut next_batch_id = 0u64;
    let mut in_flight = 0usize;
    let mut exhausted = false;

    let mut block_paths: Vec<PathBuf> = Vec::new();
    let mut part_paths: Vec<PathBuf> = Vec::new();
    let mut total_docs = 0u64;
    let mut next_log = LOG_EVERY_DOCS;

    loop {
        while !exhausted && in_flight < max_in_flight {
            match batches.next() {
                Some(range) => {
                    next_batch_id += 1;
                    job_tx
                        .send((next_batch_id, range?))
                        .map_err(|_| Error::WorkerPoolClosed)?;
                    in_flight += 1;
                }
                None => exhausted = true,
            }
        }
        if in_flight == 0 {
            break;
        }

        // Wait for any completed worker.
        let completed = result_rx.recv().map_err(|_| Error::WorkerPoolClosed)??;
        in_flight -= 1;
        total_docs += completed.docs_count;
        block_paths.push(completed.block_path);
        part_paths.push(completed.doc_store_path);

        if total_docs >= next_log {
            let elapsed = started.elapsed().as_secs_f64();
            let docs_per_sec = if elapsed > 0.0 {
                total_docs as f64 / elapsed
            } else {
                0.0
            };
            tracing::info!(total_docs, docs_per_sec, "indexing");
            next_log += LOG_EVERY_DOCS;
        }
    }
    drop(job_tx);

    tracing::info!(total_docs, blocks = block_paths.len(), "all batches inverted");
    let result = finalize::finalize(block_paths, part_paths, out_dir, total_docs, cfg)?;
    tracing::info!(
        n_docs = result.n_docs,
        vocab_size = result.vocab_size,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "index build complete"
    );
    Ok(result)
}
