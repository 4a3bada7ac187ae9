//! Multi-threaded benchmarking harness for the `concurrent_buffers` container
//! variants.
//!
//! Reads a file of newline-separated integers, pushes/enqueues them across
//! `--threads` worker threads while concurrently popping/dequeuing, times the
//! run, and writes whatever remains in the container to the output file.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use concurrent_buffers::{HarnessError, IntQueue, IntStack};

/// Output vector slack, preserved from the original tool's "extra size of 10
/// to see the abnormalities of stack" convention.
const OUTPUT_SLACK: usize = 10;

#[derive(Parser, Debug)]
#[command(
    name = "concurrent-buffers",
    about = "Drive a concurrent stack or queue variant with a multi-threaded push/pop workload"
)]
struct Cli {
    /// File containing elements to insert into the stack or queue.
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// File to store remaining elements in the stack or queue.
    #[arg(short = 'o', long = "output", default_value = "stack_queue_output.txt")]
    output: PathBuf,

    /// Number of threads for parallelism.
    #[arg(short = 't', long = "threads", default_value_t = 4)]
    threads: usize,

    /// Stack variant: sgl, treiber, sgl_elim, treiber_elim, stack_flat.
    #[arg(long = "stack")]
    stack: Option<String>,

    /// Queue variant: sgl, mns.
    #[arg(long = "queue")]
    queue: Option<String>,

    /// Number of cells in the elimination array (elimination variants only).
    #[arg(long = "cells", default_value_t = concurrent_buffers::elimination::DEFAULT_CELLS)]
    cells: usize,
}

fn read_input(path: &Path) -> Result<Vec<i64>, HarnessError> {
    let file = fs::File::open(path).map_err(|source| HarnessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut values = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: i64 = trimmed.parse().map_err(|source| HarnessError::Parse {
            line: idx + 1,
            source,
        })?;
        values.push(value);
    }
    Ok(values)
}

fn write_output(path: &Path, values: &[i64]) -> Result<(), HarnessError> {
    let mut file = fs::File::create(path).map_err(|source| HarnessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    for v in values {
        writeln!(file, "{v}").map_err(|source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Each worker claims the next input index, pushes/enqueues it, then
/// attempts one pop/dequeue; it stops once the input is exhausted and its
/// own pop/dequeue attempt this round also came up empty.
fn run_stack_worker(
    stack: &dyn IntStack,
    input: &[i64],
    output: &[std::sync::Mutex<i64>],
    push_idx: &AtomicUsize,
    pop_idx: &AtomicUsize,
) {
    loop {
        let i = push_idx.fetch_add(1, Ordering::AcqRel);
        let had_input = i < input.len();
        if had_input {
            stack.push(input[i]);
        }
        let popped = stack.pop();
        if let Some(v) = popped {
            let slot = pop_idx.fetch_add(1, Ordering::AcqRel);
            if let Some(cell) = output.get(slot) {
                *cell.lock().unwrap() = v;
            }
        }
        if !had_input && popped.is_none() {
            return;
        }
    }
}

fn run_queue_worker(
    queue: &dyn IntQueue,
    input: &[i64],
    output: &[std::sync::Mutex<i64>],
    push_idx: &AtomicUsize,
    pop_idx: &AtomicUsize,
) {
    loop {
        let i = push_idx.fetch_add(1, Ordering::AcqRel);
        let had_input = i < input.len();
        if had_input {
            queue.enqueue(input[i]);
        }
        let popped = queue.dequeue();
        if let Some(v) = popped {
            let slot = pop_idx.fetch_add(1, Ordering::AcqRel);
            if let Some(cell) = output.get(slot) {
                *cell.lock().unwrap() = v;
            }
        }
        if !had_input && popped.is_none() {
            return;
        }
    }
}

fn run() -> Result<(), HarnessError> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.stack.is_none() && cli.queue.is_none() {
        return Err(HarnessError::InvalidArgs(
            "specify exactly one of --stack or --queue".into(),
        ));
    }
    if cli.stack.is_some() && cli.queue.is_some() {
        return Err(HarnessError::InvalidArgs(
            "specify only one of --stack or --queue, not both".into(),
        ));
    }

    let input = read_input(&cli.input)?;
    log::info!(
        "read {} values from {}",
        input.len(),
        cli.input.display()
    );

    let output: Vec<std::sync::Mutex<i64>> = (0..input.len() + OUTPUT_SLACK)
        .map(|_| std::sync::Mutex::new(0))
        .collect();
    let push_idx = AtomicUsize::new(0);
    let pop_idx = AtomicUsize::new(0);

    let start = Instant::now();

    std::thread::scope(|scope| -> Result<(), HarnessError> {
        if let Some(name) = &cli.stack {
            let stack: Arc<dyn IntStack> = concurrent_buffers::stack::by_name(name, cli.cells)
                .ok_or_else(|| {
                    HarnessError::InvalidArgs(format!("unknown stack variant '{name}'"))
                })?
                .into();
            log::info!("running stack variant '{name}' with {} threads", cli.threads);
            for _ in 0..cli.threads {
                let stack = Arc::clone(&stack);
                let input = &input;
                let output = &output;
                let push_idx = &push_idx;
                let pop_idx = &pop_idx;
                scope.spawn(move || {
                    run_stack_worker(stack.as_ref(), input, output, push_idx, pop_idx);
                });
            }
        } else if let Some(name) = &cli.queue {
            let queue: Arc<dyn IntQueue> = concurrent_buffers::queue::by_name(name)
                .ok_or_else(|| {
                    HarnessError::InvalidArgs(format!("unknown queue variant '{name}'"))
                })?
                .into();
            log::info!("running queue variant '{name}' with {} threads", cli.threads);
            for _ in 0..cli.threads {
                let queue = Arc::clone(&queue);
                let input = &input;
                let output = &output;
                let push_idx = &push_idx;
                let pop_idx = &pop_idx;
                scope.spawn(move || {
                    run_queue_worker(queue.as_ref(), input, output, push_idx, pop_idx);
                });
            }
        }
        Ok(())
    })?;

    let elapsed = start.elapsed();
    println!("Elapsed (ns): {}", elapsed.as_nanos());
    println!("Elapsed (s): {:.6}", elapsed.as_secs_f64());

    let output_values: Vec<i64> = output.iter().map(|m| *m.lock().unwrap()).collect();
    write_output(&cli.output, &output_values)?;
    println!("Done!!!");

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
