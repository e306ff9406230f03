//! Console report

use std::fmt::Write;

use pipeline_bench_core::{Summary, WorkerPool};

/// Placeholder for values that could not be computed
pub const UNAVAILABLE: &str = "unavailable";

const WIDTH: usize = 70;

fn value_or_unavailable(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.2}{unit}"),
        None => UNAVAILABLE.to_string(),
    }
}

/// Render the final report
pub fn render_summary(summary: &Summary) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_summary(&mut out, summary);
    out
}

fn write_summary(out: &mut String, summary: &Summary) -> std::fmt::Result {
    let config = &summary.config;
    let plan = config.pool_plan();
    let rule = "=".repeat(WIDTH);

    writeln!(out, "{rule}")?;
    writeln!(out, "   Pipeline Benchmark Results")?;
    writeln!(out, "{rule}")?;
    writeln!(out)?;

    writeln!(out, "Configuration:")?;
    writeln!(out, "  Warmup:               {}", u8::from(config.warmup))?;
    writeln!(out, "  Total streams:        {}", config.total_stream_num)?;
    writeln!(out, "  Streams per worker:   {}", config.cross_stream_num)?;
    writeln!(
        out,
        "  Workers:              {} ({} primary, {} single-stream)",
        plan.total_workers(),
        plan.primary_workers,
        plan.remainder_workers
    )?;
    writeln!(out, "  Data repeats:         {}", config.repeats)?;
    writeln!(out, "  Pipeline repeats:     {}", config.pipeline_repeats)?;
    writeln!(
        out,
        "  Wall time:            {} ms",
        summary.wall_time().num_milliseconds()
    )?;
    writeln!(out)?;

    writeln!(out, "Time used by each thread:")?;
    for thread in &summary.threads {
        writeln!(
            out,
            "  [{:>3}] {:>8} frames, {:>12.2} ms",
            thread.index, thread.frames, thread.elapsed_ms
        )?;
    }
    writeln!(out, "  Total time:           {:.2} ms", summary.total_elapsed_ms)?;
    writeln!(
        out,
        "  Mean time:            {}",
        value_or_unavailable(summary.mean_elapsed_ms, " ms")
    )?;
    writeln!(out)?;

    if !summary.workers.is_empty() {
        writeln!(out, "Utilization per worker:")?;
        for worker in &summary.workers {
            let pool = match worker.pool {
                WorkerPool::Primary => "primary",
                WorkerPool::Remainder => "single",
            };
            writeln!(
                out,
                "  [{:>3}] {:<7} streams={:<3} cpu={:<12} gpu={:<12} failed_sessions={}",
                worker.worker_id,
                pool,
                worker.stream_num,
                value_or_unavailable(worker.cpu_utilization, "%"),
                value_or_unavailable(worker.gpu_utilization, "%"),
                worker.failed_sessions
            )?;
        }
        writeln!(out)?;
    }

    if summary.failed_workers > 0 {
        writeln!(out, "Failed workers:         {}", summary.failed_workers)?;
        writeln!(out)?;
    }

    writeln!(out, "{rule}")?;
    writeln!(out, "fps: {}", value_or_unavailable(summary.fps, ""))?;
    writeln!(
        out,
        "average latency: {} ({} samples)",
        value_or_unavailable(summary.average_latency, " ms"),
        summary.latency_samples
    )?;
    writeln!(
        out,
        "For each repeat: {} threads processed, total-stream = {}, each thread processed {} streams",
        plan.total_workers(),
        config.total_stream_num,
        config.cross_stream_num
    )?;
    writeln!(
        out,
        "fps per stream: {}, including {} frames",
        value_or_unavailable(summary.fps, ""),
        summary.total_frames
    )?;
    writeln!(out, "{rule}")?;

    Ok(())
}
