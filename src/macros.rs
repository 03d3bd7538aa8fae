/// Like `tracing::info!`, with the seconds elapsed since `$time` (a
/// `chrono::DateTime<Local>`) attached as `runtime_secs`.
/// ```ignore
/// let time = Local::now();
/// info_time!(time, "crawled {} ranges", 3);
/// ```
#[macro_export]
macro_rules! info_time {
    ($time:expr, $($arg:tt)+) => {{
        let run_time = (::chrono::Local::now() - $time)
            .num_microseconds()
            .map(|n| n as f64 / 1_000_000.0)
            .unwrap_or(0.0);
        ::tracing::info!(runtime_secs = run_time, $($arg)+);
    }};
}
