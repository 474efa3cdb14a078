mod circuit_breaker;
mod fusion;
mod queue_placement;
mod token_bucket;

/// Current-thread runtime with the clock paused, for deterministic
/// time-based properties.
pub fn paused_rt() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("test runtime")
}

/// Current-thread runtime with a live clock.
pub fn rt() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("test runtime")
}
