/// Default number of workers kept alive even when idle
pub const DEFAULT_CORE_POOL_SIZE: usize = 2;
/// Default upper bound on workers
pub const DEFAULT_MAX_POOL_SIZE: usize = 4;
/// Default idle time (milliseconds) before a worker above the core size retires
pub const DEFAULT_KEEP_ALIVE_MS: u64 = 20_000;
/// Default number of entry tasks that may wait for a worker
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
/// Default re-check interval for `join_all`
pub const DEFAULT_JOIN_INTERVAL_MS: u64 = 10;
