// Utility functions and helpers

use std::thread;

/// Current Unix time in whole seconds
pub fn unix_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Whether the calling thread is the process main thread
pub fn is_main_thread() -> bool {
    thread::current().name() == Some("main")
}

/// Short description of the calling thread for diagnostics,
/// e.g. `main thread ThreadId(1)` or `worker thread loop-2`
pub fn thread_description() -> String {
    let current = thread::current();
    let kind = if is_main_thread() { "main" } else { "worker" };
    match current.name() {
        Some(name) if name != "main" => format!("{} thread {}", kind, name),
        _ => format!("{} thread {:?}", kind, current.id()),
    }
}
