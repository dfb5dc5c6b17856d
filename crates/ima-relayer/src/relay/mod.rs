// Transfer bookkeeping used by the relay loops

pub mod transfer_errors;
pub mod worker;

pub use transfer_errors::{
    verify_transfer_error_category_name, TransferErrorRecord, TransferErrorTracker,
    DEFAULT_CATEGORY, MAX_LAST_TRANSFER_ERRORS, TRANSFER_ERROR_EVENT, TRANSFER_SUCCESS_EVENT,
};
pub use worker::{
    apply_worker_message, forward_transfer_events, run_worker_message_loop, ForwardingHandle,
    WorkerMessage,
};
