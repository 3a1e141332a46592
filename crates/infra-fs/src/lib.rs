// Predwrap Infrastructure - Filesystem Adapter
// Implements: ResultPersister

mod log_file_persister;

pub use log_file_persister::{
    parse_text_log, render_text, LogFilePersister, LogFormat, NO_COLUMN,
};
