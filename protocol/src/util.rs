use {
    anyhow::{Result, bail},
    std::{
        io::{self, Write},
        path::Path,
    },
    tokio::{
        runtime::{Handle, RuntimeFlavor},
        task::block_in_place,
    },
};

const MAX_CONTAINER_NAME_LEN: usize = 255;

/// Runs CPU-heavy or blocking work without stalling other tasks.
///
/// `block_in_place` panics on a current-thread runtime, so it is only used
/// when running on the multi-threaded one.
#[inline]
pub fn maybe_block_in_place<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => block_in_place(f),
        _ => f(),
    }
}

#[inline]
pub fn check_container_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("container name cannot be empty");
    }
    if name.len() > MAX_CONTAINER_NAME_LEN {
        bail!("container name cannot be longer than {MAX_CONTAINER_NAME_LEN} bytes");
    }
    if let Some(c) = name.chars().find(|c| c.is_control() || *c == '/') {
        bail!("container name contains invalid character {c:?}");
    }
    Ok(())
}

/// Opens the log file for appending, or falls back to stdout.
#[inline]
pub fn log_writer(log_file: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    if let Some(log_file) = log_file {
        if let Some(parent) = log_file.parent() {
            fs_err::create_dir_all(parent)?;
        }
        let file = fs_err::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        Ok(Box::new(file))
    } else {
        Ok(Box::new(io::stdout()))
    }
}
