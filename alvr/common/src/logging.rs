use anyhow::Result;
use backtrace::Backtrace;
use std::{error::Error, fmt::Display};

pub fn set_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!(
            "What happened:\n{panic_info}\n\nBacktrace:\n{:?}",
            Backtrace::new()
        );
    }))
}

pub fn show_w<W: Display>(w: W) {
    log::warn!("{w}");
}

pub fn show_warn<T, E: Display>(res: Result<T, E>) -> Option<T> {
    res.map_err(show_w).ok()
}

pub fn show_e<E: Display>(e: E) {
    log::error!("{e}");
}

pub fn show_e_dbg<E: std::fmt::Debug>(e: E) {
    log::error!("{e:?}");
}

pub fn show_err<T, E: Display>(res: Result<T, E>) -> Option<T> {
    res.map_err(show_e).ok()
}

pub trait ToAny<T> {
    fn to_any(self) -> Result<T>;
}

impl<T> ToAny<T> for Option<T> {
    fn to_any(self) -> Result<T> {
        match self {
            Some(value) => Ok(value),
            None => Err(anyhow::anyhow!("Unexpected None")),
        }
    }
}

impl<T, E: Error + Send + Sync + 'static> ToAny<T> for Result<T, E> {
    fn to_any(self) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(e) => Err(e.into()),
        }
    }
}
