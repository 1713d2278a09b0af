pub mod codec;
pub mod config;
pub mod json_utils;
pub mod markup;
pub mod storage;

pub use diagnostic;

/// Helper for wrapping a code block to help with contextualizing errors
/// Better editor support but slightly worse ergonomic than a macro
#[inline(always)]
pub(crate) fn m_try<T>(func: impl FnOnce() -> miette::Result<T>) -> miette::Result<T> {
    func()
}
