// Simple internal macros for conditionally compiling logging statements. When
// the 'logging' feature is disabled, every trace call vanishes entirely.

macro_rules! log {
    ($($tt:tt)*) => {
        #[cfg(feature = "logging")]
        {
            $($tt)*
        }
    }
}

macro_rules! trace {
    ($($tt:tt)*) => { log!(log::trace!($($tt)*)) }
}
