/// Declares a static global engine slot protected by a `critical_section` mutex.
///
/// This macro creates a `static` singleton suitable for use in interrupt-based
/// environments, where both the main thread and an ISR need to safely access
/// the shared engine state.
///
/// # Arguments
/// - `$name`: The name of the static
/// - `$engine`: The concrete engine type, e.g. `FrameHandler<'static, RingBuffer<90>>`
///
/// # Example
/// ```rust,ignore
/// init_bus_engine!(HANDLER: FrameHandler<'static, RingBuffer<90>>);
/// ```
#[macro_export]
macro_rules! init_bus_engine {
    ( $name:ident : $engine:ty ) => {
        pub static $name: $crate::timer::GlobalEngine<$engine> =
            $crate::timer::global_engine_init();
    };
}

/// Stores an engine instance in a slot declared with `init_bus_engine!`.
///
/// # Arguments
/// - `$name`: The static declared by `init_bus_engine!`
/// - `$engine`: An expression building the engine
///
/// # Example
/// ```rust,ignore
/// fn main() {
///     setup_bus_engine!(HANDLER, FrameHandler::new(RingBuffer::new()));
/// }
/// ```
///
/// # Notes
/// - Safe to call from `main()`; any previously stored engine is dropped.
#[macro_export]
macro_rules! setup_bus_engine {
    ( $name:ident, $engine:expr ) => {
        $crate::timer::global_engine_setup(&$name, $engine)
    };
}

/// Polls an engine declared with `init_bus_engine!` once, if it has been set up.
///
/// Evaluates to `Option<nb::Result<(), E>>`, `None` before setup.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn TIM2() {
///     let _ = poll_bus_engine!(HANDLER);
/// }
/// ```
#[macro_export]
macro_rules! poll_bus_engine {
    ( $name:ident ) => {
        $crate::timer::global_engine_poll(&$name)
    };
}
