use core::cell::RefCell;

use critical_section::Mutex;

use super::Poll;

/// Global slot holding an engine shared between `main` and an interrupt.
pub type GlobalEngine<P> = Mutex<RefCell<Option<P>>>;

/// Used to initialize a global static engine slot for use with
/// `critical_section`.
///
/// # Returns
/// * An empty slot
///
/// # Example
/// ```rust,ignore
/// use busframe::buffer::RingBuffer;
/// use busframe::handler::FrameHandler;
/// use busframe::timer::{global_engine_init, GlobalEngine};
///
/// static HANDLER: GlobalEngine<FrameHandler<'static, RingBuffer<90>>> =
///     global_engine_init();
/// ```
pub const fn global_engine_init<P: Poll>() -> GlobalEngine<P> {
    Mutex::new(RefCell::new(None))
}

/// Stores `engine` in the global slot, replacing any previous one.
///
/// # Example
/// ```rust,ignore
/// fn main() {
///     global_engine_setup(&HANDLER, FrameHandler::new(RingBuffer::new()));
/// }
/// ```
pub fn global_engine_setup<P: Poll>(global: &'static GlobalEngine<P>, engine: P) {
    critical_section::with(|cs| {
        let _ = global.borrow(cs).replace(Some(engine));
    });
}

/// Polls the global engine once, if it has been set up.
///
/// # Returns
/// - `None` if the slot is still empty
/// - `Some(result)` with the result of [`Poll::poll`] otherwise
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn TIM2() {
///     let _ = global_engine_poll(&HANDLER);
/// }
/// ```
pub fn global_engine_poll<P: Poll>(
    global: &'static GlobalEngine<P>,
) -> Option<nb::Result<(), P::Error>> {
    critical_section::with(|cs| global.borrow(cs).borrow_mut().as_mut().map(P::poll))
}

/// Runs `f` on the global engine inside a critical section.
///
/// Use this from `main` to submit bytes, open frames or read counters.
pub fn with_global_engine<P: Poll, R>(
    global: &'static GlobalEngine<P>,
    f: impl FnOnce(&mut P) -> R,
) -> Option<R> {
    critical_section::with(|cs| global.borrow(cs).borrow_mut().as_mut().map(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{ByteBuffer, RingBuffer};
    use crate::consts::OUTBOUND_BUFFER_LEN;
    use crate::writer::FrameWriter;

    type Writer = FrameWriter<'static, RingBuffer<OUTBOUND_BUFFER_LEN>>;

    #[test]
    fn test_poll_before_setup_is_noop() {
        static WRITER: GlobalEngine<Writer> = global_engine_init();
        assert!(global_engine_poll(&WRITER).is_none());
        assert!(with_global_engine(&WRITER, |w| w.frames_sent).is_none());
    }

    #[test]
    fn test_global_writer_sends_frame() {
        static WRITER: GlobalEngine<Writer> = global_engine_init();
        global_engine_setup(&WRITER, FrameWriter::new(RingBuffer::new()));

        with_global_engine(&WRITER, |w| {
            w.open().unwrap();
            w.write(0x42).unwrap();
            w.close().unwrap();
            w.trigger().unwrap();
        })
        .unwrap();

        for _ in 0..100 {
            assert!(global_engine_poll(&WRITER).is_some());
        }
        let level = with_global_engine(&WRITER, |w| w.outbound().fill_level());
        assert_eq!(level, Some(12));
    }
}
