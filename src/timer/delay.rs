use embedded_hal::delay::DelayNs;

use super::Poll;

/// Runs a blocking loop that repeatedly polls the provided engine.
///
/// This is a simple timing loop for use in environments where interrupts are
/// unavailable or undesired. Each iteration performs one [`Poll::poll`] and
/// then waits `tick_us` microseconds.
///
/// # Arguments
/// - `engine`: a `FrameWriter` or `FrameHandler`
/// - `delay`: a delay provider implementing `DelayNs`, typically from the HAL
/// - `tick_us`: the delay between polls, e.g. [`byte_period_us`](super::byte_period_us)
///
/// # Example
/// ```rust,ignore
/// use busframe::timer::{byte_period_us, run_poll_loop};
/// let mut handler = FrameHandler::new(RingBuffer::<90>::new());
/// run_poll_loop(&mut handler, &mut delay, byte_period_us(9_600));
/// ```
///
/// # Notes
/// - This loop will never return; it is intended for single-purpose polling firmware.
/// - Errors are not acted upon; each engine keeps the last one in `last_error()`.
pub fn run_poll_loop<P: Poll, D: DelayNs>(engine: &mut P, delay: &mut D, tick_us: u32) -> ! {
    loop {
        let _ = engine.poll();
        delay.delay_us(tick_us);
    }
}

/// Polls `engine` until `done` returns true, waiting `tick_us` between polls.
///
/// # Returns
/// - `Some(n)`: `done` held after `n` polls
/// - `None`: `done` still did not hold after `max_polls` polls
pub fn poll_until<P, D, F>(
    engine: &mut P,
    delay: &mut D,
    tick_us: u32,
    max_polls: usize,
    mut done: F,
) -> Option<usize>
where
    P: Poll,
    D: DelayNs,
    F: FnMut(&P) -> bool,
{
    for polls in 0..max_polls {
        if done(engine) {
            return Some(polls);
        }
        let _ = engine.poll();
        delay.delay_us(tick_us);
    }
    done(engine).then_some(max_polls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{ByteBuffer, RingBuffer};
    use crate::consts::{APPLICATION_BUFFER_LEN, OUTBOUND_BUFFER_LEN};
    use crate::handler::FrameHandler;
    use crate::signal::Signal;
    use crate::writer::FrameWriter;
    use embedded_hal_mock::eh1::delay::NoopDelay;

    /// Records the total time requested.
    struct CountingDelay {
        total_ns: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    #[test]
    fn test_poll_until_sends_frame() {
        let mut writer = FrameWriter::new(RingBuffer::<OUTBOUND_BUFFER_LEN>::new());
        writer.open().unwrap();
        writer.write(0x42).unwrap();
        writer.close().unwrap();
        writer.trigger().unwrap();

        let mut delay = NoopDelay::new();
        let polls = poll_until(&mut writer, &mut delay, 100, 100, |w| !w.is_triggered());
        assert!(polls.is_some());
        assert_eq!(writer.outbound().fill_level(), 12);
    }

    #[test]
    fn test_poll_until_gives_up() {
        let mut handler = FrameHandler::new(RingBuffer::<APPLICATION_BUFFER_LEN>::new());
        let mut delay = CountingDelay { total_ns: 0 };
        assert_eq!(
            poll_until(&mut handler, &mut delay, 50, 10, |h| h.frames_received > 0),
            None
        );
        assert_eq!(delay.total_ns, 10 * 50_000);
    }

    #[test]
    fn test_poll_until_checks_before_polling() {
        let listener = Signal::new();
        let mut handler = FrameHandler::new(RingBuffer::<APPLICATION_BUFFER_LEN>::new());
        handler.register_application_listener(&listener);
        let mut delay = CountingDelay { total_ns: 0 };
        assert_eq!(poll_until(&mut handler, &mut delay, 50, 10, |_| true), Some(0));
        assert_eq!(delay.total_ns, 0);
    }
}
