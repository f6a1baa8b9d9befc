use std::{
    io,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const MIN_PERIOD: Duration = Duration::from_millis(1);


/// Фоновый поток, периодически вызывающий `tick`.
///
/// Пауза между итерациями = период минус время предыдущей итерации,
/// но не меньше 1 мс. Остановка: отмена токена + unpark потока, так что
/// `stop` не ждёт окончания текущей паузы.
pub(crate) struct Sweeper {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub(crate) fn spawn<F>(name: String, period: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let token = CancellationToken::new();
        let running = token.clone();
        let handle = thread::Builder::new().name(name).spawn(move || {
            let mut pause = period.max(MIN_PERIOD);
            loop {
                thread::park_timeout(pause);
                if running.is_cancelled() {
                    break;
                }
                let started = Instant::now();
                tick();
                pause = period.saturating_sub(started.elapsed()).max(MIN_PERIOD);
            }
            debug!("sweeper exited");
        })?;

        Ok(Self {
            token,
            handle: Some(handle),
        })
    }

    pub(crate) fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn ticks_periodically_and_stops_promptly() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let mut sweeper = Sweeper::spawn("sweeper-test".into(), Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(60));
        let started = Instant::now();
        sweeper.stop();
        assert!(started.elapsed() < Duration::from_millis(500));

        let seen = ticks.load(Ordering::Relaxed);
        assert!(seen >= 2, "sweeper ticked only {} times", seen);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::Relaxed), seen);
    }

    #[test]
    fn long_period_does_not_delay_stop() {
        let mut sweeper = Sweeper::spawn("sweeper-idle".into(), Duration::from_secs(30), || {}).unwrap();
        let started = Instant::now();
        sweeper.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
