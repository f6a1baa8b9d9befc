use super::{
    model::{Completion, Status},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use crossbeam::channel::{unbounded, Receiver, Sender};
use tokio::sync::oneshot;


/// Завершение вместе с необязательным ожидающим его handle
pub(crate) struct Record<A, B> {
    pub(crate) completion: Completion<A, B>,
    pub(crate) reply: Option<oneshot::Sender<Status>>,
}

enum Delivery<A, B> {
    Record(Record<A, B>),
    Terminate,
}


/// Очередь завершений для последовательного режима.
///
/// Канал одновременно служит счётным сигналом: `recv` блокирует поток
/// повтора, пока нет хотя бы одной записи. Порядок вызовов callback'а
/// равен порядку прихода записей, то есть порядку завершения заданий.
pub(crate) struct ResultChannel<A, B> {
    sender: Sender<Delivery<A, B>>,
    receiver: Receiver<Delivery<A, B>>,
    pending: AtomicUsize,
}

impl<A, B> ResultChannel<A, B> {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            pending: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn push(&self, record: Record<A, B>) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        // Обе стороны канала живут в self, send не может вернуть ошибку
        let _ = self.sender.send(Delivery::Record(record));
    }

    /// Терминальная запись: поток повтора выходит, дойдя до неё
    pub(crate) fn terminate(&self) {
        let _ = self.sender.send(Delivery::Terminate);
    }

    /// Записи, ещё не отданные в callback (включая текущую)
    #[inline]
    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Цикл потока повтора: по одной записи до терминальной
    pub(crate) fn drain_with<F>(&self, mut deliver: F)
    where
        F: FnMut(Record<A, B>),
    {
        while let Ok(delivery) = self.receiver.recv() {
            match delivery {
                Delivery::Record(record) => {
                    deliver(record);
                    self.pending.fetch_sub(1, Ordering::AcqRel);
                }
                Delivery::Terminate => break,
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::WorkFn;
    use std::{sync::Arc, thread};

    fn record(input: u32) -> Record<u32, u32> {
        Record {
            completion: Completion {
                work: WorkFn::new(|x: &u32| Ok(*x)),
                status: Status::Ok,
                input,
                output: Some(input),
            },
            reply: None,
        }
    }

    #[test]
    fn replays_in_arrival_order_until_terminated() {
        let channel = Arc::new(ResultChannel::new());
        for i in 0..10 {
            channel.push(record(i));
        }
        assert_eq!(channel.pending(), 10);
        channel.terminate();
        // после терминальной записи ничего не доставляется
        channel.push(record(99));

        let replay = {
            let channel = channel.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                channel.drain_with(|r| seen.push(r.completion.input));
                seen
            })
        };
        let seen = replay.join().unwrap();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(channel.pending(), 1);
    }
}
