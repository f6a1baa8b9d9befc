use super::{
    slot::WorkerSlot,
    work::Job,
};
use std::sync::Arc;
use crossbeam::{
    deque::{Injector, Steal},
    queue::SegQueue,
};


/// FIFO ожидающих заданий (lock-free).
pub(crate) struct TaskQueue<A, B> {
    inject: Injector<Job<A, B>>,
}

impl<A, B> TaskQueue<A, B> {
    pub(crate) fn new() -> Self {
        Self { inject: Injector::new() }
    }

    #[inline(always)]
    pub(crate) fn push(&self, job: Job<A, B>) {
        self.inject.push(job);
    }

    /// Снимает голову очереди. `Steal::Retry` означает гонку с другим
    /// потребителем, а не пустую очередь, поэтому повторяем.
    pub(crate) fn pop(&self) -> Option<Job<A, B>> {
        loop {
            match self.inject.steal() {
                Steal::Success(job) => return Some(job),
                Steal::Empty => return None,
                Steal::Retry => std::hint::spin_loop(),
            }
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.inject.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.inject.is_empty()
    }
}


/// Слоты, ожидающие работы
pub(crate) struct IdlePool<A, B> {
    slots: SegQueue<Arc<WorkerSlot<A, B>>>,
}

impl<A, B> IdlePool<A, B> {
    pub(crate) fn new() -> Self {
        Self { slots: SegQueue::new() }
    }

    #[inline(always)]
    pub(crate) fn push(&self, slot: Arc<WorkerSlot<A, B>>) {
        self.slots.push(slot);
    }

    #[inline(always)]
    pub(crate) fn pop(&self) -> Option<Arc<WorkerSlot<A, B>>> {
        self.slots.pop()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::WorkFn;

    fn job(input: u32) -> Job<u32, u32> {
        Job::run(WorkFn::new(|x: &u32| Ok(*x)), input, None)
    }

    #[test]
    fn task_queue_is_fifo() {
        let queue = TaskQueue::new();
        assert!(queue.is_empty());
        for i in 0..5 {
            queue.push(job(i));
        }
        queue.push(Job::PoisonPill);
        assert_eq!(queue.len(), 6);

        let mut seen = Vec::new();
        while let Some(job) = queue.pop() {
            match job {
                Job::Run { input, .. } => seen.push(input),
                Job::PoisonPill => seen.push(u32::MAX),
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4, u32::MAX]);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn idle_pool_tracks_membership() {
        let idle: IdlePool<u32, u32> = IdlePool::new();
        assert!(idle.pop().is_none());
        idle.push(Arc::new(WorkerSlot::new(0).0));
        idle.push(Arc::new(WorkerSlot::new(1).0));
        assert_eq!(idle.len(), 2);
        assert_eq!(idle.pop().map(|s| s.id()), Some(0));
        assert_eq!(idle.pop().map(|s| s.id()), Some(1));
        assert!(idle.is_empty());
    }
}
