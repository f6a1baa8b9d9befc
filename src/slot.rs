use super::{
    channel::Record,
    errors::WorkError,
    model::{Completion, SlotState, Status},
    pool::Submitter,
    work::{Job, WorkFn},
};
use std::{
    cell::Cell,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex, PoisonError,
    },
};
use crossbeam::sync::{Parker, Unparker};
use tracing::{debug, warn};

thread_local! {
    static WORKER_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Текущий поток принадлежит слоту какого-либо пула
#[inline]
pub(crate) fn on_worker_thread() -> bool {
    WORKER_THREAD.with(Cell::get)
}

/// Слот воркера: ровно один выделенный поток ОС.
///
/// Задание передаётся через ячейку `job`, а поток будится через
/// `Unparker`. Токен парковки ведёт себя как бинарный семафор, изначально
/// закрытый: его всегда забирает поток слота, а отпускает тот, кто сейчас
/// отвечает за выдачу работы этому слоту.
pub(crate) struct WorkerSlot<A, B> {
    id: usize,
    state: AtomicU8,
    job: Mutex<Option<Job<A, B>>>,
    unparker: Unparker,
}

impl<A, B> WorkerSlot<A, B> {
    /// `Parker` уходит в поток слота, `Unparker` остаётся в слоте
    pub(crate) fn new(id: usize) -> (Self, Parker) {
        let parker = Parker::new();
        let slot = Self {
            id,
            state: AtomicU8::new(SlotState::Idle as u8),
            job: Mutex::new(None),
            unparker: parker.unparker().clone(),
        };
        (slot, parker)
    }

    #[inline]
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub(crate) fn state(&self) -> SlotState {
        SlotState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_state(&self, state: SlotState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Idle -> Armed: кладёт задание и будит поток слота
    pub(crate) fn arm(&self, job: Job<A, B>) {
        self.set_state(SlotState::Armed);
        *self.job.lock().unwrap_or_else(PoisonError::into_inner) = Some(job);
        self.unparker.unpark();
    }

    fn take_job(&self) -> Option<Job<A, B>> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn wait_job(&self, parker: &Parker) -> Job<A, B> {
        loop {
            if let Some(job) = self.take_job() {
                return job;
            }
            parker.park();
        }
    }
}

impl<A, B> WorkerSlot<A, B>
where
    A: Send + 'static,
    B: Send + 'static,
{
    /// Основной цикл потока слота.
    ///
    /// Следующее задание либо приходит сразу из `on_job_complete`
    /// (очередь не пуста), либо слот уходит в idle и паркуется.
    pub(crate) fn run(self: Arc<Self>, parker: Parker, pool: Submitter<A, B>) {
        WORKER_THREAD.with(|flag| flag.set(true));
        debug!(slot = self.id, "worker slot started");
        let mut next: Option<Job<A, B>> = None;

        loop {
            let job = match next.take() {
                Some(job) => job,
                None => self.wait_job(&parker),
            };

            match job {
                Job::PoisonPill => break,
                Job::Run { work, input, reply } => {
                    self.set_state(SlotState::Executing);
                    pool.job_started();

                    let (status, output) = execute(self.id, &work, &input);
                    let record = Record {
                        completion: Completion { work, status, input, output },
                        reply,
                    };
                    next = pool.on_job_complete(&self, record);
                }
            }
        }

        self.set_state(SlotState::Terminated);
        debug!(slot = self.id, "worker slot terminated");
    }
}

/// Ошибка или паника единицы работы остаётся внутри слота
fn execute<A, B>(slot: usize, work: &WorkFn<A, B>, input: &A) -> (Status, Option<B>) {
    match panic::catch_unwind(AssertUnwindSafe(|| work.call(input))) {
        Ok(Ok(output)) => (Status::Ok, Some(output)),
        Ok(Err(err)) => (Status::Failed(err), None),
        Err(payload) => {
            let err = WorkError::from_panic(payload);
            warn!(slot, error = %err, "work item panicked");
            (Status::Failed(err), None)
        }
    }
}
