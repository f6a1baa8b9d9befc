use super::{
    channel::{Record, ResultChannel},
    config::Config,
    errors::{panic_message, PoolError},
    handle::CompletionHandle,
    model::{Completion, PoolMetrics, SlotState},
    queue::{IdlePool, TaskQueue},
    slot::{self, WorkerSlot},
    sweeper::Sweeper,
    work::{Job, WorkFn},
};
use std::{
    io,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Condvar, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
};
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};


/// Пользовательский callback завершений.
///
/// Без `serial_callbacks` вызывается конкурентно из потоков воркеров,
/// иначе из одного выделенного потока в порядке завершения. Не должен
/// блокироваться надолго: он занимает слот (или единственный поток повтора).
/// Повторная отправка из callback'а в прямом режиме не ждёт `queue_limit`,
/// в последовательном режиме ждёт как обычный продюсер.
pub type Callback<A, B> = Arc<dyn Fn(&Submitter<A, B>, Completion<A, B>) + Send + Sync + 'static>;


struct Shared<A, B> {
    config: Config,
    workers: usize,
    queue: TaskQueue<A, B>,
    idle: IdlePool<A, B>,
    results: Option<ResultChannel<A, B>>,
    callback: Callback<A, B>,
    stopped: AtomicBool,
    // продюсеры между проверкой `stopped` и постановкой задания
    submitting: AtomicUsize,
    // отправлено минус доставлено в callback
    outstanding: AtomicUsize,
    executing: AtomicUsize,
    submitted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    quiet_lock: Mutex<()>,
    quiet: Condvar,
}


/// Сторона пула, принимающая работу.
///
/// Дёшево клонируется; именно её получает callback, так что из callback'а
/// можно отправлять новые задания.
pub struct Submitter<A, B> {
    shared: Arc<Shared<A, B>>,
}

impl<A, B> Clone for Submitter<A, B> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<A, B> Submitter<A, B> {
    /// Отправить задание. Отправка в остановленный пул есть нарушение
    /// предусловия и приводит к панике.
    #[track_caller]
    pub fn submit(&self, work: WorkFn<A, B>, input: A) {
        if let Err(err) = self.try_submit(work, input) {
            panic!("{}", err);
        }
    }

    pub fn try_submit(&self, work: WorkFn<A, B>, input: A) -> Result<(), PoolError> {
        self.enqueue(Job::run(work, input, None))
    }

    /// Как `try_submit`, плюс handle, который разрешится статусом задания
    /// после того, как завершение отдано в callback
    pub fn submit_with_handle(&self, work: WorkFn<A, B>, input: A) -> Result<CompletionHandle, PoolError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(Job::run(work, input, Some(tx)))?;
        Ok(CompletionHandle::new(rx))
    }

    /// Отправить одну функцию для каждого входа
    pub fn submit_each<I>(&self, work: &WorkFn<A, B>, inputs: I) -> Result<usize, PoolError>
    where
        I: IntoIterator<Item = A>,
    {
        let mut count = 0;
        for input in inputs {
            self.try_submit(work.clone(), input)?;
            count += 1;
        }
        Ok(count)
    }

    /// Есть ли задания в очереди. Только подсказка: значение может
    /// устареть сразу после чтения.
    #[inline]
    pub fn has_work(&self) -> bool {
        !self.shared.queue.is_empty()
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    #[inline]
    pub fn metrics(&self) -> PoolMetrics {
        let shared = &self.shared;
        PoolMetrics {
            workers: shared.workers,
            idle_workers: shared.idle.len(),
            executing: shared.executing.load(Ordering::Relaxed),
            queued: shared.queue.len(),
            awaiting_replay: shared.results.as_ref().map_or(0, |c| c.pending()),
            submitted: shared.submitted.load(Ordering::Relaxed),
            completed: shared.completed.load(Ordering::Relaxed),
            failed: shared.failed.load(Ordering::Relaxed),
        }
    }

    /// `submitting` и `stopped` образуют пару SeqCst: либо продюсер видит
    /// остановку, либо `stop` видит продюсера и дожидается его задания.
    fn enqueue(&self, job: Job<A, B>) -> Result<(), PoolError> {
        let shared = &self.shared;
        shared.submitting.fetch_add(1, Ordering::SeqCst);
        if shared.stopped.load(Ordering::SeqCst) {
            shared.submitting.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::Stopped);
        }
        shared.outstanding.fetch_add(1, Ordering::AcqRel);
        shared.submitted.fetch_add(1, Ordering::Relaxed);

        self.wait_for_capacity();
        self.dispatch(job);
        shared.submitting.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    /// Мягкий лимит: при переполнении продюсер ждёт, пока глубина очереди
    /// не опустится до `max(limit / 2, 1)`. Работа никогда не отбрасывается.
    ///
    /// Потоки слотов (callback в прямом режиме) не ждут никогда.
    fn wait_for_capacity(&self) {
        let shared = &self.shared;
        let limit = shared.config.queue_limit;
        if limit == 0 || shared.queue.len() < limit || !shared.idle.is_empty() {
            return;
        }
        if slot::on_worker_thread() {
            trace!(queued = shared.queue.len(), limit, "queue limit ignored on worker thread");
            return;
        }

        let resume = shared.config.resume_depth();
        trace!(queued = shared.queue.len(), limit, resume, "queue limit reached, producer stalled");
        while shared.queue.len() > resume {
            thread::sleep(shared.config.poll_interval);
        }
    }

    /// Свободный слот получает работу напрямую, иначе задание встаёт в
    /// очередь. Если очередь при этом не пуста (слот и задание разминулись),
    /// слот берёт голову очереди, а новое задание идёт в хвост, чтобы не
    /// обгонять уже ожидающие.
    pub(crate) fn dispatch(&self, job: Job<A, B>) {
        let shared = &self.shared;
        match shared.idle.pop() {
            Some(slot) => match shared.queue.pop() {
                Some(head) => {
                    shared.queue.push(job);
                    slot.arm(head);
                }
                None => slot.arm(job),
            },
            None => shared.queue.push(job),
        }
    }

    #[inline]
    pub(crate) fn job_started(&self) {
        self.shared.executing.fetch_add(1, Ordering::Relaxed);
    }

    /// Доставляет завершение и возвращает слот в работу: следующее задание
    /// из очереди отдаётся тому же потоку сразу, иначе слот уходит в idle.
    pub(crate) fn on_job_complete(&self, slot: &Arc<WorkerSlot<A, B>>, record: Record<A, B>) -> Option<Job<A, B>> {
        let shared = &self.shared;
        shared.executing.fetch_sub(1, Ordering::Relaxed);

        match &shared.results {
            Some(channel) => channel.push(record),
            None => self.deliver(record),
        }

        match shared.queue.pop() {
            Some(job) => {
                slot.set_state(SlotState::Armed);
                Some(job)
            }
            None => {
                slot.set_state(SlotState::Idle);
                shared.idle.push(Arc::clone(slot));
                None
            }
        }
    }

    fn deliver(&self, record: Record<A, B>) {
        let shared = &self.shared;
        let Record { completion, reply } = record;
        let status = completion.status.clone();

        let callback = &*shared.callback;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(self, completion))) {
            warn!(panic = %panic_message(&*payload), "completion callback panicked, discarded");
        }

        if status.is_ok() {
            shared.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            shared.failed.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(reply) = reply {
            let _ = reply.send(status);
        }

        if shared.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = shared.quiet_lock.lock().unwrap_or_else(PoisonError::into_inner);
            shared.quiet.notify_all();
        }
    }

    fn replay(&self) {
        if let Some(channel) = &self.shared.results {
            channel.drain_with(|record| self.deliver(record));
        }
    }

    /// Один шаг согласования: если одновременно есть задание в очереди и
    /// свободный слот, сводит их. Слот снимается первым, поэтому вернуть
    /// на место иногда приходится только его, а порядок очереди не страдает.
    pub(crate) fn reconcile(&self) -> bool {
        let shared = &self.shared;
        if shared.queue.is_empty() || shared.idle.is_empty() {
            return false;
        }
        let Some(slot) = shared.idle.pop() else {
            return false;
        };
        match shared.queue.pop() {
            Some(job) => {
                trace!(slot = slot.id(), "sweeper matched stranded job");
                slot.arm(job);
                true
            }
            None => {
                shared.idle.push(slot);
                false
            }
        }
    }

    fn wait_quiescent(&self) {
        let shared = &self.shared;
        let mut guard = shared.quiet_lock.lock().unwrap_or_else(PoisonError::into_inner);
        while shared.outstanding.load(Ordering::Acquire) > 0 {
            guard = match shared.quiet.wait_timeout(guard, shared.config.poll_interval) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}


#[derive(Default)]
struct Threads {
    workers: Vec<JoinHandle<()>>,
    replay: Option<JoinHandle<()>>,
    sweeper: Option<Sweeper>,
}


/// Пул фиксированного размера: один поток ОС на слот, опциональный поток
/// последовательной доставки и поток согласования.
///
/// `A` это вход задания, `B` его результат. Семейство пулов
/// ([`TaskPool`](crate::TaskPool), [`WorkerPool`](crate::WorkerPool),
/// [`MapWorkerPool`](crate::MapWorkerPool)) являются псевдонимами этого типа.
pub struct Dispatcher<A, B> {
    pool: Submitter<A, B>,
    slots: Vec<Arc<WorkerSlot<A, B>>>,
    threads: Mutex<Option<Threads>>,
}

impl<A, B> Dispatcher<A, B>
where
    A: Send + 'static,
    B: Send + 'static,
{
    /// `workers == 0` = число доступных ядер, `queue_limit == 0` = без лимита
    pub fn start<C>(workers: usize, queue_limit: usize, callback: C, serial_callbacks: bool) -> Self
    where
        C: Fn(&Submitter<A, B>, Completion<A, B>) + Send + Sync + 'static,
    {
        Self::with_config(Config::new(workers, queue_limit, serial_callbacks), callback)
    }

    /// Паникует, если ОС не дала создать потоки
    #[track_caller]
    pub fn with_config<C>(config: Config, callback: C) -> Self
    where
        C: Fn(&Submitter<A, B>, Completion<A, B>) + Send + Sync + 'static,
    {
        match Self::try_with_config(config, callback) {
            Ok(pool) => pool,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_with_config<C>(config: Config, callback: C) -> Result<Self, PoolError>
    where
        C: Fn(&Submitter<A, B>, Completion<A, B>) + Send + Sync + 'static,
    {
        let workers = config.resolved_workers();
        let serial = config.serial_callbacks;
        let queue_limit = config.queue_limit;

        let shared = Arc::new(Shared {
            workers,
            queue: TaskQueue::new(),
            idle: IdlePool::new(),
            results: serial.then(ResultChannel::new),
            callback: Arc::new(callback),
            stopped: AtomicBool::new(false),
            submitting: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            executing: AtomicUsize::new(0),
            submitted: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            quiet_lock: Mutex::new(()),
            quiet: Condvar::new(),
            config,
        });
        let pool = Submitter { shared };

        let mut threads = Threads::default();
        let mut slots = Vec::with_capacity(workers);
        let spawned = Self::spawn_threads(&pool, workers, &mut threads, &mut slots);

        let dispatcher = Dispatcher {
            pool,
            slots,
            threads: Mutex::new(Some(threads)),
        };
        if let Err(err) = spawned {
            error!(error = %err, "failed to spawn pool threads");
            dispatcher.stop();
            return Err(PoolError::Spawn(err.to_string()));
        }

        debug!(workers, queue_limit, serial, "pool started");
        Ok(dispatcher)
    }

    fn spawn_threads(
        pool: &Submitter<A, B>,
        workers: usize,
        threads: &mut Threads,
        slots: &mut Vec<Arc<WorkerSlot<A, B>>>,
    ) -> io::Result<()> {
        let config = &pool.shared.config;
        let name = &config.thread_name;

        for id in 0..workers {
            let (slot, parker) = WorkerSlot::new(id);
            let slot = Arc::new(slot);
            let handle = {
                let slot = Arc::clone(&slot);
                let pool = pool.clone();
                thread::Builder::new()
                    .name(format!("{name}-worker-{id}"))
                    .spawn(move || slot.run(parker, pool))?
            };
            pool.shared.idle.push(Arc::clone(&slot));
            slots.push(slot);
            threads.workers.push(handle);
        }

        if pool.shared.results.is_some() {
            let replay = pool.clone();
            threads.replay = Some(
                thread::Builder::new()
                    .name(format!("{name}-callbacks"))
                    .spawn(move || replay.replay())?,
            );
        }

        let sweep = pool.clone();
        threads.sweeper = Some(Sweeper::spawn(format!("{name}-sweeper"), config.sweep_interval, move || {
            while sweep.reconcile() {}
        })?);

        Ok(())
    }
}

impl<A, B> Dispatcher<A, B> {
    #[track_caller]
    pub fn submit(&self, work: WorkFn<A, B>, input: A) {
        self.pool.submit(work, input)
    }

    pub fn try_submit(&self, work: WorkFn<A, B>, input: A) -> Result<(), PoolError> {
        self.pool.try_submit(work, input)
    }

    pub fn submit_with_handle(&self, work: WorkFn<A, B>, input: A) -> Result<CompletionHandle, PoolError> {
        self.pool.submit_with_handle(work, input)
    }

    pub fn submit_each<I>(&self, work: &WorkFn<A, B>, inputs: I) -> Result<usize, PoolError>
    where
        I: IntoIterator<Item = A>,
    {
        self.pool.submit_each(work, inputs)
    }

    #[inline]
    pub fn has_work(&self) -> bool {
        self.pool.has_work()
    }

    #[inline]
    pub fn metrics(&self) -> PoolMetrics {
        self.pool.metrics()
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.pool.is_stopped()
    }

    pub fn workers(&self) -> usize {
        self.pool.shared.workers
    }

    pub fn slot_states(&self) -> Vec<SlotState> {
        self.slots.iter().map(|slot| slot.state()).collect()
    }

    pub fn submitter(&self) -> Submitter<A, B> {
        self.pool.clone()
    }

    /// Ждёт, пока каждое отправленное задание не будет отдано в callback
    /// (а значит, пусты и очередь, и канал последовательной доставки).
    /// Нельзя вызывать из callback'а.
    pub fn join(&self) {
        self.pool.wait_quiescent();
    }

    /// Упорядоченная остановка: `join`, отказ новым отправкам, повторный
    /// `join` для заданий, уже прошедших проверку, по `PoisonPill` на слот, ожидание
    /// потоков воркеров, затем потока доставки и потока согласования.
    /// Повторный вызов ничего не делает.
    pub fn stop(&self) {
        let mut guard = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(mut threads) = guard.take() else {
            return;
        };

        self.join();
        let shared = &self.pool.shared;
        shared.stopped.store(true, Ordering::SeqCst);
        // продюсеры, успевшие пройти проверку до остановки, дописывают
        // задания; они выполняются до PoisonPill
        while shared.submitting.load(Ordering::SeqCst) > 0 {
            thread::sleep(shared.config.poll_interval);
        }
        self.join();

        for _ in 0..threads.workers.len() {
            self.pool.dispatch(Job::PoisonPill);
        }
        for handle in threads.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread exited abnormally");
            }
        }

        if let Some(replay) = threads.replay.take() {
            if let Some(channel) = &shared.results {
                channel.terminate();
            }
            if replay.join().is_err() {
                error!("callback thread exited abnormally");
            }
        }

        if let Some(mut sweeper) = threads.sweeper.take() {
            sweeper.stop();
        }
        debug!(workers = shared.workers, "pool stopped");
    }
}

impl<A, B> Drop for Dispatcher<A, B> {
    fn drop(&mut self) {
        self.stop();
    }
}
