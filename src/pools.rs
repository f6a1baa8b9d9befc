//! Семейство пулов поверх [`Dispatcher`]
//!
//! - [`TaskPool`]: задачи без входа, `Fn() -> Result<(), WorkError>`
//! - [`WorkerPool`]: типизированный вход, результат: только успех/ошибка
//! - [`MapWorkerPool`]: типизированный вход и выход, плюс пакетный
//!   [`process_collection`](Dispatcher::process_collection)

use super::{
    config::Config,
    errors::{PoolError, WorkError},
    model::{Completion, Status},
    pool::Dispatcher,
    work::WorkFn,
};
use std::sync::{Arc, Mutex, PoisonError};


pub type TaskPool = Dispatcher<(), ()>;

pub type WorkerPool<A> = Dispatcher<A, ()>;

pub type MapWorkerPool<A, B> = Dispatcher<A, B>;


impl WorkFn<(), ()> {
    pub fn task<F>(f: F) -> Self
    where
        F: Fn() -> Result<(), WorkError> + Send + Sync + 'static,
    {
        WorkFn::new(move |_: &()| f())
    }
}

impl Dispatcher<(), ()> {
    /// Отправить задачу; возвращает её `WorkFn`, который потом придёт в
    /// callback (для сравнения через `ptr_eq` или повторной отправки)
    #[track_caller]
    pub fn submit_task<F>(&self, task: F) -> WorkFn<(), ()>
    where
        F: Fn() -> Result<(), WorkError> + Send + Sync + 'static,
    {
        let work = WorkFn::task(task);
        self.submit(work.clone(), ());
        work
    }
}

impl<A, B> Dispatcher<A, B>
where
    A: Send + 'static,
    B: Send + 'static,
{
    /// Временный пул с последовательной доставкой: отправить все входы,
    /// дождаться, остановить. Выходы идут в порядке завершения, а не в
    /// порядке входов. Упавшие задания результата не дают.
    pub fn process_collection<I>(work: WorkFn<A, B>, threads: usize, inputs: I) -> Vec<B>
    where
        I: IntoIterator<Item = A>,
    {
        Self::process_collection_results(work, threads, inputs)
            .into_iter()
            .filter_map(Result::ok)
            .collect()
    }

    /// То же, но с ошибками упавших заданий
    pub fn process_collection_results<I>(work: WorkFn<A, B>, threads: usize, inputs: I) -> Vec<Result<B, WorkError>>
    where
        I: IntoIterator<Item = A>,
    {
        let sink: Arc<Mutex<Vec<Result<B, WorkError>>>> = Arc::new(Mutex::new(Vec::new()));
        let outputs = Arc::clone(&sink);

        let pool = Self::with_config(
            Config::default().workers(threads).serial_callbacks(true),
            move |_, completion: Completion<A, B>| {
                let outcome = match (completion.status, completion.output) {
                    (Status::Ok, Some(output)) => Ok(output),
                    (Status::Failed(err), _) => Err(err),
                    (Status::Ok, None) => return,
                };
                outputs.lock().unwrap_or_else(PoisonError::into_inner).push(outcome);
            },
        );

        for input in inputs {
            pool.submit(work.clone(), input);
        }
        pool.join();
        pool.stop();

        let mut collected = sink.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *collected)
    }

    /// `process_collection` на блокирующем пуле tokio
    pub async fn process_collection_async<I>(work: WorkFn<A, B>, threads: usize, inputs: I) -> Result<Vec<B>, PoolError>
    where
        I: IntoIterator<Item = A> + Send + 'static,
    {
        tokio::task::spawn_blocking(move || Self::process_collection(work, threads, inputs))
            .await
            .map_err(|e| PoolError::Join(e.to_string()))
    }
}
