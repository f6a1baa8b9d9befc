use super::{
    errors::WorkError,
    model::Status,
};
use std::{
    fmt,
    sync::Arc,
};
use tokio::sync::oneshot;


type WorkBody<A, B> = dyn Fn(&A) -> Result<B, WorkError> + Send + Sync + 'static;

/// Пользовательская единица работы: `&A -> Result<B, WorkError>`.
///
/// Клонирование дешёвое (Arc), идентичность сохраняется, так что callback
/// может сравнить полученную функцию с отправленной через [`WorkFn::ptr_eq`].
pub struct WorkFn<A, B> {
    body: Arc<WorkBody<A, B>>,
}

impl<A, B> WorkFn<A, B> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&A) -> Result<B, WorkError> + Send + Sync + 'static,
    {
        Self { body: Arc::new(f) }
    }

    #[inline(always)]
    pub fn call(&self, input: &A) -> Result<B, WorkError> {
        (self.body)(input)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl<A, B> Clone for WorkFn<A, B> {
    fn clone(&self) -> Self {
        Self { body: Arc::clone(&self.body) }
    }
}

impl<A, B> fmt::Debug for WorkFn<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkFn({:p})", Arc::as_ptr(&self.body) as *const ())
    }
}


/// Задание, которое держит очередь или слот.
///
/// `PoisonPill` завершает цикл слота и не порождает завершения.
pub(crate) enum Job<A, B> {
    Run {
        work: WorkFn<A, B>,
        input: A,
        reply: Option<oneshot::Sender<Status>>,
    },
    PoisonPill,
}

impl<A, B> Job<A, B> {
    pub(crate) fn run(work: WorkFn<A, B>, input: A, reply: Option<oneshot::Sender<Status>>) -> Self {
        Job::Run { work, input, reply }
    }
}
