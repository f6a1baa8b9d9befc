use super::{
    errors::HandleError,
    model::Status,
};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::{
    sync::oneshot::{self, error::TryRecvError},
    time::Duration,
};


/// Handle на одно задание: разрешается его `Status` после того, как
/// завершение отдано в callback.
///
/// Можно `.await`-ить из async кода или блокироваться через [`wait`](Self::wait)
/// из обычного потока.
pub struct CompletionHandle {
    receiver: oneshot::Receiver<Status>,
}

impl CompletionHandle {
    pub(crate) fn new(receiver: oneshot::Receiver<Status>) -> Self {
        Self { receiver }
    }

    /// Блокирующее ожидание. Внутри async runtime используйте `.await`:
    /// tokio запрещает блокирующий приём в контексте runtime.
    pub fn wait(self) -> Result<Status, HandleError> {
        self.receiver.blocking_recv().map_err(|_| HandleError::Dropped)
    }

    /// `None`, пока завершение ещё не доставлено
    pub fn try_status(&mut self) -> Option<Result<Status, HandleError>> {
        match self.receiver.try_recv() {
            Ok(status) => Some(Ok(status)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(HandleError::Dropped)),
        }
    }

    pub async fn await_timeout(self, timeout: Duration) -> Result<Status, HandleError> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(_)) => Err(HandleError::Dropped),
            Err(_) => Err(HandleError::Timeout),
        }
    }
}

impl Future for CompletionHandle {
    type Output = Result<Status, HandleError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.map_err(|_| HandleError::Dropped)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Ждёт все handles; результаты в порядке завершения
pub async fn wait_all(handles: Vec<CompletionHandle>) -> Vec<Result<Status, HandleError>> {
    if handles.is_empty() {
        return Vec::new();
    }

    let len = handles.len();
    let mut futures = FuturesUnordered::from_iter(handles);
    let mut results = Vec::with_capacity(len);

    while let Some(result) = futures.next().await {
        results.push(result);
    }

    results
}
