use std::any::Any;
use thiserror::Error;


/// Ошибка выполнения одной единицы работы.
///
/// Никогда не выходит за границу слота: воркер превращает её в
/// `Status::Failed` и доставляет в callback как обычное завершение.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum WorkError {
    #[error("work failed: {0}")]
    Failed(String),
    #[error("work panicked: {0}")]
    Panic(String),
}

impl WorkError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Короткая стабильная метка для логов
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkError::Failed(_) => "work_failed",
            WorkError::Panic(_) => "work_panicked",
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::Panic(panic_message(&*payload))
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl From<String> for WorkError {
    fn from(msg: String) -> Self {
        Self::Failed(msg)
    }
}

impl From<&str> for WorkError {
    fn from(msg: &str) -> Self {
        Self::Failed(msg.to_string())
    }
}


/// Ошибки самого пула (нарушение предусловий, ресурсы ОС)
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("pool is stopped and no longer accepts work")]
    Stopped,
    #[error("failed to spawn pool thread: {0}")]
    Spawn(String),
    #[error("pool task failed to join: {0}")]
    Join(String),
}


/// Ошибки ожидания [`CompletionHandle`](crate::handle::CompletionHandle)
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum HandleError {
    #[error("completion was dropped before delivery")]
    Dropped,
    #[error("timed out waiting for completion")]
    Timeout,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_readable() {
        let err = WorkError::from_panic(Box::new("boom"));
        assert_eq!(err, WorkError::Panic("boom".into()));

        let err = WorkError::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err, WorkError::Panic("owned boom".into()));
        assert_eq!(err.as_label(), "work_panicked");
    }

    #[test]
    fn conversions() {
        let err: WorkError = "bad input".into();
        assert_eq!(err, WorkError::failed("bad input"));
        assert_eq!(err.to_string(), "work failed: bad input");
    }
}
