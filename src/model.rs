use super::{
    errors::WorkError,
    work::WorkFn,
};


/// Итог выполнения одного задания
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    Failed(WorkError),
}

impl Status {
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        !self.is_ok()
    }

    pub fn error(&self) -> Option<&WorkError> {
        match self {
            Status::Ok => None,
            Status::Failed(err) => Some(err),
        }
    }
}


/// Запись о завершении. Создаётся один раз на задание и потребляется
/// ровно один раз callback'ом.
#[derive(Debug)]
pub struct Completion<A, B> {
    pub work: WorkFn<A, B>,
    pub status: Status,
    pub input: A,
    /// `None` при `Status::Failed`
    pub output: Option<B>,
}


/// Состояние слота. Слот всегда ровно в одном из них.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle = 0,
    Armed = 1,
    Executing = 2,
    Terminated = 3,
}

impl SlotState {
    #[inline]
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SlotState::Idle,
            1 => SlotState::Armed,
            2 => SlotState::Executing,
            _ => SlotState::Terminated,
        }
    }
}


#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub workers: usize,
    pub idle_workers: usize,
    pub executing: usize,
    pub queued: usize,
    pub awaiting_replay: usize,
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.workers == 0 {
            return 0.0;
        }
        self.executing as f64 / self.workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed + self.failed;
        if total == 0 {
            return 1.0;
        }
        self.completed as f64 / total as f64
    }

    /// Отправлено, но ещё не доставлено в callback
    pub fn outstanding(&self) -> usize {
        self.submitted.saturating_sub(self.completed + self.failed)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_ratios() {
        let m = PoolMetrics {
            workers: 4,
            idle_workers: 2,
            executing: 2,
            queued: 0,
            awaiting_replay: 0,
            submitted: 10,
            completed: 6,
            failed: 2,
        };
        assert_eq!(m.utilization(), 0.5);
        assert_eq!(m.success_rate(), 0.75);
        assert_eq!(m.outstanding(), 2);
    }

    #[test]
    fn status_accessors() {
        assert!(Status::Ok.is_ok());
        let failed = Status::Failed(WorkError::failed("x"));
        assert!(failed.is_failed());
        assert_eq!(failed.error(), Some(&WorkError::failed("x")));
    }
}
