//! Пул воркеров фиксированного размера с доставкой результатов через callback
//!
//! # Features
//! - Один выделенный поток ОС на слот, задания передаются слоту напрямую
//! - Lock-free очередь ожидающих заданий и пул свободных слотов
//! - Мягкий лимит очереди (backpressure без отказов)
//! - Последовательная доставка callback'ов в порядке завершения
//! - Фоновое согласование "задание в очереди / свободный слот"
//! - Изоляция ошибок и паник заданий и callback'ов
//! - Упорядоченная остановка через `PoisonPill`
//!
//! ```no_run
//! use slotpool::{MapWorkerPool, WorkFn};
//!
//! let double = WorkFn::new(|x: &u64| Ok(x * 2));
//! let mut out = MapWorkerPool::<u64, u64>::process_collection(double, 4, vec![1, 2, 3, 4, 5]);
//! out.sort();
//! assert_eq!(out, vec![2, 4, 6, 8, 10]);
//! ```

mod channel;
pub mod config;
pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod pools;
mod queue;
mod slot;
mod sweeper;
pub mod work;

pub use config::Config;
pub use errors::{HandleError, PoolError, WorkError};
pub use handle::{wait_all, CompletionHandle};
pub use model::{Completion, PoolMetrics, SlotState, Status};
pub use pool::{Callback, Dispatcher, Submitter};
pub use pools::{MapWorkerPool, TaskPool, WorkerPool};
pub use work::WorkFn;
