use std::{
    str::FromStr,
    time::Duration,
};


/// Конфигурация пула воркеров
#[derive(Debug, Clone)]
pub struct Config {
    /// Число слотов (потоков). `0` = `num_cpus::get()`
    pub workers: usize,
    /// Мягкий лимит очереди. `0` = без ограничения
    pub queue_limit: usize,
    /// Доставлять callback'и по одному из выделенного потока
    pub serial_callbacks: bool,
    /// Период фонового согласования очереди и простаивающих слотов
    pub sweep_interval: Duration,
    /// Шаг опроса при backpressure и ожидании в `join`
    pub poll_interval: Duration,
    /// Префикс имён потоков пула
    pub thread_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            queue_limit: 0,
            serial_callbacks: false,
            sweep_interval: Duration::from_millis(100),
            poll_interval: Duration::from_millis(1),
            thread_name: "slotpool".to_string(),
        }
    }
}

impl Config {
    pub fn new(workers: usize, queue_limit: usize, serial_callbacks: bool) -> Self {
        Self {
            workers,
            queue_limit,
            serial_callbacks,
            ..Default::default()
        }
    }

    pub fn cpu_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            workers: num_cpus,
            queue_limit: num_cpus * 10,
            ..Default::default()
        }
    }

    pub fn io_bound() -> Self {
        Self {
            workers: num_cpus::get() * 2, // Для I/O-bound задач
            queue_limit: 0,
            ..Default::default()
        }
    }

    /// Значения по умолчанию, переопределённые переменными `SLOTPOOL_*`
    pub fn from_env() -> Self {
        Self::default().env_overrides()
    }

    /// Поверх `self` применяет заданные переменные `SLOTPOOL_*`;
    /// незаданные или нечитаемые оставляют значение `self`
    pub fn env_overrides(self) -> Self {
        self.env_overrides_with_prefix("SLOTPOOL")
    }

    pub fn env_overrides_with_prefix(self, prefix: &str) -> Self {
        let key = |name: &str| format!("{prefix}_{name}");
        Self {
            workers: env_get(&key("WORKERS"), self.workers),
            queue_limit: env_get(&key("QUEUE_LIMIT"), self.queue_limit),
            serial_callbacks: env_get_bool(&key("SERIAL_CALLBACKS"), self.serial_callbacks),
            sweep_interval: Duration::from_millis(env_get(
                &key("SWEEP_MS"),
                self.sweep_interval.as_millis() as u64,
            )),
            poll_interval: Duration::from_millis(env_get(
                &key("POLL_MS"),
                self.poll_interval.as_millis() as u64,
            )),
            thread_name: env_get(&key("THREAD_NAME"), self.thread_name),
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn queue_limit(mut self, queue_limit: usize) -> Self {
        self.queue_limit = queue_limit;
        self
    }

    pub fn serial_callbacks(mut self, serial: bool) -> Self {
        self.serial_callbacks = serial;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Фактическое число слотов
    #[inline]
    pub fn resolved_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }

    /// Глубина очереди, до которой ждёт продюсер, упёршийся в лимит
    #[inline]
    pub fn resume_depth(&self) -> usize {
        (self.queue_limit / 2).max(1)
    }
}

fn env_get<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
