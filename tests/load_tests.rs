#[cfg(test)]
mod tests {
    use slotpool::{
        errors::WorkError,
        model::{Completion, Status},
        pools::{MapWorkerPool, WorkerPool},
        work::WorkFn,
        Config,
    };
    use std::{
        sync::{
            atomic::{AtomicU64, AtomicUsize, Ordering},
            Arc, Mutex, Once,
        },
        thread,
        time::{Duration, Instant},
    };

    fn measure<F, T>(name: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let start = Instant::now();
        let result = f();
        println!("✓ {}: {:?}", name, start.elapsed());
        result
    }

    /// Глушит вывод паник только в потоках пула (`slotpool-*`); остальные
    /// уходят в прежний обработчик. Ставится один раз на процесс.
    fn quiet_pool_panics() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                let pool_thread = thread::current()
                    .name()
                    .is_some_and(|name| name.starts_with("slotpool-"));
                if !pool_thread {
                    previous(info);
                }
            }));
        });
    }

    fn counting_pool(config: Config) -> (MapWorkerPool<u64, u64>, Arc<AtomicUsize>, Arc<AtomicU64>) {
        let delivered = Arc::new(AtomicUsize::new(0));
        let sum = Arc::new(AtomicU64::new(0));
        let (d, s) = (delivered.clone(), sum.clone());
        let pool = MapWorkerPool::with_config(config, move |_, c: Completion<u64, u64>| {
            if let Some(out) = c.output {
                s.fetch_add(out, Ordering::Relaxed);
            }
            d.fetch_add(1, Ordering::Relaxed);
        });
        (pool, delivered, sum)
    }

    #[test]
    fn load_test_1_small_fast_jobs() {
        println!("\n=== LOAD TEST 1: 100k мгновенных заданий ===");
        let (pool, delivered, sum) = counting_pool(Config::cpu_bound());
        let work = WorkFn::new(|x: &u64| Ok(*x));

        measure("100k jobs", || {
            pool.submit_each(&work, 0..100_000u64).unwrap();
            pool.join();
        });

        assert_eq!(delivered.load(Ordering::Relaxed), 100_000);
        assert_eq!(sum.load(Ordering::Relaxed), (0..100_000u64).sum::<u64>());
        let metrics = pool.metrics();
        println!("  Успешно: {}/{}", metrics.completed, metrics.submitted);
    }

    #[test]
    fn load_test_2_blocking_jobs_with_limit() {
        println!("\n=== LOAD TEST 2: 1k блокирующих заданий, лимит очереди 16 ===");
        let (pool, delivered, _) = counting_pool(Config::new(8, 16, false));
        let work = WorkFn::new(|x: &u64| {
            thread::sleep(Duration::from_millis(2));
            Ok(x * x)
        });

        measure("1k blocking jobs", || {
            pool.submit_each(&work, 0..1_000u64).unwrap();
            pool.join();
        });

        assert_eq!(delivered.load(Ordering::Relaxed), 1_000);
        assert!(!pool.has_work());
    }

    #[test]
    fn load_test_3_many_producers_serial_delivery() {
        println!("\n=== LOAD TEST 3: 8 продюсеров, последовательная доставка ===");
        let (pool, delivered, sum) = counting_pool(Config::new(4, 64, true));
        let pool = Arc::new(pool);
        let work = WorkFn::new(|x: &u64| Ok(x + 1));

        measure("8 x 5k jobs", || {
            let producers: Vec<_> = (0..8u64)
                .map(|p| {
                    let pool = pool.clone();
                    let work = work.clone();
                    thread::spawn(move || {
                        for i in 0..5_000u64 {
                            pool.submit(work.clone(), p * 5_000 + i);
                        }
                    })
                })
                .collect();
            for producer in producers {
                producer.join().unwrap();
            }
            pool.join();
        });

        assert_eq!(delivered.load(Ordering::Relaxed), 40_000);
        assert_eq!(sum.load(Ordering::Relaxed), (1..=40_000u64).sum::<u64>());
        let metrics = pool.metrics();
        println!("  Утилизация на финише: {:.1}%", metrics.utilization() * 100.0);
    }

    #[test]
    fn load_test_4_stress_with_panics() {
        println!("\n=== LOAD TEST 4: Стресс-тест с паниками ===");

        quiet_pool_panics();

        let statuses = Arc::new(Mutex::new((0usize, 0usize)));
        let sink = statuses.clone();
        let pool: WorkerPool<u32> = WorkerPool::start(8, 500, move |_, c: Completion<u32, ()>| {
            let mut counts = sink.lock().unwrap();
            match c.status {
                Status::Ok => counts.0 += 1,
                Status::Failed(WorkError::Panic(_)) => counts.1 += 1,
                Status::Failed(_) => {}
            }
        }, false);

        let work = WorkFn::new(|x: &u32| {
            if x % 10 == 0 {
                panic!("Intentional panic at {}", x);
            }
            thread::sleep(Duration::from_micros(100));
            Ok(())
        });
        measure("1k jobs (10% panic)", || {
            pool.submit_each(&work, 0..1_000).unwrap();
            pool.join();
        });

        let (ok, panicked) = *statuses.lock().unwrap();
        println!("  Успешно: {}", ok);
        println!("  Паник перехвачено: {}", panicked);
        println!("  Pool success rate: {:.1}%", pool.metrics().success_rate() * 100.0);

        assert_eq!(ok, 900);
        assert_eq!(panicked, 100);
        assert_eq!(pool.metrics().workers, 8);
    }

    #[test]
    fn load_test_5_repeated_lifecycles() {
        println!("\n=== LOAD TEST 5: 50 циклов start/stop ===");
        measure("50 lifecycles", || {
            for round in 0..50u64 {
                let (pool, delivered, _) = counting_pool(Config::new(4, 8, round % 2 == 0));
                pool.submit_each(&WorkFn::new(|x: &u64| Ok(*x)), 0..200u64).unwrap();
                pool.stop();
                assert_eq!(delivered.load(Ordering::Relaxed), 200);
            }
        });
    }
}
