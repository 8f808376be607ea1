//! The update-and-broadcast engine.
//!
//! A fixed-interval scheduler drives one update cycle at a time over the
//! store: apply the mutation policy to every stock, persist each change,
//! broadcast it. A tick that fires while a cycle is still running is
//! dropped entirely - no queueing, no catch-up.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::broadcast::{Broadcaster, UPDATE_EVENT};
use crate::config::TickerConfig;
use crate::core::{Result, Stock, Symbol};
use crate::policy::{Mutation, MutationPolicy, ThreadRngSource, UniformSource};
use crate::store::StockStore;

/// What happened when a tick fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Full pass over the store; `changed` stocks were mutated and broadcast.
    Completed { changed: usize },
    /// A cycle was already in progress; this tick was dropped.
    Skipped,
}

/// The ticker engine. Explicitly constructed and handed to whoever needs
/// it - there is no process-wide instance.
pub struct StockTicker {
    store: StockStore,
    policy: MutationPolicy,
    broadcaster: Arc<dyn Broadcaster>,
    tick_interval: Duration,
    // Reentrancy guard: the lock serializes cycles, the flag gives
    // concurrent callers a lock-free fast path to skip on.
    cycle_lock: Mutex<()>,
    updating: AtomicBool,
}

impl StockTicker {
    /// Validate the config and seed the store.
    pub fn new(config: &TickerConfig, broadcaster: Arc<dyn Broadcaster>) -> Result<Self> {
        config.validate()?;

        let seed = config
            .stocks
            .iter()
            .map(|s| Stock::new(Symbol::new(&s.symbol), s.price));

        Ok(Self {
            store: StockStore::new(seed),
            policy: MutationPolicy::new(
                config.update_probability,
                config.range_percent,
                config.sign_bias,
            ),
            broadcaster,
            tick_interval: config.tick_interval(),
            cycle_lock: Mutex::new(()),
            updating: AtomicBool::new(false),
        })
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Snapshot query: the full current instrument set. Idempotent, safe to
    /// call while a cycle is in progress.
    pub fn get_all_stocks(&self) -> Vec<Stock> {
        self.store.get_all()
    }

    pub fn get_stock(&self, symbol: &Symbol) -> Result<Stock> {
        self.store.get(symbol)
    }

    /// Run one update cycle, or skip if one is already in progress.
    ///
    /// The guard is held for the whole pass, so a long pass delays nothing -
    /// the next tick simply lands on `Skipped`. One stock's broadcast
    /// failure never stops the rest of the cycle.
    pub fn update_stock_prices(&self, rng: &mut dyn UniformSource) -> CycleOutcome {
        if self.updating.load(Ordering::Acquire) {
            return CycleOutcome::Skipped;
        }
        let Some(_guard) = self.cycle_lock.try_lock() else {
            return CycleOutcome::Skipped;
        };
        self.updating.store(true, Ordering::Release);

        let mut changed = 0;
        for symbol in self.store.symbols() {
            match self.try_update_stock(&symbol, rng) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "stock update failed, continuing cycle");
                }
            }
        }

        self.updating.store(false, Ordering::Release);
        CycleOutcome::Completed { changed }
    }

    /// Mutate one stock if the policy says so; returns whether it changed.
    fn try_update_stock(&self, symbol: &Symbol, rng: &mut dyn UniformSource) -> Result<bool> {
        let stock = self.store.get(symbol)?;

        let Mutation::Changed { delta } = self.policy.decide(stock.price, rng) else {
            return Ok(false);
        };

        // Hardened floor: a long run of negative deltas never takes the
        // price below zero.
        let new_price = (stock.price + delta).max(Decimal::ZERO);
        let updated = self.store.set_price(symbol, new_price)?;

        if let Err(e) = self.broadcaster.broadcast(UPDATE_EVENT, &updated) {
            warn!(symbol = %symbol, error = %e, "broadcast failed, continuing cycle");
        }
        Ok(true)
    }

    /// Drive update cycles at the configured interval until shutdown.
    /// An in-flight cycle always finishes; the signal only stops the timer.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        // First tick one full interval after startup, then steady cadence.
        let start = tokio::time::Instant::now() + self.tick_interval;
        let mut interval = tokio::time::interval_at(start, self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut rng = ThreadRngSource;

        info!(
            stocks = self.store.len(),
            interval_ms = self.tick_interval.as_millis() as u64,
            "ticker running"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.update_stock_prices(&mut rng) == CycleOutcome::Skipped {
                        debug!("tick dropped, previous cycle still in progress");
                    }
                }
                _ = shutdown.changed() => {
                    info!("ticker stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ChannelBroadcaster;
    use crate::config::SeedStock;
    use crate::core::Error;
    use rust_decimal_macros::dec;
    use std::sync::Barrier;

    struct Scripted {
        draws: Vec<f64>,
        next: usize,
    }

    impl Scripted {
        fn new(draws: &[f64]) -> Self {
            Self {
                draws: draws.to_vec(),
                next: 0,
            }
        }
    }

    impl UniformSource for Scripted {
        fn draw(&mut self) -> f64 {
            let value = self.draws[self.next % self.draws.len()];
            self.next += 1;
            value
        }
    }

    /// Records every (event, stock) pair it is asked to deliver.
    #[derive(Default)]
    struct Recording {
        events: parking_lot::Mutex<Vec<(String, Stock)>>,
    }

    impl Broadcaster for Recording {
        fn broadcast(&self, event: &str, stock: &Stock) -> Result<()> {
            self.events.lock().push((event.to_string(), stock.clone()));
            Ok(())
        }
    }

    /// Fails every delivery.
    struct Failing;

    impl Broadcaster for Failing {
        fn broadcast(&self, _event: &str, _stock: &Stock) -> Result<()> {
            Err(Error::Broadcast("subscriber hung up".into()))
        }
    }

    /// Blocks inside the first broadcast until released, so a test can
    /// observe an in-progress cycle from another thread.
    struct Blocking {
        rendezvous: Arc<Barrier>,
    }

    impl Broadcaster for Blocking {
        fn broadcast(&self, _event: &str, _stock: &Stock) -> Result<()> {
            self.rendezvous.wait(); // cycle is now observably in progress
            self.rendezvous.wait(); // held here until the test releases us
            Ok(())
        }
    }

    fn config_with(stocks: Vec<SeedStock>) -> TickerConfig {
        TickerConfig {
            stocks,
            ..Default::default()
        }
    }

    fn three_stock_config() -> TickerConfig {
        config_with(vec![
            SeedStock {
                symbol: "MSFT".to_string(),
                price: dec!(30.31),
            },
            SeedStock {
                symbol: "APPL".to_string(),
                price: dec!(578.18),
            },
            SeedStock {
                symbol: "GOOG".to_string(),
                price: dec!(570.30),
            },
        ])
    }

    #[test]
    fn snapshot_before_first_tick_is_the_seed_set() {
        let ticker =
            StockTicker::new(&three_stock_config(), Arc::new(Recording::default())).unwrap();
        let mut all = ticker.get_all_stocks();
        all.sort_by(|a, b| a.symbol.as_str().cmp(b.symbol.as_str()));
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].price, dec!(578.18));
        assert_eq!(all[1].price, dec!(570.30));
        assert_eq!(all[2].price, dec!(30.31));
        assert!(all.iter().all(|s| s.last_change == Decimal::ZERO));
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let config = TickerConfig {
            update_probability: 2.0,
            ..Default::default()
        };
        let result = StockTicker::new(&config, Arc::new(Recording::default()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn forced_tick_mutates_all_with_exact_deltas() {
        // Each stock consumes (0.05, 0.5, 0.6): pass the skip draw, move by
        // round(price * 0.001, 2), positive sign.
        let recorder = Arc::new(Recording::default());
        let ticker = StockTicker::new(&three_stock_config(), recorder.clone()).unwrap();

        let outcome = ticker.update_stock_prices(&mut Scripted::new(&[0.05, 0.5, 0.6]));
        assert_eq!(outcome, CycleOutcome::Completed { changed: 3 });

        assert_eq!(
            ticker.get_stock(&Symbol::new("MSFT")).unwrap().price,
            dec!(30.34)
        );
        assert_eq!(
            ticker.get_stock(&Symbol::new("APPL")).unwrap().price,
            dec!(578.76)
        );
        assert_eq!(
            ticker.get_stock(&Symbol::new("GOOG")).unwrap().price,
            dec!(570.87)
        );

        let events = recorder.events.lock();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|(name, _)| name == UPDATE_EVENT));
    }

    #[test]
    fn forced_tick_stays_within_range_and_broadcasts_only_changes() {
        let recorder = Arc::new(Recording::default());
        let ticker = StockTicker::new(&three_stock_config(), recorder.clone()).unwrap();
        let before: Vec<Stock> = ticker.get_all_stocks();

        let outcome = ticker.update_stock_prices(&mut ThreadRngSource);
        let CycleOutcome::Completed { changed } = outcome else {
            panic!("nothing else was running, cycle must complete");
        };

        let events = recorder.events.lock();
        assert_eq!(events.len(), changed);

        for prior in &before {
            let now = ticker.get_stock(&prior.symbol).unwrap();
            let bound = (prior.price * dec!(0.002)).round_dp(2);
            assert!((now.price - prior.price).abs() <= bound);

            // Every stock whose price moved was broadcast; the count check
            // above rules out broadcasts for anything the policy skipped.
            if now.price != prior.price {
                assert!(events.iter().any(|(_, s)| s.symbol == prior.symbol));
            }
        }
    }

    #[test]
    fn skip_draws_change_nothing_and_broadcast_nothing() {
        let recorder = Arc::new(Recording::default());
        let ticker = StockTicker::new(&three_stock_config(), recorder.clone()).unwrap();

        let outcome = ticker.update_stock_prices(&mut Scripted::new(&[0.9]));
        assert_eq!(outcome, CycleOutcome::Completed { changed: 0 });
        assert!(recorder.events.lock().is_empty());
        assert_eq!(
            ticker.get_stock(&Symbol::new("MSFT")).unwrap().price,
            dec!(30.31)
        );
    }

    #[test]
    fn empty_store_cycle_is_a_noop() {
        let ticker =
            StockTicker::new(&config_with(vec![]), Arc::new(Recording::default())).unwrap();
        let outcome = ticker.update_stock_prices(&mut ThreadRngSource);
        assert_eq!(outcome, CycleOutcome::Completed { changed: 0 });
        assert!(ticker.get_all_stocks().is_empty());
    }

    #[test]
    fn broadcast_failure_does_not_abort_the_cycle() {
        let ticker = StockTicker::new(&three_stock_config(), Arc::new(Failing)).unwrap();

        // All three stocks still mutate even though every delivery fails.
        let outcome = ticker.update_stock_prices(&mut Scripted::new(&[0.05, 0.5, 0.6]));
        assert_eq!(outcome, CycleOutcome::Completed { changed: 3 });
        assert_eq!(
            ticker.get_stock(&Symbol::new("MSFT")).unwrap().price,
            dec!(30.34)
        );
    }

    #[test]
    fn overlapping_tick_is_skipped_not_queued() {
        let rendezvous = Arc::new(Barrier::new(2));
        let blocking = Arc::new(Blocking {
            rendezvous: rendezvous.clone(),
        });
        // Single stock so the blocking broadcaster fires exactly once.
        let config = config_with(vec![SeedStock {
            symbol: "MSFT".to_string(),
            price: dec!(30.31),
        }]);
        let ticker = Arc::new(StockTicker::new(&config, blocking).unwrap());

        let inner = ticker.clone();
        let slow_cycle = std::thread::spawn(move || {
            inner.update_stock_prices(&mut Scripted::new(&[0.05, 0.5, 0.6]))
        });

        // First rendezvous: the slow cycle is now inside its broadcast.
        rendezvous.wait();
        let outcome = ticker.update_stock_prices(&mut Scripted::new(&[0.05, 0.5, 0.6]));
        assert_eq!(outcome, CycleOutcome::Skipped);

        // Release the slow cycle and confirm it completed normally.
        rendezvous.wait();
        let slow_outcome = slow_cycle.join().unwrap();
        assert_eq!(slow_outcome, CycleOutcome::Completed { changed: 1 });

        // The guard is free again afterward.
        let outcome = ticker.update_stock_prices(&mut Scripted::new(&[0.9]));
        assert_eq!(outcome, CycleOutcome::Completed { changed: 0 });
    }

    #[test]
    fn price_is_clamped_at_zero() {
        let config = TickerConfig {
            range_percent: 1.0, // moves up to 100% of price per tick
            sign_bias: 1.0,     // sign draw can never exceed 1.0, always negative
            stocks: vec![SeedStock {
                symbol: "PENNY".to_string(),
                price: dec!(0.01),
            }],
            ..Default::default()
        };
        let ticker = StockTicker::new(&config, Arc::new(Recording::default())).unwrap();

        // Full-magnitude negative move: 0.01 - round(0.01 * ~1.0, 2) wants
        // to go below zero and must clamp.
        for _ in 0..5 {
            ticker.update_stock_prices(&mut Scripted::new(&[0.05, 0.999_999, 0.5]));
        }
        let price = ticker.get_stock(&Symbol::new("PENNY")).unwrap().price;
        assert!(price >= Decimal::ZERO);
    }

    #[tokio::test]
    async fn run_loop_stops_on_shutdown_signal() {
        let hub = ChannelBroadcaster::new(16);
        let config = TickerConfig {
            tick_interval_ms: 10,
            ..three_stock_config()
        };
        let ticker = Arc::new(StockTicker::new(&config, Arc::new(hub)).unwrap());

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(ticker.clone().run(rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        // Prices stayed within the per-tick envelope on every observed tick,
        // so after several ticks they are still positive and finite.
        for stock in ticker.get_all_stocks() {
            assert!(stock.price > Decimal::ZERO);
        }
    }
}
