use std::future::Future;
use iced_futures::{Executor, MaybeSend};
use tokio::runtime::{Builder, Runtime};

/// Runs the iced commands and subscriptions on a multi threaded tokio runtime, which btleplug
/// requires for its background tasks.
pub struct AppExecutor(Runtime);

impl Executor for AppExecutor {
    fn new() -> Result<Self, futures::io::Error> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .thread_name("ble-monitor-worker")
            .build()?;

        Ok(AppExecutor(runtime))
    }

    fn spawn(&self, future: impl Future<Output = ()> + MaybeSend + 'static) {
        let _ = self.0.spawn(future);
    }

    fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.0.enter();
        f()
    }
}
