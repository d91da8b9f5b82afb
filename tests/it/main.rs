use std::future::Future;

mod bird;

mod async_verification;
mod call_matchers;
mod errors;
mod ordered;
mod verification;

trait AsyncTest {
    fn test(self);
}

impl<F: Future<Output = ()>> AsyncTest for F {
    #[track_caller]
    fn test(self) {
        let runtime = tokio_1::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(self)
    }
}
