/// See `async_trait_maybe_send`
#[cfg(not(target_family = "wasm"))]
#[macro_export]
macro_rules! maybe_add_send_sync {
    ($($tt:tt)*) => {
        $($tt)* + Send + Sync
    };
}

/// See `async_trait_maybe_send`
#[cfg(target_family = "wasm")]
#[macro_export]
macro_rules! maybe_add_send_sync {
    ($($tt:tt)*) => {
        $($tt)*
    };
}

/// IndexedDB handles are `!Send`, so storage traits only require `Send` futures off wasm.
#[macro_export]
macro_rules! async_trait_maybe_send {
    ($($tt:tt)*) => {
        #[cfg_attr(not(target_family = "wasm"), ::async_trait::async_trait)]
        #[cfg_attr(target_family = "wasm", ::async_trait::async_trait(?Send))]
        $($tt)*
    };
}

#[cfg(target_family = "wasm")]
pub fn spawn<F>(name: &str, future: F)
where
    F: std::future::Future<Output = ()> + 'static,
{
    tracing::debug!("Spawning local task {}", name);
    wasm_bindgen_futures::spawn_local(future);
}
