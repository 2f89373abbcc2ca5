pub mod lifecycle_dispatcher;

pub use lifecycle_dispatcher::LifecycleDispatcher;
