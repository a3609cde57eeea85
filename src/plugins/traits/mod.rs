pub mod notifier;

pub use notifier::Notifier;
#[cfg(test)]
pub use notifier::MockNotifier;
