pub mod duration;
pub mod entitlements;
pub mod notifier;
pub mod telegram;
