pub mod blink;
pub mod ial;
pub mod keyboard;

pub use blink::BlinkAdapter;
pub use ial::{EventCallback, Ial, InputAdapter, SubscriptionId};
pub use keyboard::KeyboardAdapter;
