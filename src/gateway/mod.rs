pub mod command;
pub mod event;

pub use command::{CommandError, CommandGateway};
pub use event::{EventGateway, EventPublisher, Subscription};
