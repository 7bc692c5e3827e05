mod codec;
mod deletion;
mod notifications;
mod properties;
mod scenarios;
