pub mod connection;
pub mod dispatcher;
pub mod engagement;
pub mod fanout;
pub mod messaging;
