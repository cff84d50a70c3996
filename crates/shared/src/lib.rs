//! Wire types shared by the relay backend and its clients.

pub mod protocol;
