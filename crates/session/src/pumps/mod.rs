//! Read and write pumps backing [`crate::ws_client::WsRemote`].

pub(crate) mod read;
pub(crate) mod write;
