//! UDP 输出传输
//!
//! 所有通道共用一个非阻塞套接字，每帧一个数据报。

use dlink_core::TransportError;
use dlink_mux::Transport;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
}

impl UdpTransport {
    pub fn new(socket: Arc<UdpSocket>, target: SocketAddr) -> Self {
        Self { socket, target }
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        match self.socket.try_send_to(frame, self.target) {
            Ok(written) if written == frame.len() => Ok(()),
            Ok(written) => Err(TransportError::ShortWrite {
                written,
                expected: frame.len(),
            }),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Err(TransportError::WouldBlock),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn destination(&self) -> String {
        format!("udp:{}", self.target)
    }
}
