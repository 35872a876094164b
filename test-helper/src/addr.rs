use std::net::{SocketAddr, TcpListener};

/// Gets a loopback socket address with a port freshly allocated by the OS.
pub fn get_unused_addr() -> SocketAddr {
    let socket = TcpListener::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap()
}

/// The HTTP base URL for a stub server listening on the given address.
pub fn http_base_url(addr: SocketAddr) -> String {
    format!("http://{addr}")
}
