#![allow(dead_code)]

pub mod test_server {
    use std::net::{SocketAddr, TcpListener};
    use std::sync::{Arc, Once};

    use ngsi_rest::backend::MemoryBackend;
    use ngsi_rest::config::BrokerConfig;
    use ngsi_rest::pipeline::Pipeline;
    use ngsi_rest::server::{AppService, HttpServer, ServerHandle};

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// Start a broker on a free local port.
    pub fn start_service(config: BrokerConfig, backend: Arc<MemoryBackend>) -> (ServerHandle, SocketAddr) {
        setup_may_runtime();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let pipeline = Pipeline::new(Arc::new(config), backend);
        let handle = HttpServer(AppService::new(pipeline)).start(addr).unwrap();
        handle.wait_ready().unwrap();
        (handle, addr)
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {:?}", e),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Status, headers and body of a raw HTTP/1.1 response.
    pub fn parse_parts(resp: &str) -> (u16, Vec<(String, String)>, String) {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut status = 0;
        let mut headers = Vec::new();
        for line in head.lines() {
            if line.starts_with("HTTP/1.1") {
                status = line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("0")
                    .parse()
                    .unwrap();
            } else if let Some((name, val)) = line.split_once(':') {
                headers.push((name.trim().to_string(), val.trim().to_string()));
            }
        }
        (status, headers, body.to_string())
    }

    pub fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub mod recorder {
    use ngsi_rest::reply::{OutgoingResponse, ReplySink};

    /// Sink that keeps every queued reply.
    #[derive(Default)]
    pub struct Recorder {
        pub replies: Vec<(u16, OutgoingResponse)>,
    }

    impl Recorder {
        pub fn only(&self) -> &(u16, OutgoingResponse) {
            assert_eq!(self.replies.len(), 1, "expected exactly one reply");
            &self.replies[0]
        }

        pub fn body_json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.only().1.body).unwrap()
        }
    }

    impl ReplySink for Recorder {
        fn queue(&mut self, status: u16, response: OutgoingResponse) {
            self.replies.push((status, response));
        }
    }
}
