use std::io;

use may_minihttp::{HttpService, Request, Response};
use tracing::error;

use super::request::RawRequest;
use super::response::ResponseSink;
use crate::pipeline::Pipeline;
use crate::reply::ReplyOutcome;

/// `may_minihttp` service running every request through the [`Pipeline`].
#[derive(Clone, Debug)]
pub struct AppService {
    pub pipeline: Pipeline,
}

impl AppService {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let raw = RawRequest::from_request(req)?;
        let mut sink = ResponseSink::new(res);
        match self.pipeline.process(&raw, &mut sink) {
            ReplyOutcome::Queued { .. } => Ok(()),
            ReplyOutcome::Dropped => {
                // closing the connection is the only way to send nothing
                error!(method = %raw.method, target = %raw.target, "Reply dropped, closing connection");
                Err(io::Error::new(io::ErrorKind::Other, "reply dropped"))
            }
        }
    }
}
