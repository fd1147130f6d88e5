use std::cell::RefCell;
use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::Fetch;
use crate::error::{ExtractError, Result};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub body: Option<String>,
}

/// Replays canned response bodies in order and records what was asked for.
pub struct MockFetch {
    responses: RefCell<VecDeque<Vec<u8>>>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl MockFetch {
    pub fn new(pages: Vec<Value>) -> Self {
        Self::from_bodies(pages.iter().map(|page| page.to_string().into_bytes()).collect())
    }

    pub fn from_bodies(bodies: Vec<Vec<u8>>) -> Self {
        Self {
            responses: RefCell::new(bodies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

#[async_trait(?Send)]
impl Fetch for MockFetch {
    async fn fetch(&self, url: &str, body: Option<&[u8]>) -> Result<Vec<u8>> {
        self.requests.borrow_mut().push(RecordedRequest {
            url: url.to_string(),
            body: body.map(|b| String::from_utf8_lossy(b).into_owned()),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ExtractError::HttpError(format!("no canned response for {}", url)))
    }
}
