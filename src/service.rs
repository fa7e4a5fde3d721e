use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

use crate::record::{RequestRecord, ResponseRecord};

pub type ServiceFuture<'a> = Pin<Box<dyn Future<Output = Result<ResponseRecord>> + 'a>>;

/// The remote completion service: create a response, then look it up by id.
pub trait CompletionService {
    fn create<'a>(&'a self, request: &'a RequestRecord) -> ServiceFuture<'a>;
    fn retrieve<'a>(&'a self, id: &'a str) -> ServiceFuture<'a>;
}
