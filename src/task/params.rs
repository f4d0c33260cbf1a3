//! Task parameters and parameter mappers.
//!
//! Any `Clone + Send + Sync + 'static` value can parameterize a task builder.
//! Capabilities are expressed as traits (see
//! [`HasServerConfiguration`](crate::resource::HasServerConfiguration)); a
//! builder written against `P: SomeCapability` is reusable under every
//! composite whose parameters provide that capability, and the compiler
//! rejects wiring where they do not.

use anyhow::Result;
use std::marker::PhantomData;
use std::sync::Arc;

/// Marker for values that parameterize a task builder
pub trait TaskParameters: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> TaskParameters for T {}

/// Parameters of tasks that need none
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoParameters;

/// Converts one parent parameter object into zero or more child parameter objects
pub trait Mapper<P, Q>: Send + Sync {
    fn map(&self, params: &P) -> Result<Vec<Q>>;
}

impl<P, Q, F> Mapper<P, Q> for F
where
    F: Fn(&P) -> Result<Vec<Q>> + Send + Sync,
{
    fn map(&self, params: &P) -> Result<Vec<Q>> {
        self(params)
    }
}

/// One-to-one projection of the parent parameters
pub fn project<P, Q, F>(projection: F) -> impl Mapper<P, Q>
where
    F: Fn(&P) -> Q + Send + Sync,
{
    move |params: &P| Ok(vec![projection(params)])
}

/// Applies `second` to every output of `first`
pub fn chain<P, Q, R>(
    first: impl Mapper<P, Q> + 'static,
    second: impl Mapper<Q, R> + 'static,
) -> impl Mapper<P, R> {
    Chained {
        first: Arc::new(first),
        second: Arc::new(second),
        _marker: PhantomData,
    }
}

struct Chained<P, Q, R> {
    first: Arc<dyn Mapper<P, Q>>,
    second: Arc<dyn Mapper<Q, R>>,
    _marker: PhantomData<fn(&P) -> R>,
}

impl<P, Q, R> Mapper<P, R> for Chained<P, Q, R> {
    fn map(&self, params: &P) -> Result<Vec<R>> {
        let mut mapped = Vec::new();
        for intermediate in self.first.map(params)? {
            mapped.extend(self.second.map(&intermediate)?);
        }
        Ok(mapped)
    }
}
