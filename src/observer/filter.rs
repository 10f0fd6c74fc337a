//! Filter observer
//!
//! Decorator that only passes events matching a predicate to the observer
//! it wraps.

use crate::error::Result;
use crate::event::CommandEvent;
use super::Observer;

type Predicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// Forwards to `inner` only when `predicate` holds
///
/// The predicate is checked separately for begin and complete, so it may
/// look at outcome fields (error, duration) that only exist on completion.
pub struct FilterObserver<E> {
    name: String,
    inner: Box<dyn Observer<E>>,
    predicate: Predicate<E>,
}

impl<E> FilterObserver<E> {
    pub fn new<O, P>(inner: O, predicate: P) -> Self
    where
        O: Observer<E> + 'static,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let inner: Box<dyn Observer<E>> = Box::new(inner);
        Self {
            name: format!("Filter({})", inner.name()),
            inner,
            predicate: Box::new(predicate),
        }
    }
}

impl<E> Observer<E> for FilterObserver<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_begin(&self, event: &E) -> Result<()> {
        if (self.predicate)(event) {
            self.inner.on_begin(event)?;
        }
        Ok(())
    }

    fn on_complete(&self, event: &E) -> Result<()> {
        if (self.predicate)(event) {
            self.inner.on_complete(event)?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

/// Predicate matching commands by name (case-insensitive)
pub fn operations<I, S>(names: I) -> impl Fn(&CommandEvent) -> bool + Send + Sync + 'static
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<String> = names
        .into_iter()
        .map(|name| name.as_ref().to_ascii_uppercase())
        .collect();
    move |event: &CommandEvent| names.iter().any(|name| name == event.operation())
}
