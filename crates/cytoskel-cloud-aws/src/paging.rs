//! Lazy, fully draining pagination over continuation tokens

use crate::error::{AwsError, AwsResult};
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::future::Future;

/// One page of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token of the next page; `None` (or empty) on the last page
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: Option<String>) -> Self {
        Self { items, next }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

async fn fetch_page<T, F, Fut>(
    mut fetch: F,
    cursor: Cursor,
) -> AwsResult<Option<(Vec<T>, (F, Cursor))>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = AwsResult<Page<T>>>,
{
    let token = match cursor {
        Cursor::Done => return Ok(None),
        Cursor::Start => None,
        Cursor::Next(token) => Some(token),
    };

    let page = fetch(token).await?;
    let next = match page.next {
        Some(token) if !token.is_empty() => Cursor::Next(token),
        _ => Cursor::Done,
    };
    Ok(Some((page.items, (fetch, next))))
}

/// Stream every item of a paged listing
///
/// `fetch` receives the continuation token (`None` for the first page). Pages
/// are requested only as the stream is polled, and the stream ends after the
/// page without a continuation token.
pub fn paginate<'a, T, F, Fut>(fetch: F) -> BoxStream<'a, AwsResult<T>>
where
    T: Send + 'a,
    F: FnMut(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = AwsResult<Page<T>>> + Send + 'a,
{
    stream::try_unfold((fetch, Cursor::Start), |(fetch, cursor)| fetch_page(fetch, cursor))
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, AwsError>)))
        .try_flatten()
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pages(calls: Arc<AtomicUsize>) -> BoxStream<'static, AwsResult<u32>> {
        paginate(move |token: Option<String>| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(match token.as_deref() {
                    None => Page::new(vec![1, 2], Some("p2".into())),
                    Some("p2") => Page::new(vec![], Some("p3".into())),
                    Some("p3") => Page::new(vec![3], Some(String::new())),
                    Some(other) => panic!("unexpected token {other}"),
                })
            }
        })
    }

    #[tokio::test]
    async fn test_drains_every_page() {
        let calls = Arc::new(AtomicUsize::new(0));
        let items: Vec<u32> = pages(calls.clone()).try_collect().await.unwrap();

        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_pages_are_fetched_lazily() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = pages(calls.clone());

        assert_eq!(stream.next().await.unwrap().unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_ends_listing() {
        let mut stream = paginate(|token: Option<String>| async move {
            match token {
                None => Ok(Page::new(vec!["a"], Some("next".into()))),
                Some(_) => Err(AwsError::AccessDenied {
                    operation: "ListUsers".into(),
                    code: "AccessDenied".into(),
                    message: "denied".into(),
                }),
            }
        });

        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert!(stream.next().await.unwrap().unwrap_err().is_access_denied());
    }
}
