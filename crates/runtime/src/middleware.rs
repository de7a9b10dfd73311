//! Middleware composition for the server dispatch path.
//!
//! Each event may register an ordered list of interceptors around its
//! terminal handler. The chain is folded right-to-left, so the
//! first-registered middleware is outermost: it sees the request first and
//! the response last. A middleware receives the request and the next link,
//! and may forward, transform the result, call the next link more than
//! once, or bypass it entirely.

use crate::error::Result;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Terminal or composed handler for one event: request payload in,
/// response payload out.
pub type HandlerFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// One interceptor link: receives the request and the next handler in the
/// chain.
pub type Middleware =
    Arc<dyn Fn(Value, HandlerFn) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Lifts a plain async closure into a [`HandlerFn`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |value| Box::pin(f(value)))
}

/// Lifts a plain async closure into a [`Middleware`].
pub fn middleware_fn<F, Fut>(f: F) -> Middleware
where
    F: Fn(Value, HandlerFn) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |value, next| Box::pin(f(value, next)))
}

/// Folds the chain right-to-left around the terminal handler, producing the
/// effective handler for one dispatch.
pub fn compose(chain: &[Middleware], terminal: HandlerFn) -> HandlerFn {
    chain.iter().rev().fold(terminal, |next, mw| {
        let mw = Arc::clone(mw);
        Arc::new(move |value| mw(value, Arc::clone(&next)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tagging(tag: &'static str) -> Middleware {
        middleware_fn(move |value, next: HandlerFn| async move {
            let seen = format!("{}>{tag}", value.as_str().unwrap_or_default());
            let out = next(json!(seen)).await?;
            Ok(json!(format!("{}<{tag}", out.as_str().unwrap_or_default())))
        })
    }

    #[tokio::test]
    async fn first_registered_is_outermost() {
        let terminal = handler_fn(|value| async move {
            Ok(json!(format!("[{}]", value.as_str().unwrap_or_default())))
        });
        let effective = compose(&[tagging("a"), tagging("b")], terminal);
        let out = effective(json!("req")).await.unwrap();
        // `a` observes the request before `b`, and the response after `b`.
        assert_eq!(out, json!("[req>a>b]<b<a"));
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let terminal = handler_fn(|_| async move { panic!("terminal must not run") });
        let bypass = middleware_fn(|_, _next| async move { Ok(json!("cached")) });
        let effective = compose(&[bypass], terminal);
        assert_eq!(effective(json!("req")).await.unwrap(), json!("cached"));
    }

    #[tokio::test]
    async fn empty_chain_is_the_terminal() {
        let terminal = handler_fn(|value| async move { Ok(value) });
        let effective = compose(&[], terminal);
        assert_eq!(effective(json!(42)).await.unwrap(), json!(42));
    }
}
