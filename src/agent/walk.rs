//! View-filtered walk as an async stream.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::error::{Error, Result};
use crate::handler::{Principal, RequestContext};
use crate::oid::Oid;
use crate::pdu::PduType;
use crate::varbind::VarBind;

use super::dispatch::Dispatcher;

type PendingNext = Pin<Box<dyn Future<Output = Result<Option<VarBind>>> + Send>>;

/// Stream of every binding under a root OID that a principal may read.
///
/// Created by [`Dispatcher::walk`]. Each step is one GETNEXT against the
/// current store snapshot, so objects registered mid-walk show up if they
/// sort after the cursor. The stream ends at the first OID outside the root
/// or at the end of the view. An access failure is yielded once and ends
/// the stream.
pub struct Walk {
    dispatcher: Arc<Dispatcher>,
    ctx: Arc<RequestContext>,
    root: Oid,
    cursor: Oid,
    done: bool,
    pending: Option<PendingNext>,
}

impl Walk {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, principal: Principal, root: Oid) -> Self {
        Self {
            dispatcher,
            ctx: Arc::new(RequestContext::new(principal, 0, PduType::GetNextRequest)),
            cursor: root.clone(),
            root,
            done: false,
            pending: None,
        }
    }
}

impl Stream for Walk {
    type Item = Result<VarBind>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        let this = &mut *self;
        let pending = this.pending.get_or_insert_with(|| {
            let dispatcher = Arc::clone(&this.dispatcher);
            let ctx = Arc::clone(&this.ctx);
            let root = this.root.clone();
            let cursor = this.cursor.clone();
            let next: PendingNext = Box::pin(async move {
                dispatcher.next_for(&ctx, &root, &cursor).await.map_err(Error::from)
            });
            next
        });

        let result = match pending.as_mut().poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };
        this.pending = None;

        match result {
            Ok(Some(vb)) if vb.oid.starts_with(&this.root) => {
                this.cursor = vb.oid.clone();
                Poll::Ready(Some(Ok(vb)))
            }
            Ok(_) => {
                this.done = true;
                Poll::Ready(None)
            }
            Err(e) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::bootstrap;
    use crate::agent::store::ManagedObjectStore;
    use crate::handler::ManagedObjectFactory;
    use crate::oid;
    use crate::version::Version;

    async fn collect(mut walk: Walk) -> Vec<Result<VarBind>> {
        let mut out = Vec::new();
        while let Some(item) = std::future::poll_fn(|cx| Pin::new(&mut walk).poll_next(cx)).await {
            out.push(item);
        }
        out
    }

    fn dispatcher() -> Arc<Dispatcher> {
        let store = Arc::new(ManagedObjectStore::new());
        bootstrap::register_managed_objects(&store).unwrap();
        // Registered but outside systemview
        store
            .register(ManagedObjectFactory::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), "agent"), b"")
            .unwrap();
        Arc::new(Dispatcher::new(
            store,
            Arc::new(bootstrap::community_table()),
            Arc::new(bootstrap::vacm()),
        ))
    }

    #[tokio::test]
    async fn test_walk_yields_visible_subtree() {
        let d = dispatcher();
        let principal = Principal::community(Version::V2c, "notConfigUser", "");
        let items = collect(d.walk(principal, oid!(1, 3, 6, 1))).await;

        let oids: Vec<String> = items
            .into_iter()
            .map(|r| r.unwrap().oid.to_string())
            .collect();
        assert_eq!(
            oids,
            ["1.3.6.1.4.1.21703.7500.3.1.8.0", "1.3.6.1.4.1.21703.7500.3.2.10.0"]
        );
    }

    #[tokio::test]
    async fn test_walk_stops_at_root_boundary() {
        let d = dispatcher();
        let principal = Principal::community(Version::V1, "notConfigUser", "");
        let items = collect(d.walk(principal, oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1))).await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_walk_outside_view_ends_immediately() {
        let d = dispatcher();
        let principal = Principal::community(Version::V2c, "notConfigUser", "");
        // The system group holds a registered object the view never admits
        let items = collect(d.walk(principal, oid!(1, 3, 6, 1, 2, 1, 1))).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_walk_reports_access_failure_once() {
        let d = dispatcher();
        let principal = Principal::community(Version::V2c, "stranger", "");
        let items = collect(d.walk(principal, oid!(1, 3, 6, 1))).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::Access(_))));
    }
}
