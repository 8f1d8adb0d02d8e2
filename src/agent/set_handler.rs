//! Two-phase SET (RFC 3416 Section 4.2.5).
//!
//! 1. **Test**: every binding is access-checked, located and validated by
//!    its object. The previous value is captured for undo. Nothing has been
//!    written yet, so any failure simply answers with its index.
//! 2. **Commit**: every binding is written in order. If one fails, the ones
//!    already written are undone in reverse order.
//!
//! A SET holds the dispatcher's lock exclusively from the start of phase 1
//! until phase 2 is over, so other SETs wait and reads never observe a
//! value that may still be undone. Phase 2 runs on its own task, taking
//! the guard with it, so a caller that gives up mid-commit cannot leave a
//! partial write behind.

use std::sync::Arc;

use crate::error::ErrorStatus;
use crate::handler::{ManagedObject, RequestContext, Response, SetResult};
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::value::Value;

use super::dispatch::Dispatcher;
use super::vacm::{AccessDenied, ViewType};

struct PendingSet {
    object: Arc<dyn ManagedObject>,
    oid: Oid,
    value: Value,
    previous: Option<Value>,
}

impl Dispatcher {
    pub(super) async fn handle_set(&self, ctx: &RequestContext, pdu: &Pdu) -> Response {
        let guard = Arc::clone(&self.set_lock).write_owned().await;
        let snapshot = self.store.snapshot();
        let principal = &ctx.principal;
        let mut pending = Vec::with_capacity(pdu.varbinds.len());

        for (index, vb) in pdu.varbinds.iter().enumerate() {
            let failed = |status: ErrorStatus| {
                tracing::debug!(
                    snmp.request_id = pdu.request_id,
                    snmp.oid = %vb.oid,
                    %status,
                    "set rejected in test phase"
                );
                Self::failure(ctx, pdu, status, index + 1)
            };

            match self.check(principal, &vb.oid, ViewType::Write) {
                Ok(_) => {}
                Err(AccessDenied::NotInView) => return failed(ErrorStatus::NoAccess),
                Err(_) => return failed(ErrorStatus::AuthorizationError),
            }

            let Some(object) = snapshot.lookup(&principal.context_name, &vb.oid) else {
                return failed(ErrorStatus::NotWritable);
            };

            let result = object.test_set(ctx, &vb.oid, &vb.value).await;
            if !result.is_ok() {
                return failed(result.to_error_status());
            }

            let previous = object.get(ctx, &vb.oid).await.into_value();
            pending.push(PendingSet {
                object,
                oid: vb.oid.clone(),
                value: vb.value.clone(),
                previous,
            });
        }

        let commit_ctx = ctx.clone();
        let commit = tokio::spawn(async move {
            let outcome = commit_all(&commit_ctx, &pending).await;
            drop(guard);
            outcome
        });

        match commit.await {
            Ok(Ok(())) => Response::success(pdu.varbinds.clone()),
            Ok(Err((index, status))) => Self::failure(ctx, pdu, status, index + 1),
            Err(join_error) => {
                tracing::warn!(snmp.request_id = pdu.request_id, error = %join_error, "commit task failed");
                Self::failure(ctx, pdu, ErrorStatus::GenErr, 0)
            }
        }
    }
}

/// Write every pending binding, undoing the written ones on failure.
async fn commit_all(
    ctx: &RequestContext,
    pending: &[PendingSet],
) -> Result<(), (usize, ErrorStatus)> {
    for (index, set) in pending.iter().enumerate() {
        let result = set.object.commit_set(ctx, &set.oid, &set.value).await;
        if result.is_ok() {
            continue;
        }

        tracing::warn!(
            snmp.request_id = ctx.request_id,
            snmp.oid = %set.oid,
            ?result,
            undo = index,
            "commit failed, undoing"
        );
        for done in pending[..index].iter().rev() {
            done.object
                .undo_set(ctx, &done.oid, done.previous.as_ref())
                .await;
        }
        let status = match result {
            SetResult::UndoFailed => ErrorStatus::UndoFailed,
            _ => ErrorStatus::CommitFailed,
        };
        return Err((index, status));
    }

    tracing::debug!(snmp.request_id = ctx.request_id, bindings = pending.len(), "set committed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::bootstrap;
    use crate::agent::community::CommunityTable;
    use crate::agent::store::ManagedObjectStore;
    use crate::agent::vacm::{SecurityModel, VacmBuilder};
    use crate::handler::{
        BoxFuture, GetNextResult, GetResult, ManagedObjectFactory, Principal, Scalar,
    };
    use crate::oid;
    use crate::pdu::PduType;
    use crate::value::Syntax;
    use crate::varbind::VarBind;
    use crate::version::Version;

    fn writable_vacm() -> crate::agent::VacmConfig {
        VacmBuilder::new()
            .group("operator", SecurityModel::V2c, "operators")
            .group("operator", SecurityModel::V1, "operators")
            .access("operators", |a| a.read_view("lab").write_view("lab"))
            .view("lab", |v| {
                v.include(oid!(1, 3, 6, 1, 4, 1, 21703, 7500))
                    .exclude(oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 9))
            })
            .build()
    }

    fn setup(vacm: crate::agent::VacmConfig) -> (Dispatcher, Arc<Scalar>, Arc<Scalar>) {
        let store = Arc::new(ManagedObjectStore::new());
        bootstrap::register_managed_objects(&store).unwrap();
        let name = ManagedObjectFactory::read_write(oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 5, 0), "lab-1");
        let level = Arc::new(
            Scalar::new(
                oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 6, 0),
                crate::handler::Access::ReadWrite,
                Value::Integer(3),
            ),
        );
        store.register(name.clone(), b"").unwrap();
        store.register(level.clone(), b"").unwrap();
        let dispatcher = Dispatcher::new(store, Arc::new(CommunityTable::new()), Arc::new(vacm));
        (dispatcher, name, level)
    }

    fn ctx(name: &str, version: Version) -> RequestContext {
        RequestContext::new(Principal::community(version, name.to_string(), ""), 3, PduType::SetRequest)
    }

    fn set_pdu(bindings: Vec<VarBind>) -> Pdu {
        Pdu {
            pdu_type: PduType::SetRequest,
            request_id: 3,
            error_status: 0,
            error_index: 0,
            varbinds: bindings,
        }
    }

    async fn run(d: &Dispatcher, ctx: &RequestContext, pdu: &Pdu) -> Pdu {
        d.dispatch(ctx, pdu).await.unwrap()
    }

    #[tokio::test]
    async fn test_set_commits_all_bindings() {
        let (d, name, level) = setup(writable_vacm());
        let pdu = set_pdu(vec![
            VarBind::new(name.oid().clone(), Value::from("lab-2")),
            VarBind::new(level.oid().clone(), Value::Integer(4)),
        ]);
        let response = run(&d, &ctx("operator", Version::V2c), &pdu).await;
        assert_eq!(response.status(), ErrorStatus::NoError);
        assert_eq!(response.varbinds, pdu.varbinds);
        assert_eq!(name.value().as_str(), Some("lab-2"));
        assert_eq!(level.value(), Value::Integer(4));
    }

    #[tokio::test]
    async fn test_set_atomic_on_validation_failure() {
        let (d, name, level) = setup(writable_vacm());
        let pdu = set_pdu(vec![
            VarBind::new(name.oid().clone(), Value::from("lab-2")),
            VarBind::new(level.oid().clone(), Value::from("high")),
        ]);
        let response = run(&d, &ctx("operator", Version::V2c), &pdu).await;
        assert_eq!(response.status(), ErrorStatus::WrongType);
        assert_eq!(response.error_index, 2);
        assert_eq!(name.value().as_str(), Some("lab-1"));
        assert_eq!(level.value(), Value::Integer(3));

        let v1 = run(&d, &ctx("operator", Version::V1), &pdu).await;
        assert_eq!(v1.status(), ErrorStatus::BadValue);
    }

    #[tokio::test]
    async fn test_set_access_outcomes() {
        let (d, name, _) = setup(writable_vacm());
        let operator = ctx("operator", Version::V2c);

        let excluded = set_pdu(vec![VarBind::new(oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 9, 0), Value::Integer(1))]);
        assert_eq!(run(&d, &operator, &excluded).await.status(), ErrorStatus::NoAccess);

        let missing = set_pdu(vec![VarBind::new(oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 7, 0), Value::Integer(1))]);
        assert_eq!(run(&d, &operator, &missing).await.status(), ErrorStatus::NotWritable);

        let read_only = set_pdu(vec![VarBind::new(bootstrap::watermark_oid(), Value::from("1"))]);
        assert_eq!(run(&d, &operator, &read_only).await.status(), ErrorStatus::NotWritable);

        let stranger = set_pdu(vec![VarBind::new(name.oid().clone(), Value::from("x"))]);
        assert_eq!(
            run(&d, &ctx("stranger", Version::V2c), &stranger).await.status(),
            ErrorStatus::AuthorizationError
        );
        assert_eq!(
            run(&d, &ctx("stranger", Version::V1), &stranger).await.status(),
            ErrorStatus::NoSuchName
        );
        assert_eq!(name.value().as_str(), Some("lab-1"));
    }

    /// Accepts every test, fails every commit.
    struct Broken(Oid);

    impl ManagedObject for Broken {
        fn oid(&self) -> &Oid {
            &self.0
        }

        fn get<'a>(&'a self, _ctx: &'a RequestContext, _oid: &'a Oid) -> BoxFuture<'a, GetResult> {
            Box::pin(async { GetResult::Value(Value::Integer(0)) })
        }

        fn get_next<'a>(&'a self, _ctx: &'a RequestContext, _oid: &'a Oid) -> BoxFuture<'a, GetNextResult> {
            Box::pin(async { GetNextResult::EndOfMibView })
        }

        fn test_set<'a>(&'a self, _ctx: &'a RequestContext, _oid: &'a Oid, _value: &'a Value) -> BoxFuture<'a, SetResult> {
            Box::pin(async { SetResult::Ok })
        }

        fn commit_set<'a>(&'a self, _ctx: &'a RequestContext, _oid: &'a Oid, _value: &'a Value) -> BoxFuture<'a, SetResult> {
            Box::pin(async { SetResult::ResourceUnavailable })
        }
    }

    #[tokio::test]
    async fn test_commit_failure_undoes_earlier_writes() {
        let (d, name, _) = setup(writable_vacm());
        let broken = oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 8, 0);
        d.store().register(Arc::new(Broken(broken.clone())), b"").unwrap();

        let pdu = set_pdu(vec![
            VarBind::new(name.oid().clone(), Value::from("lab-2")),
            VarBind::new(broken, Value::Integer(1)),
        ]);
        let response = run(&d, &ctx("operator", Version::V2c), &pdu).await;
        assert_eq!(response.status(), ErrorStatus::CommitFailed);
        assert_eq!(response.error_index, 2);
        assert_eq!(name.value().as_str(), Some("lab-1"));
    }

    /// Accepts every test; each commit waits a while and then fails.
    struct SlowBroken(Oid);

    impl ManagedObject for SlowBroken {
        fn oid(&self) -> &Oid {
            &self.0
        }

        fn get<'a>(&'a self, _ctx: &'a RequestContext, _oid: &'a Oid) -> BoxFuture<'a, GetResult> {
            Box::pin(async { GetResult::Value(Value::Integer(0)) })
        }

        fn get_next<'a>(&'a self, _ctx: &'a RequestContext, _oid: &'a Oid) -> BoxFuture<'a, GetNextResult> {
            Box::pin(async { GetNextResult::EndOfMibView })
        }

        fn test_set<'a>(&'a self, _ctx: &'a RequestContext, _oid: &'a Oid, _value: &'a Value) -> BoxFuture<'a, SetResult> {
            Box::pin(async { SetResult::Ok })
        }

        fn commit_set<'a>(&'a self, _ctx: &'a RequestContext, _oid: &'a Oid, _value: &'a Value) -> BoxFuture<'a, SetResult> {
            Box::pin(async {
                tokio::time::sleep(std::time::Duration::from_millis(300)).await;
                SetResult::CommitFailed
            })
        }
    }

    #[tokio::test]
    async fn test_reads_wait_for_commit_and_undo() {
        let (d, name, _) = setup(writable_vacm());
        let slow = oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 8, 0);
        d.store().register(Arc::new(SlowBroken(slow.clone())), b"").unwrap();
        let d = Arc::new(d);

        let set = {
            let d = Arc::clone(&d);
            let pdu = set_pdu(vec![
                VarBind::new(name.oid().clone(), Value::from("lab-2")),
                VarBind::new(slow, Value::Integer(1)),
            ]);
            tokio::spawn(async move { run(&d, &ctx("operator", Version::V2c), &pdu).await })
        };

        // Let the SET reach its commit phase, with "lab-2" already written.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let get = Pdu::request(PduType::GetRequest, 9, &[name.oid().clone()]);
        let mut reader = ctx("operator", Version::V2c);
        reader.pdu_type = PduType::GetRequest;
        let read = run(&d, &reader, &get).await;
        assert_eq!(read.varbinds[0].value.as_str(), Some("lab-1"));

        let response = set.await.unwrap();
        assert_eq!(response.status(), ErrorStatus::CommitFailed);
        assert_eq!(response.error_index, 2);
        assert_eq!(name.value().as_str(), Some("lab-1"));
    }

    #[tokio::test]
    async fn test_bootstrap_write_is_refused() {
        let store = Arc::new(ManagedObjectStore::new());
        bootstrap::register_managed_objects(&store).unwrap();
        let d = Dispatcher::new(
            store,
            Arc::new(bootstrap::community_table()),
            Arc::new(bootstrap::vacm()),
        );
        let pdu = set_pdu(vec![VarBind::new(bootstrap::version_oid(), Value::from("2"))]);
        let response = run(&d, &ctx("notConfigUser", Version::V2c), &pdu).await;
        assert_eq!(response.status(), ErrorStatus::AuthorizationError);

        let get = Pdu::request(PduType::GetRequest, 4, &[bootstrap::version_oid()]);
        let value = run(&d, &ctx("notConfigUser", Version::V2c), &get).await;
        assert_eq!(value.varbinds[0].value.as_str(), Some("1"));
    }

    #[tokio::test]
    async fn test_concurrent_sets_serialise() {
        let (d, _, level) = setup(writable_vacm());
        let d = Arc::new(d);
        let mut tasks = Vec::new();
        for i in 0..16 {
            let d = Arc::clone(&d);
            let oid = level.oid().clone();
            tasks.push(tokio::spawn(async move {
                let pdu = set_pdu(vec![VarBind::new(oid, Value::Integer(i))]);
                d.dispatch(&ctx("operator", Version::V2c), &pdu).await.unwrap().status()
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), ErrorStatus::NoError);
        }
        assert!(matches!(level.value(), Value::Integer(0..=15)));
        assert_eq!(level.syntax(), Syntax::Integer);
    }
}
