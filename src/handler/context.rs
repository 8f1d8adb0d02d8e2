//! Request principal and per-request context.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::agent::vacm::SecurityModel;
use crate::message::SecurityLevel;
use crate::pdu::PduType;
use crate::version::Version;

/// An authenticated requester, as seen by access control.
///
/// For v1/v2c this comes out of the community table. For v3 the external
/// USM engine supplies it directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    pub version: Version,
    pub security_model: SecurityModel,
    pub security_name: Bytes,
    pub security_level: SecurityLevel,
    pub context_name: Bytes,
}

impl Principal {
    /// A community-based principal (always noAuthNoPriv).
    pub fn community(
        version: Version,
        security_name: impl Into<Bytes>,
        context_name: impl Into<Bytes>,
    ) -> Self {
        Self {
            version,
            security_model: version.security_model(),
            security_name: security_name.into(),
            security_level: SecurityLevel::NoAuthNoPriv,
            context_name: context_name.into(),
        }
    }

    /// A USM principal handed over by the v3 security engine.
    pub fn usm(
        security_name: impl Into<Bytes>,
        security_level: SecurityLevel,
        context_name: impl Into<Bytes>,
    ) -> Self {
        Self {
            version: Version::V3,
            security_model: SecurityModel::Usm,
            security_name: security_name.into(),
            security_level,
            context_name: context_name.into(),
        }
    }
}

/// Request context passed to managed objects.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Source address, if the request arrived over the network.
    pub source: Option<SocketAddr>,
    /// Resolved requester.
    pub principal: Principal,
    /// Request ID from the PDU.
    pub request_id: i32,
    /// PDU type (GetRequest, SetRequest, ...).
    pub pdu_type: PduType,
}

impl RequestContext {
    pub fn new(principal: Principal, request_id: i32, pdu_type: PduType) -> Self {
        Self {
            source: None,
            principal,
            request_id,
            pdu_type,
        }
    }

    pub fn with_source(mut self, source: SocketAddr) -> Self {
        self.source = Some(source);
        self
    }

    pub fn version(&self) -> Version {
        self.principal.version
    }

    pub fn context_name(&self) -> &Bytes {
        &self.principal.context_name
    }
}
