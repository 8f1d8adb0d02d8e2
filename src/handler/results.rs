//! Per-binding outcomes of managed object operations.
//!
//! None of these are errors: a missing instance or a rejected SET is an
//! ordinary protocol answer, and the dispatcher maps each variant onto the
//! wire representation for the request's version.

use crate::error::ErrorStatus;
use crate::pdu::Pdu;
use crate::value::Value;
use crate::varbind::VarBind;

/// Result of a SET phase.
///
/// Variants map to the RFC 3416 SET error statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetResult {
    /// Operation succeeded.
    Ok,
    /// The requester may not write this object.
    NoAccess,
    /// The object is read-only, or does not exist and cannot exist.
    NotWritable,
    /// Value has the wrong SMI syntax for this object.
    WrongType,
    /// Value length is outside the object's limits.
    WrongLength,
    /// Value encoding is incorrect.
    WrongEncoding,
    /// Value is not acceptable for this object.
    WrongValue,
    /// The instance does not exist and the table does not allow creating it.
    NoCreation,
    /// Value conflicts with other values in the same SET.
    InconsistentValue,
    /// Resource unavailable.
    ResourceUnavailable,
    /// Applying the value failed.
    CommitFailed,
    /// Rolling back failed.
    UndoFailed,
    /// Row name is inconsistent with existing data.
    InconsistentName,
}

impl SetResult {
    /// Check if this result indicates success.
    pub fn is_ok(&self) -> bool {
        matches!(self, SetResult::Ok)
    }

    /// Convert to an ErrorStatus code.
    pub fn to_error_status(&self) -> ErrorStatus {
        match self {
            SetResult::Ok => ErrorStatus::NoError,
            SetResult::NoAccess => ErrorStatus::NoAccess,
            SetResult::NotWritable => ErrorStatus::NotWritable,
            SetResult::WrongType => ErrorStatus::WrongType,
            SetResult::WrongLength => ErrorStatus::WrongLength,
            SetResult::WrongEncoding => ErrorStatus::WrongEncoding,
            SetResult::WrongValue => ErrorStatus::WrongValue,
            SetResult::NoCreation => ErrorStatus::NoCreation,
            SetResult::InconsistentValue => ErrorStatus::InconsistentValue,
            SetResult::ResourceUnavailable => ErrorStatus::ResourceUnavailable,
            SetResult::CommitFailed => ErrorStatus::CommitFailed,
            SetResult::UndoFailed => ErrorStatus::UndoFailed,
            SetResult::InconsistentName => ErrorStatus::InconsistentName,
        }
    }
}

/// Result of a GET on a specific instance.
///
/// For SNMPv1 both exceptions become a `noSuchName` error; v2c and v3 carry
/// them as per-binding exception values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetResult {
    /// The instance exists and has this value.
    Value(Value),
    /// No such object type.
    NoSuchObject,
    /// The object type exists but this instance does not.
    NoSuchInstance,
}

impl GetResult {
    /// The value, if there is one.
    pub fn into_value(self) -> Option<Value> {
        match self {
            GetResult::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The wire value for v2c/v3, where exceptions are values.
    pub fn into_wire_value(self) -> Value {
        match self {
            GetResult::Value(v) => v,
            GetResult::NoSuchObject => Value::NoSuchObject,
            GetResult::NoSuchInstance => Value::NoSuchInstance,
        }
    }
}

impl From<Value> for GetResult {
    fn from(value: Value) -> Self {
        GetResult::Value(value)
    }
}

/// Result of a GETNEXT within one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetNextResult {
    /// The next instance after the requested OID.
    Value(VarBind),
    /// No instance of this object follows the requested OID.
    EndOfMibView,
}

impl GetNextResult {
    /// Converts to an `Option<VarBind>`.
    pub fn into_option(self) -> Option<VarBind> {
        match self {
            GetNextResult::Value(vb) => Some(vb),
            GetNextResult::EndOfMibView => None,
        }
    }
}

impl From<Option<VarBind>> for GetNextResult {
    fn from(value: Option<VarBind>) -> Self {
        match value {
            Some(vb) => GetNextResult::Value(vb),
            None => GetNextResult::EndOfMibView,
        }
    }
}

/// Dispatcher output for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Variable bindings in the response.
    pub varbinds: Vec<VarBind>,
    /// Error status (noError on success).
    pub error_status: ErrorStatus,
    /// 1-based index of the failing binding, 0 if none.
    pub error_index: usize,
}

impl Response {
    /// Create a successful response with the given varbinds.
    pub fn success(varbinds: Vec<VarBind>) -> Self {
        Self {
            varbinds,
            error_status: ErrorStatus::NoError,
            error_index: 0,
        }
    }

    /// Create an error response.
    pub fn error(error_status: ErrorStatus, error_index: usize, varbinds: Vec<VarBind>) -> Self {
        Self {
            varbinds,
            error_status,
            error_index,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_status != ErrorStatus::NoError
    }

    /// Wrap into a Response PDU.
    pub fn into_pdu(self, request_id: i32) -> Pdu {
        let mut pdu = Pdu::response(request_id, self.varbinds);
        pdu.error_status = self.error_status.as_i32();
        pdu.error_index = i32::try_from(self.error_index).unwrap_or(0);
        pdu
    }
}
