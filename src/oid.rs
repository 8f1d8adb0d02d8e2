//! Object Identifier (OID) type.
//!
//! OIDs are the universal key of the agent: every managed object, view
//! subtree and registration range is expressed as one. Ordering is
//! lexicographic by arc, with a prefix sorting before its extensions
//! (`1.3.6.1` < `1.3.6.1.0` < `1.3.6.2`), which is exactly the order
//! GETNEXT walks in.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::error::{Error, OidErrorKind, Result};

/// Maximum number of arcs in an OID (RFC 2578 Section 3.5).
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
///
/// Immutable once constructed. Arcs are stored inline for OIDs of up to
/// 16 arcs, which covers nearly every instance OID an agent serves.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an empty OID.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Create an OID from any iterator of arcs.
    pub fn from_arcs(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Parse dotted notation (`"1.3.6.1.2.1"`, a leading dot is accepted).
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Err(Error::invalid_oid_with_input(OidErrorKind::Empty, s));
        }

        let mut arcs = SmallVec::new();
        for part in trimmed.split('.') {
            let arc = part
                .parse::<u32>()
                .map_err(|_| Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s))?;
            arcs.push(arc);
        }

        if arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid_with_input(
                OidErrorKind::TooManyArcs {
                    count: arcs.len(),
                    max: MAX_OID_LEN,
                },
                s,
            ));
        }

        Ok(Self { arcs })
    }

    /// The arcs of this OID.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Whether this OID has no arcs.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Whether `prefix` is a (non-strict) prefix of this OID.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.starts_with(&prefix.arcs)
    }

    /// Return a new OID with `arc` appended.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Return a new OID with all `suffix` arcs appended.
    pub fn join(&self, suffix: &[u32]) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.extend_from_slice(suffix);
        Oid { arcs }
    }

    /// Return the arcs following `prefix`, if `prefix` is a prefix of this OID.
    pub fn strip_prefix(&self, prefix: &Oid) -> Option<&[u32]> {
        self.arcs.strip_prefix(prefix.arcs.as_slice())
    }

    /// Return the parent OID (all arcs but the last), or `None` if empty.
    pub fn parent(&self) -> Option<Oid> {
        let (_, rest) = self.arcs.split_last()?;
        Some(Oid::from_slice(rest))
    }

    /// Validate the first two arcs per X.690 Section 8.19.4.
    pub fn validate(&self) -> Result<()> {
        if let Some(&first) = self.arcs.first() {
            if first > 2 {
                return Err(Error::invalid_oid(OidErrorKind::InvalidFirstArc(first)));
            }
            if let Some(&second) = self.arcs.get(1)
                && first < 2
                && second >= 40
            {
                return Err(Error::invalid_oid(OidErrorKind::InvalidSecondArc {
                    first,
                    second,
                }));
            }
        }
        Ok(())
    }

    /// Encode the arcs as BER content octets (no tag or length).
    pub fn to_ber_smallvec(&self) -> SmallVec<[u8; 64]> {
        let mut out = SmallVec::new();

        let (first_subid, rest) = match self.arcs.as_slice() {
            [] => return out,
            [first] => (u64::from(*first) * 40, &[][..]),
            [first, second, rest @ ..] => (u64::from(*first) * 40 + u64::from(*second), rest),
        };

        encode_subidentifier(&mut out, first_subid);
        for &arc in rest {
            encode_subidentifier(&mut out, u64::from(arc));
        }
        out
    }

    /// Decode BER content octets (no tag or length) into an OID.
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        let mut arcs: SmallVec<[u32; 16]> = SmallVec::new();
        if data.is_empty() {
            return Ok(Self { arcs });
        }

        let mut value: u64 = 0;
        let mut first = true;
        for (i, &byte) in data.iter().enumerate() {
            value = (value << 7) | u64::from(byte & 0x7F);
            if value > u64::from(u32::MAX) + 80 {
                return Err(Error::invalid_oid(OidErrorKind::SubidentifierOverflow));
            }
            if byte & 0x80 != 0 {
                if i == data.len() - 1 {
                    return Err(Error::invalid_oid(OidErrorKind::InvalidArc));
                }
                continue;
            }

            if first {
                let (a, b) = match value {
                    0..40 => (0, value),
                    40..80 => (1, value - 40),
                    _ => (2, value - 80),
                };
                arcs.push(a as u32);
                arcs.push(
                    u32::try_from(b)
                        .map_err(|_| Error::invalid_oid(OidErrorKind::SubidentifierOverflow))?,
                );
                first = false;
            } else {
                arcs.push(
                    u32::try_from(value)
                        .map_err(|_| Error::invalid_oid(OidErrorKind::SubidentifierOverflow))?,
                );
            }
            if arcs.len() > MAX_OID_LEN {
                return Err(Error::invalid_oid(OidErrorKind::TooManyArcs {
                    count: arcs.len(),
                    max: MAX_OID_LEN,
                }));
            }
            value = 0;
        }

        Ok(Self { arcs })
    }
}

fn encode_subidentifier(out: &mut SmallVec<[u8; 64]>, value: u64) {
    let mut tmp = [0u8; 10];
    let mut n = 0;
    let mut v = value;
    loop {
        tmp[n] = (v & 0x7F) as u8;
        v >>= 7;
        n += 1;
        if v == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(tmp[i] | continuation);
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.arcs.iter();
        if let Some(first) = iter.next() {
            write!(f, "{}", first)?;
            for arc in iter {
                write!(f, ".{}", arc)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Oid::parse(s)
    }
}

impl serde::Serialize for Oid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Oid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Oid::parse(&text).map_err(serde::de::Error::custom)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Oid::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Oid::from_slice(&arcs)
    }
}

/// Construct an [`Oid`] from literal arcs.
///
/// ```rust
/// use async_snmp_agent::oid;
///
/// let enterprise = oid!(1, 3, 6, 1, 4, 1, 21703);
/// assert_eq!(enterprise.to_string(), "1.3.6.1.4.1.21703");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}
