//! API keys, version ranges and the traits every operation implements.

use crate::codec::Reader;
use crate::error::{ErrorCode, ProtocolError};
use bytes::BytesMut;
use std::fmt;
use std::time::Duration;

/// Wire version of one API's request/response layout.
pub type ApiVersion = i16;

macro_rules! api_keys {
    ($($key:literal => $variant:ident,)+) => {
        /// API keys known to this client.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i16)]
        pub enum ApiKey {
            $($variant = $key,)+
        }

        impl ApiKey {
            /// Looks up a wire key. Unknown keys yield `None`.
            pub fn from_key(key: i16) -> Option<Self> {
                match key {
                    $($key => Some(ApiKey::$variant),)+
                    _ => None,
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(ApiKey::$variant => stringify!($variant),)+
                }
            }
        }
    };
}

api_keys! {
    0 => Produce,
    1 => Fetch,
    2 => ListOffsets,
    3 => Metadata,
    4 => LeaderAndIsr,
    5 => StopReplica,
    6 => UpdateMetadata,
    7 => ControlledShutdown,
    8 => OffsetCommit,
    9 => OffsetFetch,
    10 => FindCoordinator,
    11 => JoinGroup,
    12 => Heartbeat,
    13 => LeaveGroup,
    14 => SyncGroup,
    15 => DescribeGroups,
    16 => ListGroups,
    17 => SaslHandshake,
    18 => ApiVersions,
    19 => CreateTopics,
    20 => DeleteTopics,
    21 => DeleteRecords,
    22 => InitProducerId,
    23 => OffsetForLeaderEpoch,
    24 => AddPartitionsToTxn,
    25 => AddOffsetsToTxn,
    26 => EndTxn,
    27 => WriteTxnMarkers,
    28 => TxnOffsetCommit,
    29 => DescribeAcls,
    30 => CreateAcls,
    31 => DeleteAcls,
    32 => DescribeConfigs,
    33 => AlterConfigs,
    34 => AlterReplicaLogDirs,
    35 => DescribeLogDirs,
    36 => SaslAuthenticate,
    37 => CreatePartitions,
    38 => CreateDelegationToken,
    39 => RenewDelegationToken,
    40 => ExpireDelegationToken,
    41 => DescribeDelegationToken,
    42 => DeleteGroups,
    43 => ElectLeaders,
    44 => IncrementalAlterConfigs,
    45 => AlterPartitionReassignments,
    46 => ListPartitionReassignments,
    47 => OffsetDelete,
    48 => DescribeClientQuotas,
    49 => AlterClientQuotas,
    50 => DescribeUserScramCredentials,
    51 => AlterUserScramCredentials,
}

impl ApiKey {
    /// Returns the wire key.
    pub fn key(&self) -> i16 {
        *self as i16
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive range of API versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub min: ApiVersion,
    pub max: ApiVersion,
}

impl VersionRange {
    pub const fn new(min: ApiVersion, max: ApiVersion) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, version: ApiVersion) -> bool {
        self.min <= version && version <= self.max
    }

    /// Returns the overlap of two ranges, or `None` if they are disjoint.
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        if min > max {
            return None;
        }
        Some(VersionRange { min, max })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}..=v{}", self.min, self.max)
    }
}

/// A request or response body whose layout depends on its version tag.
///
/// Implementations keep the version inside the struct; `size`, `write_to`
/// and `read_from` all branch on it, so the set of fields present at a given
/// version lives in one place.
pub trait Message: Sized {
    fn version(&self) -> ApiVersion;

    /// Returns the number of bytes [`Message::write_to`] will append.
    fn size(&self) -> usize;

    fn write_to(&self, buf: &mut BytesMut);

    /// Checks that every length fits its prefix. Called before encoding.
    fn validate(&self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_from(reader: &mut Reader, version: ApiVersion) -> Result<Self, ProtocolError>;
}

/// The request half of an operation.
pub trait ApiRequest: Message + Send {
    const API_KEY: ApiKey;

    /// Versions this client can encode and decode.
    const VERSIONS: VersionRange;

    type Response: ApiResponse;

    fn set_version(&mut self, version: ApiVersion);

    /// Fills in a broker-side timeout the caller left unset.
    fn derive_timeout(&mut self, _timeout: Duration) {}
}

/// The response half of an operation.
pub trait ApiResponse: Message + Send {
    /// Root-level status for the whole request, if the API has one.
    fn error_code(&self) -> Option<ErrorCode> {
        None
    }

    /// Per-item status codes, in broker order, including successes.
    fn item_errors(&self) -> Vec<(&str, Option<ErrorCode>)> {
        Vec::new()
    }

    fn throttle(&self) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_lookup() {
        assert_eq!(ApiKey::from_key(20), Some(ApiKey::DeleteTopics));
        assert_eq!(ApiKey::from_key(18), Some(ApiKey::ApiVersions));
        assert_eq!(ApiKey::DeleteTopics.key(), 20);
        assert_eq!(ApiKey::from_key(-3), None);
        assert_eq!(ApiKey::DeleteTopics.to_string(), "DeleteTopics");
    }

    #[test]
    fn test_version_range_intersect() {
        let client = VersionRange::new(0, 1);
        assert_eq!(
            client.intersect(&VersionRange::new(0, 0)),
            Some(VersionRange::new(0, 0))
        );
        assert_eq!(
            client.intersect(&VersionRange::new(0, 6)),
            Some(VersionRange::new(0, 1))
        );
        assert_eq!(client.intersect(&VersionRange::new(2, 6)), None);
        assert!(client.contains(1));
        assert!(!client.contains(2));
        assert_eq!(client.to_string(), "v0..=v1");
    }
}
