use std::fmt;

use mongodb::bson::{Bson, Document};

/// Replication state of one replica-set member, as reported by the
/// `stateStr` field of `replSetGetStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    Primary,
    Secondary,
    Startup,
    Recovering,
    Arbiter,
    Down,
    Rollback,
    Removed,
    Unknown,
}

impl From<&str> for MemberState {
    fn from(raw: &str) -> Self {
        match raw {
            "PRIMARY" => MemberState::Primary,
            "SECONDARY" => MemberState::Secondary,
            "STARTUP" | "STARTUP2" => MemberState::Startup,
            "RECOVERING" => MemberState::Recovering,
            "ARBITER" => MemberState::Arbiter,
            "DOWN" => MemberState::Down,
            "ROLLBACK" => MemberState::Rollback,
            "REMOVED" => MemberState::Removed,
            _ => MemberState::Unknown,
        }
    }
}

impl fmt::Display for MemberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemberState::Primary => "PRIMARY",
            MemberState::Secondary => "SECONDARY",
            MemberState::Startup => "STARTUP",
            MemberState::Recovering => "RECOVERING",
            MemberState::Arbiter => "ARBITER",
            MemberState::Down => "DOWN",
            MemberState::Rollback => "ROLLBACK",
            MemberState::Removed => "REMOVED",
            MemberState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One node in the replica set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: Option<String>,
    pub is_self: bool,
    pub state: MemberState,
}

impl Member {
    fn from_document(doc: &Document) -> Self {
        Member {
            name: doc.get_str("name").ok().map(String::from),
            is_self: doc.get_bool("self").unwrap_or(false),
            state: doc
                .get_str("stateStr")
                .map(MemberState::from)
                .unwrap_or(MemberState::Unknown),
        }
    }
}

/// Snapshot of the replica-set topology at one probe.
#[derive(Debug, Clone, Default)]
pub struct ClusterStatus {
    pub set_name: Option<String>,
    pub members: Vec<Member>,
}

impl ClusterStatus {
    pub fn from_document(doc: &Document) -> Self {
        let members = doc
            .get_array("members")
            .map(|arr| {
                arr.iter()
                    .filter_map(Bson::as_document)
                    .map(Member::from_document)
                    .collect()
            })
            .unwrap_or_default();

        ClusterStatus {
            set_name: doc.get_str("set").ok().map(String::from),
            members,
        }
    }

    /// The member entry describing the node this client is connected to.
    pub fn self_member(&self) -> Option<&Member> {
        self.members.iter().find(|m| m.is_self)
    }
}
