//! Per-room session registry.
//!
//! `RoomState` is the single source of truth for one room: who the host is,
//! which connections are admitted members, and which are waiting on an entry
//! decision. It is owned by exactly one `RoomActor`, so every method here runs
//! sequentially and none of them touch the network.
//!
//! # Invariants
//!
//! - A connection is in at most one of `members` and `pending`.
//! - There is at most one host, and the host is always a member.
//! - A pending request is resolved exactly once: every removal path pops it.

use crate::signaling::protocol::{MediaKind, MemberInfo};

use common::types::{ConnectionId, MediaId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// An admitted participant.
#[derive(Debug, Clone)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub name: String,
    pub media_id: MediaId,
    /// Whether the participant asked for the host role at join time.
    pub claimed_host: bool,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub screen_sharing: bool,
    /// Monotonic admission order within the room.
    pub join_seq: u64,
    /// Admission time, for the membership-duration histogram.
    pub joined_at: Instant,
}

/// A connection waiting for the host's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub requester: ConnectionId,
    pub name: String,
    pub media_id: MediaId,
    /// Host the request was forwarded to; `None` while held in a host-less room.
    pub target: Option<ConnectionId>,
    pub requested_at: Instant,
}

/// Result of removing a member.
#[derive(Debug)]
pub struct RemovedMember {
    pub member: Member,
    pub was_host: bool,
    /// Requests that targeted the departed host, already removed from the room.
    pub orphaned: Vec<PendingEntry>,
}

/// Result of a media toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaUpdate {
    NotMember,
    Unchanged,
    Changed,
}

/// Consistent view of a room at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub host: Option<ConnectionId>,
    /// Members in join order.
    pub members: Vec<MemberInfo>,
    pub pending: Vec<ConnectionId>,
}

/// State for a single room.
#[derive(Debug, Default)]
pub struct RoomState {
    host: Option<ConnectionId>,
    members: HashMap<ConnectionId, Member>,
    pending: HashMap<ConnectionId, PendingEntry>,
    next_seq: u64,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection` as host. Last claim wins.
    ///
    /// The claimant becomes a member if it is not one already. Calling this
    /// again for the current host changes nothing. Returns the previous host.
    pub fn register_host(
        &mut self,
        connection: ConnectionId,
        name: &str,
        media_id: &MediaId,
        now: Instant,
    ) -> Option<ConnectionId> {
        self.pending.remove(&connection);
        if !self.members.contains_key(&connection) {
            self.insert_member(connection, name, media_id, true, now);
        }
        self.host.replace(connection)
    }

    /// Admit `connection` as a non-host member. Returns false if already present.
    pub fn add_member(
        &mut self,
        connection: ConnectionId,
        name: &str,
        media_id: &MediaId,
        now: Instant,
    ) -> bool {
        if self.members.contains_key(&connection) {
            return false;
        }
        self.pending.remove(&connection);
        self.insert_member(connection, name, media_id, false, now);
        true
    }

    fn insert_member(
        &mut self,
        connection: ConnectionId,
        name: &str,
        media_id: &MediaId,
        claimed_host: bool,
        now: Instant,
    ) {
        let join_seq = self.next_seq;
        self.next_seq += 1;
        self.members.insert(
            connection,
            Member {
                connection_id: connection,
                name: name.to_string(),
                media_id: media_id.clone(),
                claimed_host,
                audio_enabled: true,
                video_enabled: true,
                screen_sharing: false,
                join_seq,
                joined_at: now,
            },
        );
    }

    /// Remove a member. Clears the host reference and discards requests that
    /// targeted it when the member was host.
    pub fn remove_member(&mut self, connection: ConnectionId) -> Option<RemovedMember> {
        let member = self.members.remove(&connection)?;
        let was_host = self.host == Some(connection);
        let mut orphaned = Vec::new();

        if was_host {
            self.host = None;
            let stale: Vec<ConnectionId> = self
                .pending
                .values()
                .filter(|p| p.target == Some(connection))
                .map(|p| p.requester)
                .collect();
            for requester in stale {
                if let Some(entry) = self.pending.remove(&requester) {
                    orphaned.push(entry);
                }
            }
            orphaned.sort_by_key(|p| p.requested_at);
        }

        Some(RemovedMember {
            member,
            was_host,
            orphaned,
        })
    }

    #[must_use]
    pub fn is_host(&self, connection: ConnectionId) -> bool {
        self.host == Some(connection)
    }

    #[must_use]
    pub fn current_host(&self) -> Option<&Member> {
        self.host.and_then(|h| self.members.get(&h))
    }

    #[must_use]
    pub fn is_member(&self, connection: ConnectionId) -> bool {
        self.members.contains_key(&connection)
    }

    #[must_use]
    pub fn is_pending(&self, connection: ConnectionId) -> bool {
        self.pending.contains_key(&connection)
    }

    #[must_use]
    pub fn member(&self, connection: ConnectionId) -> Option<&Member> {
        self.members.get(&connection)
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// True when the room has no members and no pending requests.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.pending.is_empty()
    }

    /// Member IDs, optionally excluding one connection.
    #[must_use]
    pub fn member_ids_except(&self, except: Option<ConnectionId>) -> Vec<ConnectionId> {
        self.members
            .keys()
            .copied()
            .filter(|id| Some(*id) != except)
            .collect()
    }

    /// Queue an entry request. Returns false if the connection is already a
    /// member or already pending.
    pub fn add_pending(
        &mut self,
        connection: ConnectionId,
        name: &str,
        media_id: &MediaId,
        target: Option<ConnectionId>,
        now: Instant,
    ) -> bool {
        if self.members.contains_key(&connection) || self.pending.contains_key(&connection) {
            return false;
        }
        self.pending.insert(
            connection,
            PendingEntry {
                requester: connection,
                name: name.to_string(),
                media_id: media_id.clone(),
                target,
                requested_at: now,
            },
        );
        true
    }

    /// Pop a pending request for a host decision. Single-use.
    pub fn resolve_pending(&mut self, requester: ConnectionId) -> Option<PendingEntry> {
        self.pending.remove(&requester)
    }

    /// Drop a pending request because the requester went away.
    pub fn remove_pending(&mut self, requester: ConnectionId) -> Option<PendingEntry> {
        self.pending.remove(&requester)
    }

    /// Remove and return requests that have waited at least `ttl`, oldest first.
    pub fn expired_pending(&mut self, now: Instant, ttl: Duration) -> Vec<PendingEntry> {
        let expired: Vec<ConnectionId> = self
            .pending
            .values()
            .filter(|p| now.saturating_duration_since(p.requested_at) >= ttl)
            .map(|p| p.requester)
            .collect();

        let mut entries: Vec<PendingEntry> = expired
            .into_iter()
            .filter_map(|id| self.pending.remove(&id))
            .collect();
        entries.sort_by_key(|p| p.requested_at);
        entries
    }

    /// Point every pending request that does not already target `host` at it.
    ///
    /// Covers requests held in a host-less room and requests addressed to a
    /// host that was replaced by a later claim. Returns the retargeted
    /// requests, oldest first, so the new host can be told about each.
    pub fn retarget_held(&mut self, host: ConnectionId) -> Vec<PendingEntry> {
        let mut moved: Vec<PendingEntry> = self
            .pending
            .values_mut()
            .filter(|p| p.target != Some(host))
            .map(|p| {
                p.target = Some(host);
                p.clone()
            })
            .collect();
        moved.sort_by_key(|p| p.requested_at);
        moved
    }

    /// Make the earliest-joined member host if the room has none.
    pub fn promote_earliest(&mut self) -> Option<ConnectionId> {
        if self.host.is_some() {
            return None;
        }
        let next = self.members.values().min_by_key(|m| m.join_seq)?.connection_id;
        self.host = Some(next);
        Some(next)
    }

    /// Record a media toggle for a member.
    pub fn set_media_state(
        &mut self,
        connection: ConnectionId,
        kind: MediaKind,
        enabled: bool,
    ) -> MediaUpdate {
        let Some(member) = self.members.get_mut(&connection) else {
            return MediaUpdate::NotMember;
        };
        let flag = match kind {
            MediaKind::Audio => &mut member.audio_enabled,
            MediaKind::Video => &mut member.video_enabled,
            MediaKind::Screen => &mut member.screen_sharing,
        };
        if *flag == enabled {
            MediaUpdate::Unchanged
        } else {
            *flag = enabled;
            MediaUpdate::Changed
        }
    }

    /// Members other than `except`, in join order.
    #[must_use]
    pub fn member_infos(&self, except: Option<ConnectionId>) -> Vec<MemberInfo> {
        let mut members: Vec<&Member> = self
            .members
            .values()
            .filter(|m| Some(m.connection_id) != except)
            .collect();
        members.sort_by_key(|m| m.join_seq);
        members.into_iter().map(|m| self.to_info(m)).collect()
    }

    fn to_info(&self, member: &Member) -> MemberInfo {
        MemberInfo {
            connection_id: member.connection_id,
            media_id: member.media_id.clone(),
            name: member.name.clone(),
            is_host: self.host == Some(member.connection_id),
            audio_enabled: member.audio_enabled,
            video_enabled: member.video_enabled,
            screen_sharing: member.screen_sharing,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        let mut pending: Vec<&PendingEntry> = self.pending.values().collect();
        pending.sort_by_key(|p| p.requested_at);
        RoomSnapshot {
            host: self.host,
            members: self.member_infos(None),
            pending: pending.into_iter().map(|p| p.requester).collect(),
        }
    }
}
