//! Admission control: host-gated entry into a room.
//!
//! Every function here takes the room's `RoomState` by `&mut` and returns a
//! [`Decision`]: the outcome plus the events the relay must deliver and the
//! connections whose routes must be released afterwards. Nothing here sends
//! anything, which keeps the state machine testable without actors.
//!
//! ```text
//! REQUESTING ──┬─► GRANTED
//!              ├─► DENIED
//!              └─► AWAITING_HOST ──┬─► GRANTED
//!                                  └─► DENIED (host, timeout, host-left, room-full)
//! ```

use crate::registry::RoomState;
use crate::relay::{Audience, Outbound};
use crate::signaling::protocol::{DenyReason, ServerEvent};

use common::types::{ConnectionId, MediaId};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What to do with a non-host join when the room has no host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostlessPolicy {
    /// Admit immediately.
    #[default]
    Grant,
    /// Hold the request until someone claims host.
    Hold,
}

impl HostlessPolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            HostlessPolicy::Grant => "grant",
            HostlessPolicy::Hold => "hold",
        }
    }
}

impl FromStr for HostlessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grant" => Ok(HostlessPolicy::Grant),
            "hold" => Ok(HostlessPolicy::Hold),
            other => Err(format!("unknown hostless policy '{other}'")),
        }
    }
}

impl fmt::Display for HostlessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to the host role when the host leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostDeparturePolicy {
    /// Room stays host-less until the next host claim.
    #[default]
    Hostless,
    /// Earliest-joined remaining member becomes host.
    PromoteEarliest,
}

impl HostDeparturePolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            HostDeparturePolicy::Hostless => "hostless",
            HostDeparturePolicy::PromoteEarliest => "promote-earliest",
        }
    }
}

impl FromStr for HostDeparturePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hostless" => Ok(HostDeparturePolicy::Hostless),
            "promote-earliest" => Ok(HostDeparturePolicy::PromoteEarliest),
            other => Err(format!("unknown host departure policy '{other}'")),
        }
    }
}

impl fmt::Display for HostDeparturePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-room admission settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub hostless: HostlessPolicy,
    pub host_departure: HostDeparturePolicy,
    /// Auto-deny pending requests after this long; `None` disables expiry.
    pub pending_timeout: Option<Duration>,
    pub max_participants: usize,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            hostless: HostlessPolicy::Grant,
            host_departure: HostDeparturePolicy::Hostless,
            pending_timeout: Some(Duration::from_secs(120)),
            max_participants: 50,
        }
    }
}

/// A join attempt from one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub connection_id: ConnectionId,
    pub name: String,
    pub media_id: MediaId,
    pub is_host: bool,
}

/// Immediate result of a join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Granted,
    /// Waiting on a host decision (or on a host, under the hold policy).
    Pending,
    Denied(DenyReason),
    /// Connection was already a member or pending; nothing changed.
    Duplicate,
}

impl JoinOutcome {
    /// Bounded label for the admissions counter.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinOutcome::Granted => "granted",
            JoinOutcome::Pending => "pending",
            JoinOutcome::Denied(_) => "denied",
            JoinOutcome::Duplicate => "duplicate",
        }
    }
}

/// Result of a host decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespondOutcome {
    Granted,
    Denied(DenyReason),
    /// Responder is not the current host.
    NotHost,
    /// No pending request for that requester (already resolved or gone).
    NoRequest,
}

/// Result of a connection going away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    Member { was_host: bool },
    Pending,
    /// Unknown to the room; already cleaned up.
    Unknown,
}

/// Outcome plus the side effects the room actor must apply.
#[derive(Debug)]
pub struct Decision<T> {
    pub outcome: T,
    pub outbound: Vec<Outbound>,
    /// Connections that are now neither member nor pending.
    pub release: Vec<ConnectionId>,
}

impl<T> Decision<T> {
    fn new(outcome: T) -> Self {
        Self {
            outcome,
            outbound: Vec::new(),
            release: Vec::new(),
        }
    }

    fn send(&mut self, audience: Audience, event: ServerEvent) {
        self.outbound.push(Outbound { audience, event });
    }

    fn deny(&mut self, requester: ConnectionId, reason: DenyReason) {
        crate::observability::metrics::record_entry_denied(reason.as_str());
        self.send(
            Audience::One(requester),
            ServerEvent::EntryDenied { reason },
        );
        self.release.push(requester);
    }
}

/// Decide a join request.
pub fn admit(
    state: &mut RoomState,
    policy: &AdmissionPolicy,
    request: &JoinRequest,
    now: Instant,
) -> Decision<JoinOutcome> {
    let conn = request.connection_id;

    if state.is_member(conn) || state.is_pending(conn) {
        debug!(
            target: "rc.admission",
            connection_id = %conn,
            "Duplicate join ignored"
        );
        return Decision::new(JoinOutcome::Duplicate);
    }

    if state.member_count() >= policy.max_participants {
        warn!(
            target: "rc.admission",
            connection_id = %conn,
            max_participants = policy.max_participants,
            "Join rejected, room full"
        );
        let mut decision = Decision::new(JoinOutcome::Denied(DenyReason::RoomFull));
        decision.deny(conn, DenyReason::RoomFull);
        return decision;
    }

    if request.is_host {
        return claim_host(state, request, now);
    }

    if let Some(host) = state.current_host().map(|h| h.connection_id) {
        state.add_pending(conn, &request.name, &request.media_id, Some(host), now);
        let mut decision = Decision::new(JoinOutcome::Pending);
        decision.send(
            Audience::One(host),
            ServerEvent::EntryRequested {
                requester_id: conn,
                name: request.name.clone(),
                media_id: request.media_id.clone(),
            },
        );
        debug!(
            target: "rc.admission",
            connection_id = %conn,
            host_id = %host,
            "Entry request forwarded to host"
        );
        return decision;
    }

    match policy.hostless {
        HostlessPolicy::Grant => {
            state.add_member(conn, &request.name, &request.media_id, now);
            let mut decision = Decision::new(JoinOutcome::Granted);
            announce_admission(state, &mut decision, conn);
            decision
        }
        HostlessPolicy::Hold => {
            state.add_pending(conn, &request.name, &request.media_id, None, now);
            debug!(
                target: "rc.admission",
                connection_id = %conn,
                "Entry request held until a host claims the room"
            );
            Decision::new(JoinOutcome::Pending)
        }
    }
}

fn claim_host(state: &mut RoomState, request: &JoinRequest, now: Instant) -> Decision<JoinOutcome> {
    let conn = request.connection_id;
    let previous = state.register_host(conn, &request.name, &request.media_id, now);
    let mut decision = Decision::new(JoinOutcome::Granted);

    announce_admission(state, &mut decision, conn);

    if previous != Some(conn) {
        if let Some(prev) = previous {
            info!(
                target: "rc.admission",
                previous_host = %prev,
                host_id = %conn,
                "Host claim replaced existing host"
            );
        }
        decision.send(
            Audience::Room { except: Some(conn) },
            ServerEvent::HostChanged {
                host_id: Some(conn),
                name: Some(request.name.clone()),
            },
        );
    }

    forward_retargeted(state, &mut decision, conn);
    decision
}

/// `entry-granted` to the newcomer, `user-connected` to everyone else.
fn announce_admission<T>(state: &RoomState, decision: &mut Decision<T>, conn: ConnectionId) {
    let Some(member) = state.member(conn) else {
        return;
    };
    decision.send(
        Audience::One(conn),
        ServerEvent::EntryGranted {
            connection_id: conn,
            host_id: state.current_host().map(|h| h.connection_id),
            members: state.member_infos(Some(conn)),
        },
    );
    decision.send(
        Audience::Room { except: Some(conn) },
        ServerEvent::UserConnected {
            connection_id: conn,
            media_id: member.media_id.clone(),
            name: member.name.clone(),
        },
    );
}

fn forward_retargeted<T>(state: &mut RoomState, decision: &mut Decision<T>, host: ConnectionId) {
    for entry in state.retarget_held(host) {
        decision.send(
            Audience::One(host),
            ServerEvent::EntryRequested {
                requester_id: entry.requester,
                name: entry.name,
                media_id: entry.media_id,
            },
        );
    }
}

/// Apply a host's allow/deny decision.
pub fn respond(
    state: &mut RoomState,
    policy: &AdmissionPolicy,
    responder: ConnectionId,
    requester: ConnectionId,
    allow: bool,
    now: Instant,
) -> Decision<RespondOutcome> {
    if !state.is_host(responder) {
        warn!(
            target: "rc.admission",
            responder = %responder,
            requester = %requester,
            "Entry decision from non-host ignored"
        );
        return Decision::new(RespondOutcome::NotHost);
    }

    let Some(entry) = state.resolve_pending(requester) else {
        debug!(
            target: "rc.admission",
            requester = %requester,
            "Entry decision for unknown request ignored"
        );
        return Decision::new(RespondOutcome::NoRequest);
    };

    crate::observability::metrics::record_pending_wait(
        now.saturating_duration_since(entry.requested_at),
    );

    if !allow {
        let mut decision = Decision::new(RespondOutcome::Denied(DenyReason::Host));
        decision.deny(requester, DenyReason::Host);
        return decision;
    }

    if state.member_count() >= policy.max_participants {
        let mut decision = Decision::new(RespondOutcome::Denied(DenyReason::RoomFull));
        decision.deny(requester, DenyReason::RoomFull);
        return decision;
    }

    state.add_member(requester, &entry.name, &entry.media_id, now);
    let mut decision = Decision::new(RespondOutcome::Granted);
    announce_admission(state, &mut decision, requester);
    decision
}

/// Remove a departed connection and notify whoever is affected.
pub fn depart(
    state: &mut RoomState,
    policy: &AdmissionPolicy,
    conn: ConnectionId,
) -> Decision<Departure> {
    if state.remove_pending(conn).is_some() {
        let mut decision = Decision::new(Departure::Pending);
        decision.release.push(conn);
        return decision;
    }

    let Some(removed) = state.remove_member(conn) else {
        return Decision::new(Departure::Unknown);
    };
    crate::observability::metrics::record_membership_duration(
        removed.member.joined_at.elapsed(),
    );

    let mut decision = Decision::new(Departure::Member {
        was_host: removed.was_host,
    });
    decision.release.push(conn);
    decision.send(
        Audience::Room { except: None },
        ServerEvent::UserDisconnected {
            connection_id: conn,
            media_id: removed.member.media_id.clone(),
            name: removed.member.name.clone(),
            was_host: removed.was_host,
        },
    );

    if !removed.was_host {
        return decision;
    }

    for orphan in &removed.orphaned {
        decision.deny(orphan.requester, DenyReason::HostLeft);
    }

    match policy.host_departure {
        HostDeparturePolicy::Hostless => {
            decision.send(
                Audience::Room { except: None },
                ServerEvent::HostChanged {
                    host_id: None,
                    name: None,
                },
            );
        }
        HostDeparturePolicy::PromoteEarliest => match state.promote_earliest() {
            Some(next) => {
                let name = state.member(next).map(|m| m.name.clone());
                info!(
                    target: "rc.admission",
                    host_id = %next,
                    "Earliest member promoted to host"
                );
                decision.send(
                    Audience::Room { except: None },
                    ServerEvent::HostChanged {
                        host_id: Some(next),
                        name,
                    },
                );
                forward_retargeted(state, &mut decision, next);
            }
            None => {
                decision.send(
                    Audience::Room { except: None },
                    ServerEvent::HostChanged {
                        host_id: None,
                        name: None,
                    },
                );
            }
        },
    }

    decision
}

/// Auto-deny requests that outlived the pending timeout.
pub fn expire(state: &mut RoomState, policy: &AdmissionPolicy, now: Instant) -> Decision<usize> {
    let Some(ttl) = policy.pending_timeout else {
        return Decision::new(0);
    };

    let expired = state.expired_pending(now, ttl);
    let mut decision = Decision::new(expired.len());
    for entry in expired {
        crate::observability::metrics::record_pending_wait(
            now.saturating_duration_since(entry.requested_at),
        );
        decision.deny(entry.requester, DenyReason::Timeout);
    }
    decision
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn request(name: &str, is_host: bool) -> JoinRequest {
        JoinRequest {
            connection_id: ConnectionId::new(),
            name: name.to_string(),
            media_id: MediaId::parse(&format!("media-{name}")).unwrap(),
            is_host,
        }
    }

    fn events_for(outbound: &[Outbound], audience: &Audience) -> Vec<&'static str> {
        outbound
            .iter()
            .filter(|o| &o.audience == audience)
            .map(|o| o.event.kind())
            .collect()
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("hold".parse::<HostlessPolicy>(), Ok(HostlessPolicy::Hold));
        assert_eq!("Grant".parse::<HostlessPolicy>(), Ok(HostlessPolicy::Grant));
        assert!("maybe".parse::<HostlessPolicy>().is_err());
        assert_eq!(
            "promote-earliest".parse::<HostDeparturePolicy>(),
            Ok(HostDeparturePolicy::PromoteEarliest)
        );
        assert_eq!(HostDeparturePolicy::default().to_string(), "hostless");
    }

    #[test]
    fn test_host_claim_grants_and_announces() {
        let mut state = RoomState::new();
        let policy = AdmissionPolicy::default();
        let now = Instant::now();
        let host = request("host", true);

        let decision = admit(&mut state, &policy, &host, now);
        assert_eq!(decision.outcome, JoinOutcome::Granted);
        assert_eq!(
            events_for(&decision.outbound, &Audience::One(host.connection_id)),
            vec!["entry-granted"]
        );
        assert!(state.is_host(host.connection_id));
    }

    #[test]
    fn test_guest_join_forwards_to_host_only() {
        let mut state = RoomState::new();
        let policy = AdmissionPolicy::default();
        let now = Instant::now();
        let host = request("host", true);
        let guest = request("guest", false);

        admit(&mut state, &policy, &host, now);
        let decision = admit(&mut state, &policy, &guest, now);

        assert_eq!(decision.outcome, JoinOutcome::Pending);
        assert_eq!(decision.outbound.len(), 1);
        assert_eq!(decision.outbound[0].audience, Audience::One(host.connection_id));
        assert!(matches!(
            &decision.outbound[0].event,
            ServerEvent::EntryRequested { requester_id, .. } if *requester_id == guest.connection_id
        ));
        assert!(state.is_pending(guest.connection_id));
    }

    #[test]
    fn test_duplicate_join_is_noop() {
        let mut state = RoomState::new();
        let policy = AdmissionPolicy::default();
        let now = Instant::now();
        let host = request("host", true);

        admit(&mut state, &policy, &host, now);
        let again = admit(&mut state, &policy, &host, now);
        assert_eq!(again.outcome, JoinOutcome::Duplicate);
        assert!(again.outbound.is_empty());
        assert!(again.release.is_empty());
    }

    #[test]
    fn test_hostless_grant_and_hold() {
        let now = Instant::now();

        let mut state = RoomState::new();
        let grant = AdmissionPolicy::default();
        let guest = request("guest", false);
        let decision = admit(&mut state, &grant, &guest, now);
        assert_eq!(decision.outcome, JoinOutcome::Granted);
        assert!(state.is_member(guest.connection_id));

        let mut state = RoomState::new();
        let hold = AdmissionPolicy {
            hostless: HostlessPolicy::Hold,
            ..AdmissionPolicy::default()
        };
        let guest = request("guest", false);
        let decision = admit(&mut state, &hold, &guest, now);
        assert_eq!(decision.outcome, JoinOutcome::Pending);
        assert!(decision.outbound.is_empty());

        let host = request("host", true);
        let decision = admit(&mut state, &hold, &host, now);
        assert_eq!(
            events_for(&decision.outbound, &Audience::One(host.connection_id)),
            vec!["entry-granted", "entry-requested"]
        );
    }

    #[test]
    fn test_respond_from_non_host_is_ignored() {
        let mut state = RoomState::new();
        let policy = AdmissionPolicy::default();
        let now = Instant::now();
        let host = request("host", true);
        let guest = request("guest", false);
        let intruder = ConnectionId::new();

        admit(&mut state, &policy, &host, now);
        admit(&mut state, &policy, &guest, now);

        let decision = respond(&mut state, &policy, intruder, guest.connection_id, true, now);
        assert_eq!(decision.outcome, RespondOutcome::NotHost);
        assert!(decision.outbound.is_empty());
        assert!(state.is_pending(guest.connection_id));
    }

    #[test]
    fn test_respond_twice_resolves_once() {
        let mut state = RoomState::new();
        let policy = AdmissionPolicy::default();
        let now = Instant::now();
        let host = request("host", true);
        let guest = request("guest", false);

        admit(&mut state, &policy, &host, now);
        admit(&mut state, &policy, &guest, now);

        let first = respond(&mut state, &policy, host.connection_id, guest.connection_id, true, now);
        assert_eq!(first.outcome, RespondOutcome::Granted);
        assert_eq!(
            events_for(&first.outbound, &Audience::One(guest.connection_id)),
            vec!["entry-granted"]
        );

        let second = respond(&mut state, &policy, host.connection_id, guest.connection_id, true, now);
        assert_eq!(second.outcome, RespondOutcome::NoRequest);
        assert!(second.outbound.is_empty());
        assert_eq!(state.member_count(), 2);
    }

    #[test]
    fn test_deny_releases_requester() {
        let mut state = RoomState::new();
        let policy = AdmissionPolicy::default();
        let now = Instant::now();
        let host = request("host", true);
        let guest = request("guest", false);

        admit(&mut state, &policy, &host, now);
        admit(&mut state, &policy, &guest, now);

        let decision = respond(&mut state, &policy, host.connection_id, guest.connection_id, false, now);
        assert_eq!(decision.outcome, RespondOutcome::Denied(DenyReason::Host));
        assert_eq!(decision.release, vec![guest.connection_id]);
        assert!(!state.is_member(guest.connection_id));
        assert!(!state.is_pending(guest.connection_id));
    }

    #[test]
    fn test_denials_are_counted_by_reason() {
        use metrics_util::debugging::{DebugValue, DebuggingRecorder};

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let mut state = RoomState::new();
        let policy = AdmissionPolicy::default();
        let now = Instant::now();
        let host = request("host", true);
        let refused = request("refused", false);
        let waiting = request("waiting", false);

        metrics::with_local_recorder(&recorder, || {
            admit(&mut state, &policy, &host, now);
            admit(&mut state, &policy, &refused, now);
            admit(&mut state, &policy, &waiting, now);
            respond(&mut state, &policy, host.connection_id, refused.connection_id, false, now);
            depart(&mut state, &policy, host.connection_id);
        });

        let denials: Vec<(String, DebugValue)> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| key.key().name() == "rc_entry_denials_total")
            .map(|(key, _, _, value)| {
                let reason = key
                    .key()
                    .labels()
                    .find(|l| l.key() == "reason")
                    .map(|l| l.value().to_string())
                    .unwrap();
                (reason, value)
            })
            .collect();

        assert_eq!(denials.len(), 2);
        for (reason, value) in &denials {
            assert!(reason == "host" || reason == "host-left", "{reason}");
            assert!(matches!(value, DebugValue::Counter(1)));
        }
    }

    #[test]
    fn test_capacity_limits_joins_and_grants() {
        let mut state = RoomState::new();
        let policy = AdmissionPolicy {
            max_participants: 2,
            ..AdmissionPolicy::default()
        };
        let now = Instant::now();
        let host = request("host", true);
        let guest = request("guest", false);
        let late = request("late", false);

        admit(&mut state, &policy, &host, now);
        admit(&mut state, &policy, &guest, now);
        admit(&mut state, &policy, &late, now);
        respond(&mut state, &policy, host.connection_id, guest.connection_id, true, now);

        let decision = respond(&mut state, &policy, host.connection_id, late.connection_id, true, now);
        assert_eq!(decision.outcome, RespondOutcome::Denied(DenyReason::RoomFull));

        let overflow = request("overflow", false);
        let decision = admit(&mut state, &policy, &overflow, now);
        assert_eq!(decision.outcome, JoinOutcome::Denied(DenyReason::RoomFull));
        assert_eq!(decision.release, vec![overflow.connection_id]);
    }

    #[test]
    fn test_host_departure_denies_orphans_and_goes_hostless() {
        let mut state = RoomState::new();
        let policy = AdmissionPolicy::default();
        let now = Instant::now();
        let host = request("host", true);
        let member = request("member", false);
        let guest = request("guest", false);

        admit(&mut state, &policy, &member, now);
        admit(&mut state, &policy, &host, now);
        admit(&mut state, &policy, &guest, now);

        let decision = depart(&mut state, &policy, host.connection_id);
        assert_eq!(decision.outcome, Departure::Member { was_host: true });
        assert_eq!(
            events_for(&decision.outbound, &Audience::One(guest.connection_id)),
            vec!["entry-denied"]
        );
        assert_eq!(
            events_for(&decision.outbound, &Audience::Room { except: None }),
            vec!["user-disconnected", "host-changed"]
        );
        assert!(decision.release.contains(&guest.connection_id));
        assert!(state.current_host().is_none());
    }

    #[test]
    fn test_host_departure_promotes_earliest() {
        let mut state = RoomState::new();
        let policy = AdmissionPolicy {
            host_departure: HostDeparturePolicy::PromoteEarliest,
            ..AdmissionPolicy::default()
        };
        let now = Instant::now();
        let early = request("early", false);
        let host = request("host", true);

        admit(&mut state, &policy, &early, now);
        admit(&mut state, &policy, &host, now);

        let decision = depart(&mut state, &policy, host.connection_id);
        assert!(state.is_host(early.connection_id));
        assert!(decision.outbound.iter().any(|o| matches!(
            &o.event,
            ServerEvent::HostChanged { host_id: Some(id), .. } if *id == early.connection_id
        )));
    }

    #[test]
    fn test_depart_pending_and_unknown() {
        let mut state = RoomState::new();
        let policy = AdmissionPolicy::default();
        let now = Instant::now();
        let host = request("host", true);
        let guest = request("guest", false);

        admit(&mut state, &policy, &host, now);
        admit(&mut state, &policy, &guest, now);

        let decision = depart(&mut state, &policy, guest.connection_id);
        assert_eq!(decision.outcome, Departure::Pending);
        assert!(decision.outbound.is_empty());

        let again = depart(&mut state, &policy, guest.connection_id);
        assert_eq!(again.outcome, Departure::Unknown);

        let late = respond(&mut state, &policy, host.connection_id, guest.connection_id, true, now);
        assert_eq!(late.outcome, RespondOutcome::NoRequest);
        assert!(!state.is_member(guest.connection_id));
    }

    #[test]
    fn test_expire_disabled_and_enabled() {
        let mut state = RoomState::new();
        let start = Instant::now();
        let host = request("host", true);
        let guest = request("guest", false);

        let disabled = AdmissionPolicy {
            pending_timeout: None,
            ..AdmissionPolicy::default()
        };
        admit(&mut state, &disabled, &host, start);
        admit(&mut state, &disabled, &guest, start);
        let later = start + Duration::from_secs(3600);
        assert_eq!(expire(&mut state, &disabled, later).outcome, 0);

        let enabled = AdmissionPolicy::default();
        let decision = expire(&mut state, &enabled, later);
        assert_eq!(decision.outcome, 1);
        assert!(matches!(
            decision.outbound[0].event,
            ServerEvent::EntryDenied {
                reason: DenyReason::Timeout
            }
        ));
    }
}
